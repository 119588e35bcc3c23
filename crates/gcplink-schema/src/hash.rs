use crate::request::{RequestData, SchemaError};
use crate::types::RequestHash;
use sha2::{Digest, Sha256};

/// Fixed hash algorithm for request identity.
///
/// The persisted "last completed" hash and the shared `completed` map are
/// interpreted against this algorithm by both sides of the relation, so it
/// must never change for deployed interface revisions.
pub const HASH_ALGORITHM: &str = "sha256";

/// Compute the deterministic content hash of a request.
///
/// The digest covers the canonical JSON rendering of the record (sorted
/// keys, sorted deduplicated pattern lists), so two requests with identical
/// field values hash identically regardless of the order the transport
/// delivered them in. The result is the lowercase hex digest.
pub fn compute_request_hash(data: &RequestData) -> Result<RequestHash, SchemaError> {
    let canonical = data.canonical_json()?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(RequestHash::new(hex::encode(digest)))
}
