//! Request data model, canonicalization, and content hashing for gcplink.
//!
//! This crate defines the schema layer of the GCP integration interface:
//! the typed request record (`RequestData`) exchanged over a relation,
//! canonical serialization (`canonical_json`), deterministic request
//! identity (`compute_request_hash`), and newtype wrappers for the string
//! identifiers that flow through the interface.

pub mod hash;
pub mod request;
pub mod types;

pub use hash::{compute_request_hash, HASH_ALGORITHM};
pub use request::{keys, validate_label_key, LabelMap, RequestData, SchemaError};
pub use types::{ApplicationName, InstanceName, RequestHash, UnitName, Zone};
