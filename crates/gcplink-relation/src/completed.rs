//! The completion ledger: which request content each unit has already had
//! fulfilled.
//!
//! Two records are kept on completion. A unit-namespaced key in the
//! provider's own bucket (`completed-<unit_name>`) drives the provider's
//! `changed` computation, including across process restarts. The shared
//! `completed` map of instance name to hash is replicated to the requirer,
//! which compares it against the hash of its currently published request to
//! decide readiness.

use crate::transport::RelationTransport;
use crate::RelationError;
use gcplink_schema::{InstanceName, RequestHash, UnitName};
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire key of the shared instance-to-hash map the provider publishes.
pub const COMPLETED_MAP_KEY: &str = "completed";

/// Provider-local ledger key for one unit's last completed hash.
pub fn completed_key(unit: &UnitName) -> String {
    format!("completed-{unit}")
}

/// The hash recorded when this unit's request was last marked completed,
/// if any. A missing entry means the unit's request was never completed.
pub fn load_completed_hash<T: RelationTransport + ?Sized>(
    transport: &T,
    unit: &UnitName,
) -> Result<Option<RequestHash>, RelationError> {
    match transport.read_local(&completed_key(unit))? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Record a fulfilled request: the unit-namespaced ledger entry plus the
/// shared `completed` map entry the requirer reads.
///
/// The shared map is keyed by instance name, so it is only updated once the
/// unit has reported its instance. The transport guarantees durability
/// before returning; this must hold before the triggering handler ends,
/// since the ledger is what suppresses duplicate re-processing.
pub fn store_completed_hash<T: RelationTransport + ?Sized>(
    transport: &T,
    unit: &UnitName,
    instance: &InstanceName,
    hash: &RequestHash,
) -> Result<(), RelationError> {
    transport.write(&completed_key(unit), Value::String(hash.as_str().to_owned()))?;
    if !instance.is_empty() {
        let mut map: BTreeMap<String, RequestHash> =
            match transport.read_local(COMPLETED_MAP_KEY)? {
                Some(value) => serde_json::from_value(value)?,
                None => BTreeMap::new(),
            };
        map.insert(instance.as_str().to_owned(), hash.clone());
        transport.write(COMPLETED_MAP_KEY, serde_json::to_value(map)?)?;
    }
    Ok(())
}

/// Drop the ledger entry for a departed unit.
pub fn forget_completed_hash<T: RelationTransport + ?Sized>(
    transport: &T,
    unit: &UnitName,
) -> Result<(), RelationError> {
    transport.remove(&completed_key(unit))
}

/// The shared `completed` map as published by the remote (provider) unit.
pub fn read_remote_completed<T: RelationTransport + ?Sized>(
    transport: &T,
    provider_unit: &UnitName,
) -> Result<BTreeMap<String, RequestHash>, RelationError> {
    match transport.read(provider_unit, COMPLETED_MAP_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(BTreeMap::new()),
    }
}
