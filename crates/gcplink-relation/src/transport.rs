use crate::RelationError;
use gcplink_schema::UnitName;
use serde_json::Value;

/// The relation-data store as one endpoint sees it.
///
/// A relation carries a per-unit key/value bucket, replicated so each side
/// can read the other side's published values but write only its own. The
/// hosting framework (Juju, a test harness, ...) supplies the
/// implementation; this layer never reaches past it.
///
/// Writes must be durable before the call returns: the completed-hash
/// ledger written through this trait is the sole mechanism preventing
/// duplicate re-processing on the next event cycle.
pub trait RelationTransport {
    /// Snapshot of the remote units currently joined to the relation.
    ///
    /// Departed or broken units must not appear. Callers snapshot this once
    /// per invocation and work against the result, so repeated calls may
    /// legitimately disagree with an earlier snapshot.
    fn joined_units(&self) -> Result<Vec<UnitName>, RelationError>;

    /// Read one key from a remote unit's bucket.
    ///
    /// Returns `Ok(None)` when the unit has not published that key.
    fn read(&self, unit: &UnitName, key: &str) -> Result<Option<Value>, RelationError>;

    /// Read back one key from our own bucket.
    fn read_local(&self, key: &str) -> Result<Option<Value>, RelationError>;

    /// Write one key into our own bucket, durably.
    fn write(&self, key: &str, value: Value) -> Result<(), RelationError>;

    /// Remove one key from our own bucket, durably.
    fn remove(&self, key: &str) -> Result<(), RelationError>;
}
