use crate::transport::RelationTransport;
use crate::RelationError;
use gcplink_schema::UnitName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

type Bucket = BTreeMap<String, Value>;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct RelationState {
    joined: BTreeSet<UnitName>,
    remote: BTreeMap<UnitName, Bucket>,
    local: Bucket,
}

/// In-memory relation-data store.
///
/// Implements [`RelationTransport`] for tests and for harnesses hosting the
/// interface layer outside a real charm framework. Offers simulation hooks
/// for the remote side of the relation (`join`, `depart`, `publish_remote`)
/// and, when constructed with [`with_persistence`](Self::with_persistence),
/// write-through JSON persistence with atomic replace so locally written
/// state (notably the completed-hash ledger) survives process restarts.
pub struct MemoryRelation {
    state: Mutex<RelationState>,
    persist_path: Option<PathBuf>,
}

impl Default for MemoryRelation {
    fn default() -> Self {
        Self {
            state: Mutex::new(RelationState::default()),
            persist_path: None,
        }
    }
}

impl MemoryRelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a relation backed by a JSON state file, loading any state a
    /// previous run left behind.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, RelationError> {
        let path = path.into();
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            RelationState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            persist_path: Some(path),
        })
    }

    /// Simulate a remote unit joining the relation.
    pub fn join(&self, unit: impl Into<UnitName>) -> Result<(), RelationError> {
        let mut state = self.lock()?;
        state.joined.insert(unit.into());
        self.flush(&state)
    }

    /// Simulate a remote unit departing; its published data goes with it.
    pub fn depart(&self, unit: &UnitName) -> Result<(), RelationError> {
        let mut state = self.lock()?;
        state.joined.remove(unit);
        state.remote.remove(unit);
        self.flush(&state)
    }

    /// Write into a remote unit's bucket, standing in for that unit's own
    /// side of the replicated store.
    pub fn publish_remote(
        &self,
        unit: &UnitName,
        key: &str,
        value: Value,
    ) -> Result<(), RelationError> {
        let mut state = self.lock()?;
        state
            .remote
            .entry(unit.clone())
            .or_default()
            .insert(key.to_owned(), value);
        self.flush(&state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, RelationState>, RelationError> {
        self.state
            .lock()
            .map_err(|e| RelationError::Unavailable(format!("mutex poisoned: {e}")))
    }

    fn flush(&self, state: &RelationState) -> Result<(), RelationError> {
        let Some(path) = self.persist_path.as_ref() else {
            return Ok(());
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let content = serde_json::to_string_pretty(state)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| RelationError::Io(e.error))?;
        fsync_dir(dir)?;
        Ok(())
    }
}

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

impl RelationTransport for MemoryRelation {
    fn joined_units(&self) -> Result<Vec<UnitName>, RelationError> {
        let state = self.lock()?;
        Ok(state.joined.iter().cloned().collect())
    }

    fn read(&self, unit: &UnitName, key: &str) -> Result<Option<Value>, RelationError> {
        let state = self.lock()?;
        Ok(state.remote.get(unit).and_then(|bucket| bucket.get(key)).cloned())
    }

    fn read_local(&self, key: &str) -> Result<Option<Value>, RelationError> {
        let state = self.lock()?;
        Ok(state.local.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), RelationError> {
        let mut state = self.lock()?;
        state.local.insert(key.to_owned(), value);
        self.flush(&state)
    }

    fn remove(&self, key: &str) -> Result<(), RelationError> {
        let mut state = self.lock()?;
        state.local.remove(key);
        self.flush(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_and_depart_drive_membership() {
        let relation = MemoryRelation::new();
        relation.join("app/0").unwrap();
        relation.join("app/1").unwrap();
        assert_eq!(relation.joined_units().unwrap().len(), 2);

        relation.depart(&UnitName::new("app/0")).unwrap();
        let units = relation.joined_units().unwrap();
        assert_eq!(units, vec![UnitName::new("app/1")]);
    }

    #[test]
    fn departed_unit_data_is_gone() {
        let relation = MemoryRelation::new();
        let unit = UnitName::new("app/0");
        relation.join("app/0").unwrap();
        relation.publish_remote(&unit, "instance", json!("i-1")).unwrap();
        assert_eq!(relation.read(&unit, "instance").unwrap(), Some(json!("i-1")));

        relation.depart(&unit).unwrap();
        assert_eq!(relation.read(&unit, "instance").unwrap(), None);
    }

    #[test]
    fn local_bucket_roundtrip() {
        let relation = MemoryRelation::new();
        relation.write("completed-app/0", json!("abc")).unwrap();
        assert_eq!(
            relation.read_local("completed-app/0").unwrap(),
            Some(json!("abc"))
        );
        relation.remove("completed-app/0").unwrap();
        assert_eq!(relation.read_local("completed-app/0").unwrap(), None);
    }

    #[test]
    fn unpublished_key_reads_as_none() {
        let relation = MemoryRelation::new();
        relation.join("app/0").unwrap();
        assert_eq!(
            relation.read(&UnitName::new("app/0"), "zone").unwrap(),
            None
        );
    }

    #[test]
    fn persistence_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relation.json");

        let relation = MemoryRelation::with_persistence(&path).unwrap();
        relation.join("app/0").unwrap();
        relation
            .publish_remote(&UnitName::new("app/0"), "instance", json!("i-1"))
            .unwrap();
        relation.write("completed-app/0", json!("deadbeef")).unwrap();
        drop(relation);

        let reloaded = MemoryRelation::with_persistence(&path).unwrap();
        assert_eq!(reloaded.joined_units().unwrap(), vec![UnitName::new("app/0")]);
        assert_eq!(
            reloaded.read(&UnitName::new("app/0"), "instance").unwrap(),
            Some(json!("i-1"))
        );
        assert_eq!(
            reloaded.read_local("completed-app/0").unwrap(),
            Some(json!("deadbeef"))
        );
    }

    #[test]
    fn persistence_starts_empty_without_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let relation =
            MemoryRelation::with_persistence(dir.path().join("fresh.json")).unwrap();
        assert!(relation.joined_units().unwrap().is_empty());
    }
}
