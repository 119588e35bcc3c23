//! A shared multi-unit relation for end-to-end exercises.
//!
//! Where [`MemoryRelation`](crate::memory::MemoryRelation) mocks a single
//! endpoint's view, `RelationHarness` models the whole relation: every
//! participating unit gets its own [`UnitTransport`] over the same
//! replicated state, so a requirer's writes are immediately visible as
//! that unit's remote data from the provider's transport, exactly as the
//! real store replicates them.

use crate::transport::RelationTransport;
use crate::RelationError;
use gcplink_schema::UnitName;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

type Bucket = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct HarnessState {
    joined: BTreeSet<UnitName>,
    buckets: BTreeMap<UnitName, Bucket>,
}

/// The relation itself: shared replicated state plus membership.
#[derive(Default, Clone)]
pub struct RelationHarness {
    state: Arc<Mutex<HarnessState>>,
}

/// One unit's view of the relation: reads anyone, writes only itself.
pub struct UnitTransport {
    state: Arc<Mutex<HarnessState>>,
    unit: UnitName,
}

impl RelationHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a unit to the relation and hand back its transport view.
    pub fn join(&self, unit: impl Into<UnitName>) -> Result<UnitTransport, RelationError> {
        let unit = unit.into();
        let mut state = lock(&self.state)?;
        state.joined.insert(unit.clone());
        Ok(UnitTransport {
            state: Arc::clone(&self.state),
            unit,
        })
    }

    /// Depart a unit: membership and its published data both go away. Any
    /// outstanding [`UnitTransport`] for it keeps writing into the void,
    /// as a real departed unit's last gasps would.
    pub fn depart(&self, unit: &UnitName) -> Result<(), RelationError> {
        let mut state = lock(&self.state)?;
        state.joined.remove(unit);
        state.buckets.remove(unit);
        Ok(())
    }
}

impl UnitTransport {
    /// The unit this view belongs to.
    pub fn unit(&self) -> &UnitName {
        &self.unit
    }
}

fn lock(state: &Arc<Mutex<HarnessState>>) -> Result<MutexGuard<'_, HarnessState>, RelationError> {
    state
        .lock()
        .map_err(|e| RelationError::Unavailable(format!("mutex poisoned: {e}")))
}

impl RelationTransport for UnitTransport {
    fn joined_units(&self) -> Result<Vec<UnitName>, RelationError> {
        let state = lock(&self.state)?;
        Ok(state
            .joined
            .iter()
            .filter(|unit| **unit != self.unit)
            .cloned()
            .collect())
    }

    fn read(&self, unit: &UnitName, key: &str) -> Result<Option<Value>, RelationError> {
        let state = lock(&self.state)?;
        Ok(state.buckets.get(unit).and_then(|bucket| bucket.get(key)).cloned())
    }

    fn read_local(&self, key: &str) -> Result<Option<Value>, RelationError> {
        let state = lock(&self.state)?;
        Ok(state
            .buckets
            .get(&self.unit)
            .and_then(|bucket| bucket.get(key))
            .cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), RelationError> {
        let mut state = lock(&self.state)?;
        state
            .buckets
            .entry(self.unit.clone())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), RelationError> {
        let mut state = lock(&self.state)?;
        if let Some(bucket) = state.buckets.get_mut(&self.unit) {
            bucket.remove(key);
        }
        Ok(())
    }
}
