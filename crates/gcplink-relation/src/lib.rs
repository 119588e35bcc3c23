//! Relation-data transport boundary, databag codec, and completion ledger
//! for gcplink.
//!
//! This crate isolates everything that touches the relation's replicated
//! key/value store: the `RelationTransport` trait every host framework
//! adapts to, a `MemoryRelation` implementation with optional durable
//! persistence (for harnesses and tests), the typed databag codec
//! (`read_request`/`publish_request_fields`), and the per-unit
//! completed-hash ledger that drives change detection.

pub mod completed;
pub mod databag;
pub mod harness;
pub mod memory;
pub mod transport;

pub use completed::{
    completed_key, forget_completed_hash, load_completed_hash, read_remote_completed,
    store_completed_hash, COMPLETED_MAP_KEY,
};
pub use databag::{publish_request_fields, read_local_request, read_request, read_unit_fields};
pub use harness::{RelationHarness, UnitTransport};
pub use memory::MemoryRelation;
pub use transport::RelationTransport;

use gcplink_schema::{SchemaError, UnitName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("malformed data published by unit '{unit}': {source}")]
    MalformedUnitData {
        unit: UnitName,
        #[source]
        source: SchemaError,
    },
    #[error("malformed locally published data: {0}")]
    MalformedLocalData(#[source] SchemaError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
