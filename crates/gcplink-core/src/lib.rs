//! Provider and requirer endpoint accessors for the GCP integration
//! interface.
//!
//! This crate ties the schema and transport layers together into the two
//! role-specific accessors: `GcpProvides` aggregates one
//! `IntegrationRequest` per joined remote unit and tracks which requests
//! are new or changed via the completed-hash ledger; `GcpRequires`
//! publishes capability requests and reports the endpoint's explicit state
//! (`NotJoined`/`Joined`/`Ready`) instead of relying on ambient framework
//! flags.

pub mod provides;
pub mod request;
pub mod requires;
pub mod state;

pub use provides::{GcpProvides, ProviderStatus, UnitInstance};
pub use request::IntegrationRequest;
pub use requires::GcpRequires;
pub use state::{validate_transition, EndpointState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] gcplink_schema::SchemaError),
    #[error("relation error: {0}")]
    Relation(#[from] gcplink_relation::RelationError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
