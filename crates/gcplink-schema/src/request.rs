use crate::types::{InstanceName, Zone};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to decode request data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("label key must not be empty")]
    EmptyLabelKey,
    #[error("invalid label key: '{0}', expected [a-z][a-z0-9_-]{{0,62}}")]
    InvalidLabelKey(String),
}

/// Mapping of instance label names to values.
///
/// A `None` value requests deletion of that label on the provider side; an
/// absent key expresses no opinion about that label. The two are distinct
/// on the wire (`null` vs. missing).
pub type LabelMap = BTreeMap<String, Option<String>>;

/// Wire keys for the request fields, as published into the relation databag.
pub mod keys {
    pub const REQUESTED: &str = "requested";
    pub const INSTANCE: &str = "instance";
    pub const ZONE: &str = "zone";
    pub const INSTANCE_LABELS: &str = "instance-labels";
    pub const ENABLE_INSTANCE_INSPECTION: &str = "enable-instance-inspection";
    pub const ENABLE_NETWORK_MANAGEMENT: &str = "enable-network-management";
    pub const ENABLE_LOAD_BALANCER_MANAGEMENT: &str = "enable-load-balancer-management";
    pub const ENABLE_BLOCK_STORAGE_MANAGEMENT: &str = "enable-block-storage-management";
    pub const ENABLE_DNS_MANAGEMENT: &str = "enable-dns-management";
    pub const ENABLE_OBJECT_STORAGE_ACCESS: &str = "enable-object-storage-access";
    pub const ENABLE_OBJECT_STORAGE_MANAGEMENT: &str = "enable-object-storage-management";
    pub const OBJECT_STORAGE_ACCESS_PATTERNS: &str = "object-storage-access-patterns";
    pub const OBJECT_STORAGE_MANAGEMENT_PATTERNS: &str = "object-storage-management-patterns";

    /// Every documented request field, in wire-key order.
    pub const ALL: [&str; 13] = [
        REQUESTED,
        INSTANCE,
        ZONE,
        INSTANCE_LABELS,
        ENABLE_INSTANCE_INSPECTION,
        ENABLE_NETWORK_MANAGEMENT,
        ENABLE_LOAD_BALANCER_MANAGEMENT,
        ENABLE_BLOCK_STORAGE_MANAGEMENT,
        ENABLE_DNS_MANAGEMENT,
        ENABLE_OBJECT_STORAGE_ACCESS,
        ENABLE_OBJECT_STORAGE_MANAGEMENT,
        OBJECT_STORAGE_ACCESS_PATTERNS,
        OBJECT_STORAGE_MANAGEMENT_PATTERNS,
    ];
}

/// The typed request record one requiring unit publishes over the relation.
///
/// Every field has a documented empty value that an absent wire key decodes
/// to, so a freshly joined unit that has published nothing decodes to
/// `RequestData::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct RequestData {
    /// Whether any request has been issued by this unit.
    pub requested: bool,
    pub instance: InstanceName,
    pub zone: Zone,
    #[serde(deserialize_with = "null_as_empty_labels")]
    pub instance_labels: LabelMap,
    pub enable_instance_inspection: bool,
    pub enable_network_management: bool,
    pub enable_load_balancer_management: bool,
    pub enable_block_storage_management: bool,
    pub enable_dns_management: bool,
    pub enable_object_storage_access: bool,
    pub enable_object_storage_management: bool,
    /// Patterns narrowing object storage access. Empty (or omitted, or an
    /// explicit wire `null`) means unrestricted: patterns only narrow a
    /// grant, they never deny it outright.
    #[serde(deserialize_with = "null_as_empty_vec")]
    pub object_storage_access_patterns: Vec<String>,
    /// Patterns narrowing object storage management; same empty semantics
    /// as the access patterns.
    #[serde(deserialize_with = "null_as_empty_vec")]
    pub object_storage_management_patterns: Vec<String>,
}

// Requirers may publish an explicit `null` for patterns and labels (the
// wire format allows it); treat it the same as an omitted key.
fn null_as_empty_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_labels<'de, D>(deserializer: D) -> Result<LabelMap, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LabelMap>::deserialize(deserializer)?.unwrap_or_default())
}

impl RequestData {
    /// Decode a unit's published databag into a typed record.
    ///
    /// Unknown keys are ignored (other layers may share the databag), absent
    /// keys resolve to the field's empty value, and malformed values are a
    /// decode error rather than a panic or a silent default.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Canonical copy of this record: pattern lists sorted and deduplicated.
    ///
    /// The label map is already key-sorted by construction (`BTreeMap`).
    /// This is the input to [`canonical_json`](Self::canonical_json) and,
    /// from there, to request hashing.
    pub fn canonical(&self) -> Self {
        let mut canonical = self.clone();
        canonical.object_storage_access_patterns =
            canonical_patterns(&self.object_storage_access_patterns);
        canonical.object_storage_management_patterns =
            canonical_patterns(&self.object_storage_management_patterns);
        canonical
    }

    /// Compact JSON rendering of the canonical form, with sorted object keys.
    ///
    /// Two records with identical field values render identically regardless
    /// of the order labels or patterns were supplied in.
    pub fn canonical_json(&self) -> Result<String, SchemaError> {
        // serde_json's default (non-preserve-order) object representation
        // sorts keys, which gives the canonical key ordering for free.
        let value = serde_json::to_value(self.canonical())?;
        Ok(value.to_string())
    }
}

fn canonical_patterns(patterns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = patterns.to_vec();
    out.sort();
    out.dedup();
    out
}

/// Validate an instance label key against the cloud naming rules: 1-63
/// characters, starting with a lowercase letter, containing only lowercase
/// letters, digits, underscores, and dashes.
pub fn validate_label_key(key: &str) -> Result<(), SchemaError> {
    if key.is_empty() {
        return Err(SchemaError::EmptyLabelKey);
    }
    if key.len() > 63
        || !key.as_bytes()[0].is_ascii_lowercase()
        || !key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    {
        return Err(SchemaError::InvalidLabelKey(key.to_owned()));
    }
    Ok(())
}
