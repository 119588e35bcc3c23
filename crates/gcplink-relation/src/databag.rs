//! Typed codec between [`RequestData`] and the raw relation databag.
//!
//! This is the serialization boundary the rest of the interface goes
//! through: field-by-field reads of a unit's bucket assembled into one
//! typed record, and the requirer-side publish path that stamps the
//! `requested` marker alongside every request write.

use crate::transport::RelationTransport;
use crate::RelationError;
use gcplink_schema::{keys, RequestData, UnitName};
use serde_json::{Map, Value};

/// Read every documented request field published by one remote unit.
///
/// Absent keys are simply not present in the returned map, so the decoder
/// can distinguish "never published" from an explicit value.
pub fn read_unit_fields<T: RelationTransport + ?Sized>(
    transport: &T,
    unit: &UnitName,
) -> Result<Map<String, Value>, RelationError> {
    let mut fields = Map::new();
    for key in keys::ALL {
        if let Some(value) = transport.read(unit, key)? {
            fields.insert(key.to_owned(), value);
        }
    }
    Ok(fields)
}

/// Decode one remote unit's published fields into a typed record.
///
/// Malformed values become [`RelationError::MalformedUnitData`] carrying
/// the offending unit's name, so a collection read can isolate the failure
/// to that unit.
pub fn read_request<T: RelationTransport + ?Sized>(
    transport: &T,
    unit: &UnitName,
) -> Result<RequestData, RelationError> {
    let fields = read_unit_fields(transport, unit)?;
    RequestData::from_value(Value::Object(fields)).map_err(|source| {
        RelationError::MalformedUnitData {
            unit: unit.clone(),
            source,
        }
    })
}

/// Decode our own published fields, for readiness checks on the requirer
/// side.
pub fn read_local_request<T: RelationTransport + ?Sized>(
    transport: &T,
) -> Result<RequestData, RelationError> {
    let mut fields = Map::new();
    for key in keys::ALL {
        if let Some(value) = transport.read_local(key)? {
            fields.insert(key.to_owned(), value);
        }
    }
    RequestData::from_value(Value::Object(fields)).map_err(RelationError::MalformedLocalData)
}

/// Publish a set of request fields into our own bucket and stamp
/// `requested = true`.
///
/// A pure overwrite of the named keys: publishing the same entries twice
/// leaves the databag in the same state.
pub fn publish_request_fields<'a, T, I>(transport: &T, entries: I) -> Result<(), RelationError>
where
    T: RelationTransport + ?Sized,
    I: IntoIterator<Item = (&'a str, Value)>,
{
    for (key, value) in entries {
        transport.write(key, value)?;
    }
    transport.write(keys::REQUESTED, Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRelation;
    use serde_json::json;

    #[test]
    fn read_request_with_no_published_fields_is_default() {
        let relation = MemoryRelation::new();
        relation.join("app/0").unwrap();
        let data = read_request(&relation, &UnitName::new("app/0")).unwrap();
        assert_eq!(data, RequestData::default());
    }

    #[test]
    fn read_request_decodes_published_fields() {
        let relation = MemoryRelation::new();
        let unit = UnitName::new("app/0");
        relation.join("app/0").unwrap();
        relation.publish_remote(&unit, keys::REQUESTED, json!(true)).unwrap();
        relation.publish_remote(&unit, keys::INSTANCE, json!("i-1")).unwrap();
        relation
            .publish_remote(&unit, keys::ENABLE_DNS_MANAGEMENT, json!(true))
            .unwrap();

        let data = read_request(&relation, &unit).unwrap();
        assert!(data.requested);
        assert_eq!(data.instance, "i-1");
        assert!(data.enable_dns_management);
        assert!(!data.enable_network_management);
    }

    #[test]
    fn malformed_remote_data_names_the_unit() {
        let relation = MemoryRelation::new();
        let unit = UnitName::new("app/0");
        relation.join("app/0").unwrap();
        relation
            .publish_remote(&unit, keys::INSTANCE_LABELS, json!("not a map"))
            .unwrap();

        let err = read_request(&relation, &unit).unwrap_err();
        match err {
            RelationError::MalformedUnitData { unit, .. } => assert_eq!(unit, "app/0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn publish_stamps_requested_marker() {
        let relation = MemoryRelation::new();
        publish_request_fields(
            &relation,
            [(keys::ENABLE_NETWORK_MANAGEMENT, json!(true))],
        )
        .unwrap();

        let data = read_local_request(&relation).unwrap();
        assert!(data.requested);
        assert!(data.enable_network_management);
    }

    #[test]
    fn publish_is_idempotent() {
        let relation = MemoryRelation::new();
        let entries = || [(keys::ENABLE_DNS_MANAGEMENT, json!(true))];
        publish_request_fields(&relation, entries()).unwrap();
        let first = read_local_request(&relation).unwrap();
        publish_request_fields(&relation, entries()).unwrap();
        let second = read_local_request(&relation).unwrap();
        assert_eq!(first, second);
    }
}
