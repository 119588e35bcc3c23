use crate::state::EndpointState;
use crate::CoreError;
use gcplink_relation::{completed, databag, RelationTransport};
use gcplink_schema::{
    compute_request_hash, keys, validate_label_key, InstanceName, LabelMap, RequestHash, Zone,
};
use serde_json::{json, Value};

/// The requirer side of the interface, for charms that want GCP features
/// enabled for the instance they run on without holding cloud credentials
/// themselves.
///
/// The instance identity is injected at construction: how the unit learned
/// it (metadata service, configuration, ...) is outside this layer. Each
/// publish method is an idempotent overwrite of its fields and marks the
/// databag as `requested`; there are no disable operations, capabilities
/// are monotonic within a session.
pub struct GcpRequires<'t, T: RelationTransport> {
    transport: &'t T,
    instance: InstanceName,
    zone: Zone,
}

impl<'t, T: RelationTransport> GcpRequires<'t, T> {
    pub fn new(transport: &'t T, instance: InstanceName, zone: Zone) -> Self {
        Self {
            transport,
            instance,
            zone,
        }
    }

    /// This unit's instance name.
    pub fn instance(&self) -> &InstanceName {
        &self.instance
    }

    /// The zone this unit is in.
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Publish our instance identity so the provider can target its actions.
    ///
    /// Does not mark the databag as requested: reporting who we are is not
    /// a capability request.
    pub fn publish_instance_info(&self) -> Result<(), CoreError> {
        self.transport
            .write(keys::INSTANCE, Value::String(self.instance.as_str().to_owned()))?;
        self.transport
            .write(keys::ZONE, Value::String(self.zone.as_str().to_owned()))?;
        Ok(())
    }

    /// Request that the given labels be applied to this instance.
    ///
    /// Merges into the already-published label set. A `None` value requests
    /// removal of that label on the provider side, distinct from both an
    /// empty-string value and not mentioning the key at all.
    pub fn label_instance<I>(&self, labels: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut merged: LabelMap = databag::read_local_request(self.transport)?.instance_labels;
        for (key, value) in labels {
            validate_label_key(&key)?;
            merged.insert(key, value);
        }
        self.request([(keys::INSTANCE_LABELS, serde_json::to_value(merged)?)])
    }

    /// Request the ability to inspect instances.
    pub fn enable_instance_inspection(&self) -> Result<(), CoreError> {
        self.request([(keys::ENABLE_INSTANCE_INSPECTION, json!(true))])
    }

    /// Request the ability to manage networking (firewalls, subnets, etc).
    pub fn enable_network_management(&self) -> Result<(), CoreError> {
        self.request([(keys::ENABLE_NETWORK_MANAGEMENT, json!(true))])
    }

    /// Request the ability to manage load balancers.
    pub fn enable_load_balancer_management(&self) -> Result<(), CoreError> {
        self.request([(keys::ENABLE_LOAD_BALANCER_MANAGEMENT, json!(true))])
    }

    /// Request the ability to manage block storage.
    pub fn enable_block_storage_management(&self) -> Result<(), CoreError> {
        self.request([(keys::ENABLE_BLOCK_STORAGE_MANAGEMENT, json!(true))])
    }

    /// Request the ability to manage DNS.
    pub fn enable_dns(&self) -> Result<(), CoreError> {
        self.request([(keys::ENABLE_DNS_MANAGEMENT, json!(true))])
    }

    /// Request the ability to access object storage, optionally restricted
    /// to resources matching the given patterns. `None` (or an empty list)
    /// requests unrestricted access.
    pub fn enable_object_storage_access(
        &self,
        patterns: Option<Vec<String>>,
    ) -> Result<(), CoreError> {
        self.request([
            (keys::ENABLE_OBJECT_STORAGE_ACCESS, json!(true)),
            (
                keys::OBJECT_STORAGE_ACCESS_PATTERNS,
                serde_json::to_value(patterns)?,
            ),
        ])
    }

    /// Request the ability to manage object storage, optionally restricted
    /// to resources matching the given patterns.
    pub fn enable_object_storage_management(
        &self,
        patterns: Option<Vec<String>>,
    ) -> Result<(), CoreError> {
        self.request([
            (keys::ENABLE_OBJECT_STORAGE_MANAGEMENT, json!(true)),
            (
                keys::OBJECT_STORAGE_MANAGEMENT_PATTERNS,
                serde_json::to_value(patterns)?,
            ),
        ])
    }

    /// Content hash of the request as currently published, the value a
    /// fulfilled request will carry in the provider's `completed` map.
    pub fn expected_hash(&self) -> Result<RequestHash, CoreError> {
        let published = databag::read_local_request(self.transport)?;
        Ok(compute_request_hash(&published)?)
    }

    /// The endpoint's explicit state, for the caller to inspect directly
    /// instead of watching ambient framework flags.
    ///
    /// `Ready` means the provider's published `completed` map carries a
    /// hash for this instance equal to the hash of our currently published
    /// request; publishing any new request therefore revokes `Ready` until
    /// the provider catches up. A broken relation is `NotJoined`.
    pub fn state(&self) -> Result<EndpointState, CoreError> {
        let units = self.transport.joined_units()?;
        // A single provider application with a single unit is expected on
        // the other side of this relation.
        let Some(provider) = units.first() else {
            return Ok(EndpointState::NotJoined);
        };
        let published = databag::read_local_request(self.transport)?;
        if !published.requested {
            return Ok(EndpointState::Joined);
        }
        let expected = compute_request_hash(&published)?;
        let completed_map = completed::read_remote_completed(self.transport, provider)?;
        match completed_map.get(self.instance.as_str()) {
            Some(hash) if *hash == expected => Ok(EndpointState::Ready),
            _ => Ok(EndpointState::Joined),
        }
    }

    fn request<'a, I>(&self, entries: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        databag::publish_request_fields(self.transport, entries)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcplink_relation::MemoryRelation;
    use gcplink_schema::UnitName;

    fn requires(relation: &MemoryRelation) -> GcpRequires<'_, MemoryRelation> {
        GcpRequires::new(
            relation,
            InstanceName::new("juju-1a2b3c-0"),
            Zone::new("us-east1-b"),
        )
    }

    #[test]
    fn publish_instance_info_reports_identity() {
        let relation = MemoryRelation::new();
        requires(&relation).publish_instance_info().unwrap();

        let published = databag::read_local_request(&relation).unwrap();
        assert_eq!(published.instance, "juju-1a2b3c-0");
        assert_eq!(published.zone, "us-east1-b");
        // Identity alone is not a request.
        assert!(!published.requested);
    }

    #[test]
    fn enable_methods_set_flag_and_requested() {
        let relation = MemoryRelation::new();
        let gcp = requires(&relation);
        gcp.enable_load_balancer_management().unwrap();
        gcp.enable_instance_inspection().unwrap();

        let published = databag::read_local_request(&relation).unwrap();
        assert!(published.requested);
        assert!(published.enable_load_balancer_management);
        assert!(published.enable_instance_inspection);
        assert!(!published.enable_dns_management);
    }

    #[test]
    fn enable_twice_is_idempotent() {
        let relation = MemoryRelation::new();
        let gcp = requires(&relation);
        gcp.enable_dns().unwrap();
        let first = databag::read_local_request(&relation).unwrap();
        gcp.enable_dns().unwrap();
        let second = databag::read_local_request(&relation).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn object_storage_patterns_roundtrip() {
        let relation = MemoryRelation::new();
        let gcp = requires(&relation);
        gcp.enable_object_storage_access(Some(vec!["bucket-a/*".to_owned()]))
            .unwrap();
        gcp.enable_object_storage_management(None).unwrap();

        let published = databag::read_local_request(&relation).unwrap();
        assert!(published.enable_object_storage_access);
        assert_eq!(published.object_storage_access_patterns, vec!["bucket-a/*"]);
        assert!(published.enable_object_storage_management);
        // None decodes back as unrestricted.
        assert!(published.object_storage_management_patterns.is_empty());
    }

    #[test]
    fn label_instance_merges_and_keeps_deletion_sentinel() {
        let relation = MemoryRelation::new();
        let gcp = requires(&relation);
        gcp.label_instance([("env".to_owned(), Some("prod".to_owned()))])
            .unwrap();
        gcp.label_instance([("tier".to_owned(), None)]).unwrap();

        let published = databag::read_local_request(&relation).unwrap();
        assert_eq!(published.instance_labels.len(), 2);
        assert_eq!(published.instance_labels["env"], Some("prod".to_owned()));
        assert_eq!(published.instance_labels["tier"], None);
    }

    #[test]
    fn label_instance_rejects_invalid_keys() {
        let relation = MemoryRelation::new();
        let gcp = requires(&relation);
        assert!(gcp
            .label_instance([("Not Valid".to_owned(), Some("x".to_owned()))])
            .is_err());
        // Nothing was published.
        assert!(!databag::read_local_request(&relation).unwrap().requested);
    }

    #[test]
    fn state_is_not_joined_without_provider() {
        let relation = MemoryRelation::new();
        assert_eq!(requires(&relation).state().unwrap(), EndpointState::NotJoined);
    }

    #[test]
    fn state_is_joined_before_any_request() {
        let relation = MemoryRelation::new();
        relation.join("gcp-integrator/0").unwrap();
        assert_eq!(requires(&relation).state().unwrap(), EndpointState::Joined);
    }

    #[test]
    fn state_becomes_ready_when_provider_completes() {
        let relation = MemoryRelation::new();
        relation.join("gcp-integrator/0").unwrap();
        let gcp = requires(&relation);
        gcp.publish_instance_info().unwrap();
        gcp.enable_dns().unwrap();
        assert_eq!(gcp.state().unwrap(), EndpointState::Joined);

        // Provider fulfills the request and publishes the handled hash.
        let expected = gcp.expected_hash().unwrap();
        relation
            .publish_remote(
                &UnitName::new("gcp-integrator/0"),
                completed::COMPLETED_MAP_KEY,
                serde_json::json!({"juju-1a2b3c-0": expected.as_str()}),
            )
            .unwrap();
        assert_eq!(gcp.state().unwrap(), EndpointState::Ready);
    }

    #[test]
    fn new_request_revokes_ready() {
        let relation = MemoryRelation::new();
        relation.join("gcp-integrator/0").unwrap();
        let gcp = requires(&relation);
        gcp.publish_instance_info().unwrap();
        gcp.enable_dns().unwrap();

        let expected = gcp.expected_hash().unwrap();
        relation
            .publish_remote(
                &UnitName::new("gcp-integrator/0"),
                completed::COMPLETED_MAP_KEY,
                serde_json::json!({"juju-1a2b3c-0": expected.as_str()}),
            )
            .unwrap();
        assert_eq!(gcp.state().unwrap(), EndpointState::Ready);

        gcp.enable_network_management().unwrap();
        assert_eq!(gcp.state().unwrap(), EndpointState::Joined);
    }

    #[test]
    fn state_is_not_joined_after_break() {
        let relation = MemoryRelation::new();
        relation.join("gcp-integrator/0").unwrap();
        let gcp = requires(&relation);
        gcp.enable_dns().unwrap();
        relation.depart(&UnitName::new("gcp-integrator/0")).unwrap();
        assert_eq!(gcp.state().unwrap(), EndpointState::NotJoined);
    }
}
