use crate::CoreError;
use gcplink_relation::{completed, databag, RelationTransport};
use gcplink_schema::{
    compute_request_hash, ApplicationName, InstanceName, LabelMap, RequestData, RequestHash,
    UnitName, Zone,
};
use tracing::debug;

/// One remote unit's integration request, materialized from its published
/// relation data.
///
/// A request is a view, not a stored entity: it is rebuilt fresh from the
/// transport on load and carries the content hash of the data it saw.
/// Whether it is [`changed`](Self::changed) is decided against the
/// completed-hash ledger, so a request stays "changed" until
/// [`mark_completed`](Self::mark_completed) records the current hash, and
/// becomes changed again only when the requirer publishes different values.
pub struct IntegrationRequest<'t, T: RelationTransport> {
    transport: &'t T,
    unit_name: UnitName,
    application_name: ApplicationName,
    data: RequestData,
    hash: RequestHash,
}

impl<'t, T: RelationTransport> IntegrationRequest<'t, T> {
    /// Read the unit's published fields and compute their content hash.
    pub fn load(transport: &'t T, unit_name: UnitName) -> Result<Self, CoreError> {
        let data = databag::read_request(transport, &unit_name)?;
        let hash = compute_request_hash(&data)?;
        let application_name = unit_name.application();
        Ok(Self {
            transport,
            unit_name,
            application_name,
            data,
            hash,
        })
    }

    /// Drop the cached view and re-read from the transport.
    ///
    /// Relation data can change underneath a handler mid-invocation (for
    /// example after it has acted on another request); this gives the
    /// handler a consistent re-check without constructing a new view.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        *self = Self::load(self.transport, self.unit_name.clone())?;
        Ok(())
    }

    /// The name of the unit making the request.
    pub fn unit_name(&self) -> &UnitName {
        &self.unit_name
    }

    /// The name of the application making the request.
    pub fn application_name(&self) -> &ApplicationName {
        &self.application_name
    }

    /// The typed request record this view was built from.
    pub fn data(&self) -> &RequestData {
        &self.data
    }

    /// SHA-256 content hash of the request's canonical form.
    pub fn hash(&self) -> &RequestHash {
        &self.hash
    }

    /// Whether this request is new or has changed since it was last marked
    /// completed.
    ///
    /// A unit that has not issued any request yet is not changed; a request
    /// with no ledger entry (first seen) always is.
    pub fn changed(&self) -> Result<bool, CoreError> {
        if !self.data.requested {
            return Ok(false);
        }
        let last = completed::load_completed_hash(self.transport, &self.unit_name)?;
        Ok(last.as_ref() != Some(&self.hash))
    }

    /// Record this request as fulfilled.
    ///
    /// Durably persists the current hash under the unit-namespaced ledger
    /// key (and the shared `completed` map, once the unit has reported its
    /// instance) before returning, suppressing re-processing until the
    /// requirer changes its request.
    pub fn mark_completed(&self) -> Result<(), CoreError> {
        completed::store_completed_hash(
            self.transport,
            &self.unit_name,
            &self.data.instance,
            &self.hash,
        )?;
        debug!(unit = %self.unit_name, hash = %self.hash, "marked request completed");
        Ok(())
    }

    /// The instance name reported for this request; empty when the unit has
    /// not reported yet.
    pub fn instance(&self) -> &InstanceName {
        &self.data.instance
    }

    /// The zone reported for this request.
    pub fn zone(&self) -> &Zone {
        &self.data.zone
    }

    /// Labels to apply to the instance; a `None` value requests deletion of
    /// that label.
    pub fn instance_labels(&self) -> &LabelMap {
        &self.data.instance_labels
    }

    /// Whether the ability to inspect instances was requested.
    pub fn requested_instance_inspection(&self) -> bool {
        self.data.enable_instance_inspection
    }

    /// Whether the ability to manage networking (firewalls, subnets, etc)
    /// was requested.
    pub fn requested_network_management(&self) -> bool {
        self.data.enable_network_management
    }

    /// Whether load balancer management was requested.
    pub fn requested_load_balancer_management(&self) -> bool {
        self.data.enable_load_balancer_management
    }

    /// Whether block storage management was requested.
    pub fn requested_block_storage_management(&self) -> bool {
        self.data.enable_block_storage_management
    }

    /// Whether DNS management was requested.
    pub fn requested_dns_management(&self) -> bool {
        self.data.enable_dns_management
    }

    /// Whether object storage access was requested.
    pub fn requested_object_storage_access(&self) -> bool {
        self.data.enable_object_storage_access
    }

    /// Patterns narrowing object storage access; empty means unrestricted.
    pub fn object_storage_access_patterns(&self) -> &[String] {
        &self.data.object_storage_access_patterns
    }

    /// Whether object storage management was requested.
    pub fn requested_object_storage_management(&self) -> bool {
        self.data.enable_object_storage_management
    }

    /// Patterns narrowing object storage management; empty means
    /// unrestricted.
    pub fn object_storage_management_patterns(&self) -> &[String] {
        &self.data.object_storage_management_patterns
    }
}
