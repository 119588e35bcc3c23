use crate::request::IntegrationRequest;
use crate::CoreError;
use gcplink_relation::{completed, RelationError, RelationTransport};
use gcplink_schema::{keys, ApplicationName, InstanceName, UnitName, Zone};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// The provider side of the interface, for the cloud-integration charm
/// itself.
///
/// Constructed with an explicit transport handle and a membership snapshot
/// taken once, so `requests`, `application_names`, and `unit_instances`
/// all observe the same unit set for the lifetime of the accessor.
///
/// Example flow: iterate [`pending_requests`](Self::pending_requests),
/// perform whatever cloud actions each one asks for, then call
/// `mark_completed()` on it so the next event cycle sees it as handled.
pub struct GcpProvides<'t, T: RelationTransport> {
    transport: &'t T,
    units: Vec<UnitName>,
}

/// Explicit provider-side status, replacing ambient framework flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    /// Number of remote units currently joined.
    pub joined_units: usize,
    /// Number of requests that are new or changed and await handling.
    pub pending_requests: usize,
}

/// Instance identity one joined unit has reported; empty fields mean
/// "joined but not yet reporting".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitInstance {
    pub instance: InstanceName,
    pub zone: Zone,
}

impl<'t, T: RelationTransport> GcpProvides<'t, T> {
    /// Snapshot relation membership and scope an accessor to it.
    pub fn new(transport: &'t T) -> Result<Self, CoreError> {
        let mut units = transport.joined_units()?;
        units.sort();
        units.dedup();
        Ok(Self { transport, units })
    }

    /// The membership snapshot this accessor works against.
    pub fn joined_units(&self) -> &[UnitName] {
        &self.units
    }

    /// One freshly constructed request per joined unit.
    ///
    /// A unit whose databag fails to decode is skipped with a warning
    /// rather than aborting the whole read; use
    /// [`requests_with_errors`](Self::requests_with_errors) to surface the
    /// failures individually. Transport failures still propagate.
    pub fn requests(&self) -> Result<Vec<IntegrationRequest<'t, T>>, CoreError> {
        let mut out = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            match IntegrationRequest::load(self.transport, unit.clone()) {
                Ok(request) => out.push(request),
                Err(CoreError::Relation(RelationError::MalformedUnitData { unit, source })) => {
                    warn!("skipping malformed request data from unit '{unit}': {source}");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(out)
    }

    /// Like [`requests`](Self::requests), but returns per-unit `Result`s so
    /// a misbehaving requirer is reported instead of silently dropped.
    pub fn requests_with_errors(&self) -> Vec<Result<IntegrationRequest<'t, T>, CoreError>> {
        self.units
            .iter()
            .map(|unit| IntegrationRequest::load(self.transport, unit.clone()))
            .collect()
    }

    /// The new-or-changed subset of [`requests`](Self::requests): what the
    /// provider actually needs to act on this cycle.
    pub fn pending_requests(&self) -> Result<Vec<IntegrationRequest<'t, T>>, CoreError> {
        let mut out = Vec::new();
        for request in self.requests()? {
            if request.changed()? {
                out.push(request);
            }
        }
        Ok(out)
    }

    /// Distinct application names among the joined units.
    pub fn application_names(&self) -> BTreeSet<ApplicationName> {
        self.units.iter().map(UnitName::application).collect()
    }

    /// Mapping of unit name to reported instance identity for every joined
    /// unit, including units that have not reported yet (empty fields), so
    /// callers can tell "joined but silent" from "not joined".
    pub fn unit_instances(&self) -> Result<BTreeMap<UnitName, UnitInstance>, CoreError> {
        let mut out = BTreeMap::new();
        for unit in &self.units {
            let instance = self.read_identity_field(unit, keys::INSTANCE)?;
            let zone = self.read_identity_field(unit, keys::ZONE)?;
            out.insert(
                unit.clone(),
                UnitInstance {
                    instance: InstanceName::new(instance),
                    zone: Zone::new(zone),
                },
            );
        }
        Ok(out)
    }

    /// Explicit status for the caller to inspect, instead of the flag
    /// toggling the original convention relied on.
    pub fn status(&self) -> Result<ProviderStatus, CoreError> {
        Ok(ProviderStatus {
            joined_units: self.units.len(),
            pending_requests: self.pending_requests()?.len(),
        })
    }

    /// Departed-unit cleanup: drop the completed-hash ledger entry so a
    /// unit re-joining later is treated as first-seen.
    pub fn forget(&self, unit: &UnitName) -> Result<(), CoreError> {
        completed::forget_completed_hash(self.transport, unit)?;
        debug!(unit = %unit, "forgot completed hash for departed unit");
        Ok(())
    }

    // Identity fields are plain strings on the wire; a non-string value is
    // that unit's problem, not grounds to fail the whole projection.
    fn read_identity_field(&self, unit: &UnitName, key: &str) -> Result<String, CoreError> {
        match self.transport.read(unit, key)? {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(other) => {
                warn!("unit '{unit}' published non-string '{key}': {other}");
                Ok(String::new())
            }
        }
    }
}
