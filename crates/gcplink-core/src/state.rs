use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Explicit requirer-endpoint state, replacing the boundary flags the
/// hosting framework would otherwise toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EndpointState {
    /// No provider unit is joined to the relation.
    NotJoined,
    /// Joined; capabilities may be requested, none fulfilled yet (or a new
    /// request is outstanding).
    Joined,
    /// Every requested capability has been fulfilled for this instance.
    Ready,
}

impl std::fmt::Display for EndpointState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointState::NotJoined => write!(f, "not-joined"),
            EndpointState::Joined => write!(f, "joined"),
            EndpointState::Ready => write!(f, "ready"),
        }
    }
}

/// Check a state transition against the endpoint lifecycle:
/// `not-joined -> joined -> ready -> joined` (new requests revoke ready),
/// with any state dropping to `not-joined` when the relation breaks.
/// Self-transitions for `joined` and `ready` are allowed, since repeated
/// event cycles legitimately re-observe the same state.
pub fn validate_transition(from: EndpointState, to: EndpointState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            EndpointState::NotJoined | EndpointState::Joined | EndpointState::Ready,
            EndpointState::NotJoined
        ) | (EndpointState::NotJoined | EndpointState::Joined, EndpointState::Joined)
            | (EndpointState::Joined | EndpointState::Ready, EndpointState::Ready)
            | (EndpointState::Ready, EndpointState::Joined)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
