//! Messages exchanged between a dependent party and the authoritative host.
//!
//! A dependent party sends a [`ProposalRequest`] carrying the full values of
//! its pending instance; the host answers with a [`ProposalReply`]. After a
//! commit of a shared entity the host publishes [`ConfigChanged`] so every
//! party can mirror the new values.
//!
//! Transport is out of scope; all messages are plain serde types.

use reconf_core::{ConfigEntity, Identity, Outcome, PartyId, Rejection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A proposal addressed to the authoritative host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRequest {
    /// Full name (`owner/name`) of the target entity.
    pub config: String,
    /// Party proposing the change.
    pub proposer: PartyId,
    /// Values of the pending instance, keyed by member name.
    pub payload: Value,
}

impl ProposalRequest {
    /// Builds a request from a pending instance.
    pub fn for_entity<T: ConfigEntity>(identity: &Identity, pending: &T, proposer: PartyId) -> Self {
        Self {
            config: identity.full_name(),
            proposer,
            payload: pending.to_json(),
        }
    }
}

/// Why a proposal was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum RejectReason {
    /// A reload-required member differs.
    NeedsFullReload,
    /// The acceptance policy declined; carries the reason key.
    Policy(String),
}

impl RejectReason {
    /// The reason as a lookup key.
    pub fn key(&self) -> &str {
        match self {
            Self::NeedsFullReload => Rejection::RELOAD_REQUIRED_KEY,
            Self::Policy(key) => key,
        }
    }
}

/// The host's answer to a [`ProposalRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProposalReply {
    /// The proposal became the active instance.
    Committed,
    /// The proposal was declined.
    Rejected { reason: RejectReason },
    /// No entity with this name is loaded on the host.
    UnknownConfig { config: String },
    /// The entity is client-local and has no authoritative side.
    ClientLocal { config: String },
    /// The payload did not fit the entity.
    Malformed { error: String },
}

impl ProposalReply {
    /// Returns `true` if the proposal was committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Rejection key for display, if the proposal was declined by the protocol.
    pub fn rejection_key(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason } => Some(reason.key()),
            _ => None,
        }
    }
}

impl From<Outcome> for ProposalReply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Committed => Self::Committed,
            Outcome::NeedsFullReload => Self::Rejected {
                reason: RejectReason::NeedsFullReload,
            },
            Outcome::PolicyRejected(rejection) => Self::Rejected {
                reason: RejectReason::Policy(rejection.reason().to_string()),
            },
        }
    }
}

/// Notification that a shared entity committed new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChanged {
    /// Full name (`owner/name`) of the entity.
    pub config: String,
    /// Party whose proposal was committed.
    pub proposer: PartyId,
    /// The committed values, keyed by member name.
    pub payload: Value,
}
