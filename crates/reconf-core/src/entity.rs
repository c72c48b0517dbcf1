//! The configuration entity contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Configurable;
use crate::detector::ChangeDetector;

// =============================================================================
// Scope
// =============================================================================

/// Synchronization scope of a configuration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Local to the dependent side; never proposed to the authority.
    #[default]
    ClientOnly,
    /// Owned by the authoritative side, not mirrored to dependents.
    ServerOnly,
    /// Owned by the authoritative side and mirrored to dependents.
    ServerShared,
}

impl Scope {
    /// Whether proposals must be accepted by the authoritative side.
    pub fn requires_authority(self) -> bool {
        matches!(self, Self::ServerOnly | Self::ServerShared)
    }

    /// Whether committed values are published to dependents.
    pub fn is_shared(self) -> bool {
        self == Self::ServerShared
    }

    /// Returns the snake_case name of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientOnly => "client_only",
            Self::ServerOnly => "server_only",
            Self::ServerShared => "server_shared",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Identity of a loaded entity: the owning module plus the type's local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// Owning module.
    pub owner: String,
    /// Local name of the configuration type.
    pub name: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Returns `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Identifier of the party proposing a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub u64);

impl PartyId {
    /// The local party.
    pub const LOCAL: PartyId = PartyId(0);
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party#{}", self.0)
    }
}

// =============================================================================
// Rejection
// =============================================================================

/// Reason given by the authoritative side for declining a proposal.
///
/// The reason is preferably an opaque lookup key, since the two parties may
/// display text in different languages.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    /// Key reported when a proposal requires a full reload.
    pub const RELOAD_REQUIRED_KEY: &'static str = "reconf.rejected.reload_required";

    /// Creates a rejection with the given reason key or text.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

// =============================================================================
// ConfigEntity
// =============================================================================

/// A top-level configuration object taking part in the lifecycle.
///
/// Implement it (usually with an empty body) on a type deriving
/// [`Config`](crate::Config) and [`Clone`]:
///
/// ```ignore
/// #[derive(Config, Clone, Default)]
/// #[config(name = "ServerSettings", scope = "server_shared")]
/// struct ServerSettings {
///     #[config(reload_required)]
///     port: u16,
///     motd: String,
/// }
///
/// impl ConfigEntity for ServerSettings {
///     fn accept_changes(&self, pending: &Self, _: PartyId) -> Result<(), Rejection> {
///         if pending.motd.len() > 64 {
///             return Err(Rejection::new("server.motd.too_long"));
///         }
///         Ok(())
///     }
/// }
/// ```
///
/// Derived `Clone` leaves `Arc<RwLock<_>>` members shared with the original.
/// Pending copies are made with [`fork`](ConfigEntity::fork), which gives
/// them their own nodes.
pub trait ConfigEntity: Configurable + Clone + Send + Sync + 'static {
    /// Synchronization scope.
    fn mode() -> Scope {
        Self::SCOPE
    }

    /// A copy of `self` that shares no node with it.
    fn fork(&self) -> Self {
        crate::inspect::fork(self)
    }

    /// Whether moving from `self` to `pending` requires a full reload.
    fn needs_reload(&self, pending: &Self) -> bool {
        ChangeDetector::default().detect(self, pending)
    }

    /// Called once after the instance is loaded.
    fn on_loaded(&mut self) {}

    /// Called once after a proposal is committed into this instance.
    fn on_changed(&mut self) {}

    /// Authoritative-side acceptance hook.
    ///
    /// Only consulted for scopes that require authority, and only after the
    /// reload check passed.
    fn accept_changes(&self, _pending: &Self, _proposer: PartyId) -> Result<(), Rejection> {
        Ok(())
    }
}
