//! Reconf Runtime - hosting layer for reconf configuration entities.
//!
//! This crate provides:
//! - Entity loading, proposals and persistence (`ConfigHost`)
//! - The registry of loaded entities (`ConfigRegistry`, `ConfigSlot`)
//! - Storage backends (`JsonFileStore`, `MemoryStore`)
//! - Proposal and commit messages for remote parties (`wire`)
//! - Engine settings and logging configuration
//!
//! # Loading and Proposing
//!
//! ```ignore
//! use reconf_runtime::{ConfigHost, config::load_config};
//! use reconf_core::PartyId;
//!
//! let host = ConfigHost::from_config(&load_config()?);
//! let slot = host.load::<ServerSettings>("world")?;
//!
//! let mut pending = slot.snapshot();
//! pending.motd = "Welcome".into();
//! match host.propose(pending, PartyId::LOCAL)? {
//!     Outcome::Committed => {}
//!     Outcome::NeedsFullReload => host.reload::<ServerSettings>()?,
//!     Outcome::PolicyRejected(reason) => eprintln!("{reason}"),
//! }
//! ```
//!
//! # Remote Proposals
//!
//! A dependent party sends a [`ProposalRequest`] to the authoritative host,
//! which answers through [`ConfigHost::handle_request`]. Commits of shared
//! entities are published as [`ConfigChanged`] and mirrored with
//! [`ConfigHost::apply_change`].

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod registry;
pub mod store;
pub mod wire;

#[cfg(test)]
mod fixtures;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, EngineConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use host::ConfigHost;
pub use logging::{LoggingBuilder, SpanEvents};
pub use registry::{ConfigRegistry, ConfigSlot, ErasedSlot, RegistryStats};
pub use store::{ConfigStore, JsonFileStore, MemoryStore, StoreError, StoreResult};
pub use wire::{ConfigChanged, ProposalReply, ProposalRequest, RejectReason};

pub use tracing;
