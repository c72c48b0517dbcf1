//! # Reconf
//!
//! A typed configuration lifecycle and reconciliation engine.
//!
//! ## Overview
//!
//! Configuration objects are plain structs deriving [`Config`](prelude::Config).
//! A change is never applied by writing into the live object: it is made on a
//! pending clone and proposed. The engine then decides whether the change can
//! be applied live, needs a full reload, or is declined by the authoritative
//! side.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  propose   ┌──────────────────┐   commit   ┌─────────┐
//! │ pending  │───────────▶│ Change Detector  │───────────▶│ active  │──▶ store
//! │  clone   │            │ Acceptance check │            │ (slot)  │──▶ ConfigChanged
//! └──────────┘            └──────────────────┘            └─────────┘
//!                              │         │
//!                     NeedsFullReload  PolicyRejected
//! ```
//!
//! - **Core**: member catalog, annotations, equality, change detection and the
//!   acceptance protocol
//! - **Runtime**: registry, persistence, remote proposals and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reconf::prelude::*;
//!
//! #[derive(Config, Clone, Default)]
//! #[config(scope = "server_shared")]
//! struct ServerSettings {
//!     #[config(reload_required)]
//!     port: u16,
//!     motd: String,
//! }
//!
//! impl ConfigEntity for ServerSettings {}
//!
//! let host = ConfigHost::in_memory();
//! let slot = host.load::<ServerSettings>("world")?;
//!
//! let mut pending = slot.snapshot();
//! pending.motd = "Welcome".into();
//! assert!(host.propose(pending, PartyId::LOCAL)?.is_committed());
//! ```
//!
//! The derive expands to paths under `::reconf_core`, so crates deriving
//! `Config` also depend on `reconf-core` directly.
//!
//! ## Features
//!
//! - `toml-config`: TOML engine settings files (default)
//! - `yaml-config`: YAML engine settings files
//! - `json-log`: JSON log output

pub use reconf_core as core;
pub use reconf_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use reconf::prelude::*;
/// ```
pub mod prelude {
    // Declaring configuration types
    pub use reconf_core::{Config, ConfigEntity, Configurable, PartyId, Rejection, Scope};

    // Inspecting and editing
    pub use reconf_core::{Aggregate, FieldView, Inspect, describe, set_member};

    // Proposals
    pub use reconf_core::{ChangeDetector, Outcome, propose};

    // Hosting
    pub use reconf_runtime::{
        ConfigChanged, ConfigHost, ConfigSlot, EngineConfig, ProposalReply, ProposalRequest,
        RuntimeError, RuntimeResult,
    };

    // Common result types
    pub use reconf_core::{CoreError, CoreResult};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;

    #[derive(Config, Debug, Clone, Default)]
    #[config(scope = "server_shared")]
    struct ServerSettings {
        #[config(reload_required)]
        port: u16,
        motd: String,
    }

    impl ConfigEntity for ServerSettings {}

    #[test]
    fn test_prelude_round_trip() {
        let authority = ConfigHost::in_memory();
        let dependent = ConfigHost::in_memory();
        authority.load::<ServerSettings>("world").unwrap();
        let local = dependent.load::<ServerSettings>("world").unwrap();
        let mut changes = authority.subscribe();

        let mut pending = local.snapshot();
        set_member(&mut pending, "motd", &json!("Welcome")).unwrap();
        let request = ProposalRequest::for_entity(local.identity(), &pending, PartyId(5));

        assert!(authority.handle_request(&request).is_committed());
        dependent.apply_change(&changes.try_recv().unwrap()).unwrap();
        assert_eq!(local.read(|settings| settings.motd.clone()), "Welcome");

        pending.port = 8080;
        assert!(matches!(
            dependent.propose(pending, PartyId::LOCAL).unwrap(),
            Outcome::NeedsFullReload
        ));
    }
}
