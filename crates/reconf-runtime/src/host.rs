//! Hosting of configuration entities.
//!
//! [`ConfigHost`] owns the registry, the store and the commit broadcast. It
//! loads entities from the store, runs proposals against the registered
//! instances, persists commits and publishes commits of shared entities.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use reconf_runtime::{ConfigHost, config::load_config};
//! use reconf_core::PartyId;
//!
//! let host = ConfigHost::from_config(&load_config()?);
//! let slot = host.load::<ServerSettings>("world")?;
//!
//! let mut pending = slot.snapshot();
//! pending.motd = "Welcome".into();
//! let outcome = host.propose(pending, PartyId::LOCAL)?;
//! ```

use std::sync::Arc;

use reconf_core::{ConfigEntity, Identity, Outcome, PartyId, Proposal, Scope};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, debug_span, error, info, trace, warn};

use crate::config::{ConfigLoader, EngineConfig, StorageBackend};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::registry::{ConfigRegistry, ConfigSlot};
use crate::store::{ConfigStore, JsonFileStore, MemoryStore};
use crate::wire::{ConfigChanged, ProposalReply, ProposalRequest};

/// Default capacity of the commit broadcast channel.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Loads, proposes to and persists configuration entities.
pub struct ConfigHost {
    registry: ConfigRegistry,
    store: Arc<dyn ConfigStore>,
    changes: broadcast::Sender<ConfigChanged>,
}

impl ConfigHost {
    /// Creates a host over `store`, buffering up to `capacity` commit
    /// notifications per subscriber.
    pub fn new(store: Arc<dyn ConfigStore>, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: ConfigRegistry::new(),
            store,
            changes,
        }
    }

    /// Creates a host from engine settings, initializing logging first.
    pub fn from_config(config: &EngineConfig) -> Self {
        logging::init_from_config(&config.logging);

        let store: Arc<dyn ConfigStore> = match config.storage.backend {
            StorageBackend::File => {
                Arc::new(JsonFileStore::new(&config.storage.dir).pretty(config.storage.pretty))
            }
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };

        info!(
            backend = ?config.storage.backend,
            dir = %config.storage.dir.display(),
            log_level = %config.logging.level,
            "Configuration host initialized"
        );

        Self::new(store, config.sync.broadcast_capacity)
    }

    /// Loads engine settings through `loader` and creates a host from them.
    ///
    /// # Errors
    ///
    /// Fails if the settings cannot be read or do not validate.
    pub fn from_loader(loader: ConfigLoader) -> RuntimeResult<Self> {
        let config = loader.load()?;
        Ok(Self::from_config(&config))
    }

    /// Creates a host keeping stored values in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_BROADCAST_CAPACITY)
    }

    /// The registry of loaded entities.
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// Subscribes to commits of shared entities.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChanged> {
        self.changes.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Loads the entity of type `T` owned by `owner`.
    ///
    /// Stored values are populated into a default instance. Missing or invalid
    /// stored data falls back to defaults. `on_loaded` fires before the
    /// instance is published.
    pub fn load<T: ConfigEntity + Default>(&self, owner: &str) -> RuntimeResult<Arc<ConfigSlot<T>>> {
        let identity = Identity::new(owner, T::NAME);
        let mut value = self.read_stored::<T>(&identity);
        value.on_loaded();
        self.registry.register(identity, value)
    }

    /// Re-reads the entity of type `T` from the store and replaces the active
    /// instance. This is the full reload a [`Outcome::NeedsFullReload`] calls
    /// for.
    pub fn reload<T: ConfigEntity + Default>(&self) -> RuntimeResult<()> {
        let slot = self.get::<T>()?;
        let mut value = self.read_stored::<T>(slot.identity());
        value.on_loaded();
        *slot.lock() = value;
        info!(config = %slot.identity(), "Configuration reloaded");
        Ok(())
    }

    /// Removes every entity owned by `owner`.
    pub fn unload_owner(&self, owner: &str) -> Vec<Identity> {
        let removed = self.registry.unload_owner(owner);
        debug!(owner, removed = ?removed, "Owner unloaded");
        removed
    }

    /// Returns the slot of the loaded entity of type `T`.
    pub fn get<T: ConfigEntity>(&self) -> RuntimeResult<Arc<ConfigSlot<T>>> {
        self.registry
            .get::<T>()
            .ok_or(RuntimeError::NotRegistered(T::NAME))
    }

    fn read_stored<T: ConfigEntity + Default>(&self, identity: &Identity) -> T {
        let mut value = T::default();
        match self.store.load(identity) {
            Ok(Some(stored)) => {
                if let Err(e) = value.assign_json(&stored) {
                    warn!(config = %identity, error = %e, "Stored values do not fit, using defaults");
                    value = T::default();
                }
            }
            Ok(None) => debug!(config = %identity, "Nothing stored, using defaults"),
            Err(e) => warn!(config = %identity, error = %e, "Failed to read stored values, using defaults"),
        }
        value
    }

    // =========================================================================
    // Proposals
    // =========================================================================

    /// Runs the acceptance protocol for `pending` against the active instance
    /// of `T`.
    ///
    /// A commit is persisted and, for shared entities, published. A failure to
    /// persist is logged; the commit stands.
    pub fn propose<T: ConfigEntity>(&self, pending: T, proposer: PartyId) -> RuntimeResult<Outcome> {
        let slot = self.get::<T>()?;
        let mut active = slot.lock();
        let outcome = Proposal::new(pending, proposer).evaluate(&mut active);
        if outcome.is_committed() {
            self.publish(slot.identity(), T::mode(), proposer, &active.to_json());
        }
        Ok(outcome)
    }

    /// Persists `pending` without applying it, to be picked up by
    /// [`reload`](Self::reload).
    pub fn stage<T: ConfigEntity>(&self, pending: &T) -> RuntimeResult<()> {
        let slot = self.get::<T>()?;
        self.store.save(slot.identity(), &pending.to_json())?;
        debug!(config = %slot.identity(), "Pending values staged for reload");
        Ok(())
    }

    /// Returns a default pending instance carrying over the ignored members of
    /// the active instance.
    pub fn reset_pending<T: ConfigEntity + Default>(&self) -> RuntimeResult<T> {
        let slot = self.get::<T>()?;
        let mut pending = T::default();
        let active = slot.lock();
        for member in T::members().members().iter().filter(|m| m.is_ignored()) {
            let current = member.get(&*active).map(|value| value.to_json());
            if let (Some(current), Some(target)) = (current, member.get_mut(&mut pending)) {
                target
                    .assign_json(&current)
                    .map_err(|e| e.within(member.name()))?;
            }
        }
        Ok(pending)
    }

    /// Handles a proposal from another party against the local authoritative
    /// instance.
    pub fn handle_request(&self, request: &ProposalRequest) -> ProposalReply {
        let _span = debug_span!(
            "remote_proposal",
            config = %request.config,
            proposer = %request.proposer
        )
        .entered();

        let Some(slot) = self.registry.by_name(&request.config) else {
            debug!(config = %request.config, proposer = %request.proposer, "Proposal for unknown configuration");
            return ProposalReply::UnknownConfig {
                config: request.config.clone(),
            };
        };

        let scope = slot.scope();
        if !scope.requires_authority() {
            debug!(config = %request.config, "Proposal for client-local configuration");
            return ProposalReply::ClientLocal {
                config: request.config.clone(),
            };
        }

        let identity = slot.identity().clone();
        let result = slot.propose_json(&request.payload, request.proposer, &mut |values| {
            self.publish(&identity, scope, request.proposer, values)
        });
        match result {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                warn!(config = %identity, proposer = %request.proposer, error = %e, "Malformed proposal");
                ProposalReply::Malformed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Mirrors a commit made by the authoritative side.
    pub fn apply_change(&self, change: &ConfigChanged) -> RuntimeResult<()> {
        let slot = self
            .registry
            .by_name(&change.config)
            .ok_or_else(|| RuntimeError::UnknownConfig(change.config.clone()))?;
        slot.apply_json(&change.payload)?;
        debug!(config = %change.config, proposer = %change.proposer, "Applied remote commit");
        Ok(())
    }

    fn publish(&self, identity: &Identity, scope: Scope, proposer: PartyId, values: &Value) {
        if let Err(e) = self.store.save(identity, values) {
            error!(config = %identity, error = %e, "Failed to persist committed values");
        }

        if scope.is_shared() {
            let change = ConfigChanged {
                config: identity.full_name(),
                proposer,
                payload: values.clone(),
            };
            if self.changes.send(change).is_err() {
                trace!(config = %identity, "No subscribers for commit");
            }
        }
    }
}

impl Default for ConfigHost {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AntiCheat, ClientPrefs, Engine, ServerRules};
    use crate::wire::RejectReason;
    use parking_lot::Mutex;
    use reconf_core::Rejection;
    use serde_json::json;
    use tracing::{Subscriber, span};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn host_with(store: Arc<MemoryStore>) -> ConfigHost {
        ConfigHost::new(store, 8)
    }

    fn request(config: &str, payload: Value) -> ProposalRequest {
        ProposalRequest {
            config: config.into(),
            proposer: PartyId(7),
            payload,
        }
    }

    /// Records the name of every span created.
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
            self.0.lock().push(attrs.metadata().name());
        }
    }

    #[test]
    fn test_load_populates_from_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(
                &Identity::new("world", "ServerRules"),
                &json!({ "motd": "stored", "session_token": "leaked" }),
            )
            .unwrap();

        let host = host_with(store);
        let slot = host.load::<ServerRules>("world").unwrap();
        slot.read(|rules| {
            assert_eq!(rules.motd, "stored");
            assert_eq!(rules.session_token, "");
            assert_eq!(rules.loads, 1);
            assert_eq!(rules.changes, 0);
        });
    }

    #[test]
    fn test_load_falls_back_on_bad_data() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&Identity::new("world", "ServerRules"), &json!({ "port": "high" }))
            .unwrap();

        let host = host_with(store);
        let slot = host.load::<ServerRules>("world").unwrap();
        assert_eq!(slot.read(|rules| rules.port), 0);
    }

    #[test]
    fn test_load_twice_fails() {
        let host = ConfigHost::in_memory();
        host.load::<ClientPrefs>("client").unwrap();
        let err = host.load::<ClientPrefs>("client").unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_propose_persists_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let host = host_with(Arc::clone(&store));
        let mut changes = host.subscribe();
        let slot = host.load::<ServerRules>("world").unwrap();

        let mut pending = slot.snapshot();
        pending.motd = "hi".into();
        let outcome = host.propose(pending, PartyId::LOCAL).unwrap();
        assert!(outcome.is_committed());

        let stored = store.load(slot.identity()).unwrap().unwrap();
        assert_eq!(stored["motd"], json!("hi"));

        let change = changes.try_recv().unwrap();
        assert_eq!(change.config, "world/ServerRules");
        assert_eq!(change.payload["motd"], json!("hi"));
    }

    #[test]
    fn test_unshared_commit_is_not_broadcast() {
        let host = ConfigHost::in_memory();
        let mut changes = host.subscribe();
        let slot = host.load::<AntiCheat>("world").unwrap();

        let mut pending = slot.snapshot();
        pending.strict = true;
        assert!(host.propose(pending, PartyId(1)).unwrap().is_committed());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_reload_required_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let host = host_with(Arc::clone(&store));
        let slot = host.load::<ServerRules>("world").unwrap();

        let mut pending = slot.snapshot();
        pending.port = 25565;
        let outcome = host.propose(pending.clone(), PartyId::LOCAL).unwrap();
        assert!(matches!(outcome, Outcome::NeedsFullReload));
        assert!(store.is_empty());
        assert_eq!(slot.read(|rules| rules.port), 0);

        host.stage(&pending).unwrap();
        host.reload::<ServerRules>().unwrap();
        slot.read(|rules| {
            assert_eq!(rules.port, 25565);
            assert_eq!(rules.loads, 1);
        });
    }

    #[test]
    fn test_reset_pending_keeps_ignored_members() {
        let host = ConfigHost::in_memory();
        let slot = host.load::<ServerRules>("world").unwrap();
        host.registry()
            .by_name("world/ServerRules")
            .unwrap()
            .apply_json(&json!({ "motd": "custom" }))
            .unwrap();
        slot.lock().session_token = "token".into();

        let pending = host.reset_pending::<ServerRules>().unwrap();
        assert_eq!(pending.motd, "");
        assert_eq!(pending.session_token, "token");
    }

    #[test]
    fn test_handle_request_outcomes() {
        let host = ConfigHost::in_memory();
        host.load::<ServerRules>("world").unwrap();
        host.load::<ClientPrefs>("client").unwrap();

        let reply = host.handle_request(&request("world/ServerRules", json!({ "motd": "remote" })));
        assert!(reply.is_committed());

        let reply = host.handle_request(&request("world/ServerRules", json!({ "max_players": 500 })));
        assert_eq!(
            reply,
            ProposalReply::Rejected {
                reason: RejectReason::Policy("rules.max_players.too_high".into())
            }
        );

        let reply = host.handle_request(&request("world/ServerRules", json!({ "port": 1 })));
        assert_eq!(reply.rejection_key(), Some(Rejection::RELOAD_REQUIRED_KEY));

        let reply = host.handle_request(&request("world/ServerRules", json!({ "motd": 3 })));
        assert!(matches!(reply, ProposalReply::Malformed { .. }));

        let reply = host.handle_request(&request("client/ClientPrefs", json!({})));
        assert!(matches!(reply, ProposalReply::ClientLocal { .. }));

        let reply = host.handle_request(&request("world/Missing", json!({})));
        assert!(matches!(reply, ProposalReply::UnknownConfig { .. }));

        let motd = host.get::<ServerRules>().unwrap().read(|rules| rules.motd.clone());
        assert_eq!(motd, "remote");
    }

    #[test]
    fn test_apply_change_mirrors_commit() {
        let authority = ConfigHost::in_memory();
        let dependent = ConfigHost::in_memory();
        authority.load::<ServerRules>("world").unwrap();
        let mirror = dependent.load::<ServerRules>("world").unwrap();
        let mut changes = authority.subscribe();

        let request = ProposalRequest {
            config: "world/ServerRules".into(),
            proposer: PartyId(2),
            payload: json!({ "max_players": 20 }),
        };
        assert!(authority.handle_request(&request).is_committed());

        let change = changes.try_recv().unwrap();
        dependent.apply_change(&change).unwrap();
        mirror.read(|rules| {
            assert_eq!(rules.max_players, 20);
            assert_eq!(rules.changes, 1);
        });

        let unknown = ConfigChanged {
            config: "world/Missing".into(),
            ..change
        };
        assert!(matches!(
            dependent.apply_change(&unknown),
            Err(RuntimeError::UnknownConfig(_))
        ));
    }

    #[test]
    fn test_unload_owner() {
        let host = ConfigHost::in_memory();
        host.load::<ServerRules>("world").unwrap();
        host.load::<ClientPrefs>("client").unwrap();

        assert_eq!(host.unload_owner("world").len(), 1);
        assert!(matches!(
            host.get::<ServerRules>(),
            Err(RuntimeError::NotRegistered("ServerRules"))
        ));
        assert!(host.get::<ClientPrefs>().is_ok());
    }

    #[test]
    fn test_file_backed_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.storage.dir = dir.path().to_path_buf();

        let host = ConfigHost::from_config(&config);
        let slot = host.load::<ClientPrefs>("client").unwrap();
        let mut pending = slot.snapshot();
        pending.volume = 40;
        assert!(host.propose(pending, PartyId::LOCAL).unwrap().is_committed());

        let reopened = ConfigHost::from_config(&config);
        let slot = reopened.load::<ClientPrefs>("client").unwrap();
        assert_eq!(slot.read(|prefs| prefs.volume), 40);
    }

    #[test]
    fn test_rejected_remote_proposal_keeps_shared_node() {
        let host = ConfigHost::in_memory();
        let slot = host.load::<Engine>("world").unwrap();
        let tuning = slot.read(|engine| Arc::clone(&engine.tuning));

        let reply = host.handle_request(&request("world/Engine", json!({ "tuning": { "threads": 8 } })));
        assert_eq!(reply.rejection_key(), Some(Rejection::RELOAD_REQUIRED_KEY));
        assert_eq!(tuning.read().threads, 0);

        let reply = host.handle_request(&request(
            "world/Engine",
            json!({ "tuning": { "gain": 0.5 }, "motd": "forbidden" }),
        ));
        assert_eq!(reply.rejection_key(), Some("engine.motd.forbidden"));
        assert_eq!(tuning.read().gain, 0.0);

        let reply = host.handle_request(&request(
            "world/Engine",
            json!({ "tuning": { "gain": 0.5 }, "motd": 3 }),
        ));
        assert!(matches!(reply, ProposalReply::Malformed { .. }));
        assert_eq!(tuning.read().gain, 0.0);

        let reply = host.handle_request(&request("world/Engine", json!({ "tuning": { "gain": 0.5 } })));
        assert!(reply.is_committed());
        assert_eq!(slot.read(|engine| engine.tuning.read().gain), 0.5);
        assert_eq!(slot.read(|engine| engine.tuning.read().threads), 0);
    }

    #[test]
    fn test_snapshot_edits_stay_pending() {
        let host = ConfigHost::in_memory();
        let slot = host.load::<Engine>("world").unwrap();

        let pending = slot.snapshot();
        pending.tuning.write().threads = 4;
        assert_eq!(slot.read(|engine| engine.tuning.read().threads), 0);

        let outcome = host.propose(pending, PartyId::LOCAL).unwrap();
        assert!(matches!(outcome, Outcome::NeedsFullReload));
        assert_eq!(slot.read(|engine| engine.tuning.read().threads), 0);
    }

    #[test]
    fn test_apply_change_does_not_write_through() {
        let host = ConfigHost::in_memory();
        let slot = host.load::<Engine>("world").unwrap();
        let previous = slot.read(|engine| Arc::clone(&engine.tuning));

        let change = ConfigChanged {
            config: "world/Engine".into(),
            proposer: PartyId(1),
            payload: json!({ "tuning": { "threads": 2 }, "motd": 3 }),
        };
        assert!(matches!(host.apply_change(&change), Err(RuntimeError::Value(_))));
        assert_eq!(previous.read().threads, 0);
    }

    #[test]
    fn test_proposals_are_traced_in_spans() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanNames(Arc::clone(&names)));

        tracing::subscriber::with_default(subscriber, || {
            let host = ConfigHost::in_memory();
            host.load::<ServerRules>("world").unwrap();
            let reply = host.handle_request(&request("world/ServerRules", json!({ "motd": "traced" })));
            assert!(reply.is_committed());
        });

        let names = names.lock();
        assert!(names.contains(&"remote_proposal"));
        assert!(names.contains(&"proposal"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_from_loader_reports_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconf.toml");
        std::fs::write(&path, "[sync]\nbroadcast_capacity = 0\n").unwrap();

        let result = ConfigHost::from_loader(ConfigLoader::new().file(&path).without_env());
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
