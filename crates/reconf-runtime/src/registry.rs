//! Registry of loaded configuration entities.
//!
//! Each loaded entity lives in a [`ConfigSlot`], published under its type and
//! its full name (`owner/name`). The slot's mutex is the critical section in
//! which a proposal is evaluated; distinct entities never contend.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};
use reconf_core::{
    ConfigEntity, FieldView, Identity, Outcome, PartyId, Proposal, Scope, ValueError, describe,
    label::type_label,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};

// =============================================================================
// ConfigSlot
// =============================================================================

/// The active instance of one loaded entity.
pub struct ConfigSlot<T> {
    identity: Identity,
    label: OnceLock<String>,
    active: Mutex<T>,
}

impl<T: ConfigEntity> ConfigSlot<T> {
    /// Wraps a loaded instance.
    pub fn new(identity: Identity, active: T) -> Self {
        Self {
            identity,
            label: OnceLock::new(),
            active: Mutex::new(active),
        }
    }

    /// Identity of the entity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Display label of the entity.
    pub fn label(&self) -> &str {
        self.label.get_or_init(|| match T::LABEL {
            Some(label) => label.to_string(),
            None => type_label(T::NAME),
        })
    }

    /// Forks the active instance, typically to edit it as a pending one.
    ///
    /// Shared nodes are copied, so edits to the snapshot never reach the
    /// active instance.
    pub fn snapshot(&self) -> T {
        self.active.lock().fork()
    }

    /// Runs `f` against the active instance.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.active.lock())
    }

    /// Runs the acceptance protocol for `pending` against the active instance.
    pub fn propose(&self, pending: T, proposer: PartyId) -> Outcome {
        Proposal::new(pending, proposer).evaluate(&mut self.active.lock())
    }

    /// Locks the active instance.
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.active.lock()
    }
}

impl<T> fmt::Debug for ConfigSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSlot")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ErasedSlot
// =============================================================================

/// Type-erased access to a [`ConfigSlot`], for requests addressed by name.
pub trait ErasedSlot: Send + Sync {
    /// Identity of the entity.
    fn identity(&self) -> &Identity;

    /// Synchronization scope of the entity type.
    fn scope(&self) -> Scope;

    /// Display label of the entity.
    fn label(&self) -> &str;

    /// Serializes the active instance.
    fn to_json(&self) -> Value;

    /// Editor view of the active instance.
    fn describe(&self) -> Vec<FieldView>;

    /// Populates a fork of the active instance from `payload` and runs the
    /// acceptance protocol with it.
    ///
    /// `on_commit` receives the new active values while the slot is still
    /// locked.
    fn propose_json(
        &self,
        payload: &Value,
        proposer: PartyId,
        on_commit: &mut dyn FnMut(&Value),
    ) -> Result<Outcome, ValueError>;

    /// Applies values committed elsewhere without running the protocol, then
    /// fires `on_changed`.
    fn apply_json(&self, payload: &Value) -> Result<(), ValueError>;

    /// Upcast for downcasting to the concrete slot.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ConfigEntity> ErasedSlot for ConfigSlot<T> {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn scope(&self) -> Scope {
        T::mode()
    }

    fn label(&self) -> &str {
        ConfigSlot::label(self)
    }

    fn to_json(&self) -> Value {
        self.active.lock().to_json()
    }

    fn describe(&self) -> Vec<FieldView> {
        describe(&*self.active.lock())
    }

    fn propose_json(
        &self,
        payload: &Value,
        proposer: PartyId,
        on_commit: &mut dyn FnMut(&Value),
    ) -> Result<Outcome, ValueError> {
        let mut active = self.active.lock();
        let mut pending = active.fork();
        pending.assign_json(payload)?;

        let outcome = Proposal::new(pending, proposer).evaluate(&mut active);
        if outcome.is_committed() {
            on_commit(&active.to_json());
        }
        Ok(outcome)
    }

    fn apply_json(&self, payload: &Value) -> Result<(), ValueError> {
        let mut active = self.active.lock();
        let mut next = active.fork();
        next.assign_json(payload)?;
        *active = next;
        active.on_changed();
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// =============================================================================
// ConfigRegistry
// =============================================================================

#[derive(Default)]
struct Entries {
    by_type: HashMap<TypeId, Arc<dyn ErasedSlot>>,
    by_name: HashMap<String, TypeId>,
}

/// Registry of loaded entities keyed by type and by full name.
#[derive(Default)]
pub struct ConfigRegistry {
    entries: RwLock<Entries>,
}

impl ConfigRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a loaded instance.
    ///
    /// # Errors
    ///
    /// Fails if an entity of the same type or full name is already loaded.
    pub fn register<T: ConfigEntity>(
        &self,
        identity: Identity,
        active: T,
    ) -> RuntimeResult<Arc<ConfigSlot<T>>> {
        let mut entries = self.entries.write();
        let full_name = identity.full_name();
        if entries.by_type.contains_key(&TypeId::of::<T>()) || entries.by_name.contains_key(&full_name)
        {
            return Err(RuntimeError::AlreadyRegistered(identity));
        }

        let slot = Arc::new(ConfigSlot::new(identity, active));
        entries
            .by_type
            .insert(TypeId::of::<T>(), Arc::clone(&slot) as Arc<dyn ErasedSlot>);
        entries.by_name.insert(full_name.clone(), TypeId::of::<T>());

        info!(config = %full_name, scope = %T::mode(), "Registered configuration");
        Ok(slot)
    }

    /// Returns the slot of the loaded entity of type `T`.
    pub fn get<T: ConfigEntity>(&self) -> Option<Arc<ConfigSlot<T>>> {
        let slot = self.entries.read().by_type.get(&TypeId::of::<T>()).cloned()?;
        slot.into_any().downcast::<ConfigSlot<T>>().ok()
    }

    /// Returns the slot of the entity with the given full name.
    pub fn by_name(&self, full_name: &str) -> Option<Arc<dyn ErasedSlot>> {
        let entries = self.entries.read();
        let type_id = entries.by_name.get(full_name)?;
        entries.by_type.get(type_id).cloned()
    }

    /// Removes the entity of type `T`.
    pub fn unregister<T: ConfigEntity>(&self) -> Option<Arc<ConfigSlot<T>>> {
        let slot = {
            let mut entries = self.entries.write();
            let slot = entries.by_type.remove(&TypeId::of::<T>())?;
            entries.by_name.remove(&slot.identity().full_name());
            slot
        };
        debug!(config = %slot.identity(), "Unregistered configuration");
        slot.into_any().downcast::<ConfigSlot<T>>().ok()
    }

    /// Removes every entity owned by `owner`, returning their identities.
    pub fn unload_owner(&self, owner: &str) -> Vec<Identity> {
        let mut entries = self.entries.write();
        let owned: Vec<TypeId> = entries
            .by_type
            .iter()
            .filter(|(_, slot)| slot.identity().owner == owner)
            .map(|(type_id, _)| *type_id)
            .collect();

        let mut removed = Vec::with_capacity(owned.len());
        for type_id in owned {
            if let Some(slot) = entries.by_type.remove(&type_id) {
                entries.by_name.remove(&slot.identity().full_name());
                removed.push(slot.identity().clone());
            }
        }
        removed.sort();

        if !removed.is_empty() {
            info!(owner, count = removed.len(), "Unloaded configurations");
        }
        removed
    }

    /// Identities of all loaded entities, sorted.
    pub fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<_> = self
            .entries
            .read()
            .by_type
            .values()
            .map(|slot| slot.identity().clone())
            .collect();
        identities.sort();
        identities
    }

    /// Returns statistics about the registry.
    pub fn stats(&self) -> RegistryStats {
        let entries = self.entries.read();
        let mut stats = RegistryStats {
            total: entries.by_type.len(),
            ..RegistryStats::default()
        };
        for slot in entries.by_type.values() {
            match slot.scope() {
                Scope::ClientOnly => stats.client_only += 1,
                Scope::ServerOnly => stats.server_only += 1,
                Scope::ServerShared => stats.server_shared += 1,
            }
        }
        stats
    }
}

impl fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("entries", &self.identities())
            .finish()
    }
}

/// Statistics about the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total number of loaded entities.
    pub total: usize,
    /// Client-local entities.
    pub client_only: usize,
    /// Authoritative, unshared entities.
    pub server_only: usize,
    /// Authoritative, shared entities.
    pub server_shared: usize,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configurations: {} total ({} client-only, {} server-only, {} server-shared)",
            self.total, self.client_only, self.server_only, self.server_shared
        )
    }
}
