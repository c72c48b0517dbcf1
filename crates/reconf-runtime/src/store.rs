//! Persistence of configuration entities.
//!
//! Entities are stored as JSON objects keyed by member name, one per
//! [`Identity`]. Ignored members never reach the store: they are left out by
//! `Inspect::to_json` and skipped when populating.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use reconf_core::Identity;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised by a [`ConfigStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored file is not valid JSON.
    #[error("Malformed JSON in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded.
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage collaborator keyed by entity identity.
pub trait ConfigStore: Send + Sync {
    /// Loads the stored values of an entity, `None` if nothing is stored.
    fn load(&self, identity: &Identity) -> StoreResult<Option<Value>>;

    /// Stores the values of an entity, replacing previous ones.
    fn save(&self, identity: &Identity, values: &Value) -> StoreResult<()>;
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Stores each entity as `<dir>/<owner>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    pretty: bool,
}

impl JsonFileStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pretty: true,
        }
    }

    /// Sets whether files are written as indented JSON.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for an identity.
    pub fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir
            .join(&identity.owner)
            .join(format!("{}.json", identity.name))
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, identity: &Identity) -> StoreResult<Option<Value>> {
        let path = self.path_for(identity);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(config = %identity, path = %path.display(), "No stored file");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let value = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(config = %identity, path = %path.display(), "Loaded stored values");
        Ok(Some(value))
    }

    fn save(&self, identity: &Identity, values: &Value) -> StoreResult<()> {
        let path = self.path_for(identity);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let text = if self.pretty {
            serde_json::to_string_pretty(values)?
        } else {
            serde_json::to_string(values)?
        };

        // Replace atomically
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        debug!(config = %identity, path = %path.display(), "Saved values");
        Ok(())
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Keeps stored values in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<Identity, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, identity: &Identity) -> StoreResult<Option<Value>> {
        Ok(self.entries.lock().get(identity).cloned())
    }

    fn save(&self, identity: &Identity, values: &Value) -> StoreResult<()> {
        self.entries.lock().insert(identity.clone(), values.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("entities"));
        let id = Identity::new("world", "ServerSettings");

        assert!(store.load(&id).unwrap().is_none());

        store.save(&id, &json!({ "port": 25565 })).unwrap();
        assert!(dir.path().join("entities/world/ServerSettings.json").exists());
        assert_eq!(store.load(&id).unwrap(), Some(json!({ "port": 25565 })));

        store.save(&id, &json!({ "port": 80 })).unwrap();
        assert_eq!(store.load(&id).unwrap(), Some(json!({ "port": 80 })));
    }

    #[test]
    fn test_file_store_identities_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let joined = Identity::new("a_b", "C");
        let split = Identity::new("a", "b_C");
        assert_ne!(store.path_for(&joined), store.path_for(&split));

        store.save(&joined, &json!({ "x": 1 })).unwrap();
        store.save(&split, &json!({ "x": 2 })).unwrap();
        assert_eq!(store.load(&joined).unwrap(), Some(json!({ "x": 1 })));
        assert_eq!(store.load(&split).unwrap(), Some(json!({ "x": 2 })));
    }

    #[test]
    fn test_file_store_compact_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).pretty(false);
        let id = Identity::new("a", "B");
        store.save(&id, &json!({ "x": 1, "y": [1, 2] })).unwrap();

        let text = fs::read_to_string(store.path_for(&id)).unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_file_store_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = Identity::new("a", "B");
        let path = store.path_for(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = store.load(&id).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let id = Identity::new("a", "B");
        assert!(store.is_empty());

        store.save(&id, &json!({ "x": 1 })).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&id).unwrap(), Some(json!({ "x": 1 })));
        assert!(store.load(&Identity::new("a", "C")).unwrap().is_none());
    }
}
