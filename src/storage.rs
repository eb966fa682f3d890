//! Durable local key/value store.
//!
//! The local mirror of the application state lives here: one key per entity
//! collection plus profile, gamification, envelope config and the pending
//! write queue. Values are JSON; a corrupted or non-JSON value is treated as
//! absent rather than an error, so a damaged mirror can never prevent the
//! app from starting.

use crate::errors::{Error, Result};
use crate::models::{EnvelopeConfig, GamificationState, Goal, Profile, Routine, Transaction};
use crate::state::AppState;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Storage keys shared with the backup interchange format.
pub mod keys {
    pub const GOALS: &str = "metaflow_goals";
    pub const TRANSACTIONS: &str = "metaflow_transactions";
    pub const ROUTINES: &str = "metaflow_routines";
    pub const PROFILE: &str = "metaflow_profile";
    pub const GAMIFICATION: &str = "metaflow_gamification";
    pub const ENVELOPES: &str = "metaflow_envelopes";
    pub const WRITE_QUEUE: &str = "metaflow_write_queue";

    /// Keys included in export/import bundles (the write queue is
    /// device-local and never part of a backup).
    pub const BACKUP_KEYS: [&str; 6] = [
        GOALS,
        TRANSACTIONS,
        ROUTINES,
        PROFILE,
        GAMIFICATION,
        ENVELOPES,
    ];
}

/// Raw string-valued persistence underneath [`LocalStore`].
pub trait StorageBackend: Send + Sync {
    /// Returns the raw stored value, or `None` if absent or unreadable.
    fn load(&self, key: &str) -> Option<String>;
    /// Stores a raw value; returns `false` on failure instead of erroring.
    fn store(&self, key: &str, value: &str) -> bool;
    /// Removes a key if present.
    fn remove(&self, key: &str);
}

/// One file per key under a data directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens (and creates if needed) a file-backed store rooted at `dir`.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::Storage {
            message: format!("cannot create data dir {}: {e}", dir.display()),
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn load(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn store(&self, key: &str, value: &str) -> bool {
        // Write via a temp file so a crash mid-write never corrupts the key.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        if std::fs::write(&tmp, value).is_err() {
            return false;
        }
        std::fs::rename(&tmp, &path).is_ok()
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

/// Volatile in-memory backend for tests and guest sessions.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> bool {
        match self.map.lock() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(key);
        }
    }
}

/// Typed JSON view over a [`StorageBackend`].
pub struct LocalStore {
    backend: Box<dyn StorageBackend>,
}

impl LocalStore {
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Opens the standard file-backed store under `dir`.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self::new(Box::new(FileBackend::open(dir)?)))
    }

    /// In-memory store, used by tests and guest sessions.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::default()))
    }

    /// Reads and deserializes a key. Corrupted values read as `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.load(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding corrupted local value");
                None
            }
        }
    }

    /// Reads the raw JSON value of a key, if present and well-formed.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<serde_json::Value> {
        self.get(key)
    }

    /// Serializes and stores a value; returns `false` on failure.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.store(key, &raw),
            Err(e) => {
                warn!(key, error = %e, "failed to serialize local value");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove(key);
    }

    // ── Typed accessors for the mirrored collections ────────────────

    #[must_use]
    pub fn goals(&self) -> Vec<Goal> {
        self.get(keys::GOALS).unwrap_or_default()
    }

    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        self.get(keys::TRANSACTIONS).unwrap_or_default()
    }

    #[must_use]
    pub fn routines(&self) -> Vec<Routine> {
        self.get(keys::ROUTINES).unwrap_or_default()
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        self.get(keys::PROFILE).unwrap_or_default()
    }

    #[must_use]
    pub fn gamification(&self) -> GamificationState {
        self.get(keys::GAMIFICATION).unwrap_or_default()
    }

    #[must_use]
    pub fn envelopes(&self) -> EnvelopeConfig {
        self.get(keys::ENVELOPES).unwrap_or_default()
    }

    /// Mirrors the full in-memory state, one key per collection.
    ///
    /// The undo stack is deliberately not persisted; it is a session-scoped
    /// convenience, not durable data.
    pub fn persist_state(&self, state: &AppState) {
        self.set(keys::GOALS, &state.goals);
        self.set(keys::TRANSACTIONS, &state.transactions);
        self.set(keys::ROUTINES, &state.routines);
        self.set(keys::PROFILE, &state.profile);
        self.set(keys::GAMIFICATION, &state.gamification);
        self.set(keys::ENVELOPES, &state.envelopes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_round_trip() {
        let store = LocalStore::in_memory();
        assert!(store.set("test_key", &serde_json::json!({ "foo": "bar" })));
        let value: serde_json::Value = store.get("test_key").unwrap();
        assert_eq!(value["foo"], "bar");
    }

    #[test]
    fn missing_key_reads_as_none() {
        let store = LocalStore::in_memory();
        assert!(store.get::<serde_json::Value>("nonexistent_key").is_none());
    }

    #[test]
    fn corrupted_value_reads_as_none() {
        let backend = MemoryBackend::default();
        backend.store(keys::GOALS, "{not valid json");
        let store = LocalStore::new(Box::new(backend));
        assert!(store.get::<Vec<Goal>>(keys::GOALS).is_none());
        assert!(store.goals().is_empty());
    }

    #[test]
    fn typed_accessors_default_when_empty() {
        let store = LocalStore::in_memory();
        assert!(store.goals().is_empty());
        assert!(store.transactions().is_empty());
        assert!(store.routines().is_empty());
        assert_eq!(store.profile().currency, "CLP");
        assert_eq!(store.gamification().total_xp, 0);
        assert!(!store.envelopes().enabled);
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store.set("test_key", &vec![1, 2, 3]);
        }
        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.get::<Vec<i32>>("test_key").unwrap(), vec![1, 2, 3]);
    }
}
