//! Persistence for the watchlist and preferences
//!
//! State is kept as two keys in a small key/value space, `savedCoinIDs` (a
//! JSON array of ids) and `autoUpdateEnabled` (a JSON bool). Any backend that
//! can get and set JSON values by key gets [`WatchlistStore`] for free.

use crate::{
    constants::{AUTO_UPDATE_KEY, WATCHLIST_KEY},
    error::StoreError,
    types::Preferences,
    watchlist::Watchlist,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads and writes the persisted watchlist and preferences
///
/// Writes are synchronous: once `save` returns, a fresh `load` (including one
/// after a restart) observes the new value.
pub trait WatchlistStore: Send + Sync {
    /// Loads the watchlist, or the built-in default when nothing usable is
    /// persisted
    ///
    /// A value of the wrong shape is logged and treated as absent. Only a
    /// failing backend (I/O) is an error.
    fn load(&self) -> Result<Watchlist, StoreError>;

    /// Loads preferences, or the defaults when nothing usable is persisted
    fn load_preferences(&self) -> Result<Preferences, StoreError>;

    /// Persists the watchlist in order
    fn save(&self, watchlist: &Watchlist) -> Result<(), StoreError>;

    /// Persists the preferences
    fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError>;
}

/// Raw key/value backend
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

impl<T: KeyValueStore> WatchlistStore for T {
    fn load(&self) -> Result<Watchlist, StoreError> {
        let Some(value) = self.get(WATCHLIST_KEY)? else {
            return Ok(Watchlist::builtin());
        };
        match serde_json::from_value::<Watchlist>(value) {
            Ok(watchlist) => Ok(watchlist),
            Err(e) => {
                tracing::warn!(
                    key = WATCHLIST_KEY,
                    error = %e,
                    "Ignoring malformed persisted watchlist, using default"
                );
                Ok(Watchlist::builtin())
            }
        }
    }

    fn load_preferences(&self) -> Result<Preferences, StoreError> {
        match self.get(AUTO_UPDATE_KEY)? {
            None => Ok(Preferences::default()),
            Some(Value::Bool(auto_update_enabled)) => Ok(Preferences {
                auto_update_enabled,
            }),
            Some(other) => {
                tracing::warn!(
                    key = AUTO_UPDATE_KEY,
                    value = %other,
                    "Ignoring malformed persisted preference, using default"
                );
                Ok(Preferences::default())
            }
        }
    }

    fn save(&self, watchlist: &Watchlist) -> Result<(), StoreError> {
        self.set(WATCHLIST_KEY, serde_json::to_value(watchlist)?)?;
        tracing::debug!(count = watchlist.len(), "Saved watchlist");
        Ok(())
    }

    fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        self.set(AUTO_UPDATE_KEY, Value::Bool(preferences.auto_update_enabled))?;
        tracing::debug!(
            auto_update_enabled = preferences.auto_update_enabled,
            "Saved preferences"
        );
        Ok(())
    }
}

/// In-memory store, for tests and embedders that handle persistence themselves
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Single JSON object file
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename, so readers see either the old or the new document. The lock keeps
/// concurrent `set`s for different keys from losing each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by `path`; the file and its parent directories
    /// are created on the first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        // An unreadable document is treated as empty; the next `set` replaces it
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                tracing::warn!(
                    path = %self.path.display(),
                    found = %other,
                    "Store file is not a JSON object, using defaults"
                );
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Store file is not valid JSON, using defaults"
                );
                Ok(Map::new())
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value);
        self.write_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::new();
        assert_eq!(
            store.load().unwrap().ids(),
            &["bitcoin".to_string(), "ethereum".to_string(), "solana".to_string()]
        );
        assert!(store.load_preferences().unwrap().auto_update_enabled);
    }

    #[test]
    fn test_empty_watchlist_is_not_absent() {
        let store = MemoryStore::new();
        store.save(&Watchlist::default()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::new();
        let watchlist = Watchlist::from_ids(["solana", "bitcoin"]);
        store.save(&watchlist).unwrap();
        store
            .save_preferences(&Preferences {
                auto_update_enabled: false,
            })
            .unwrap();

        assert_eq!(store.load().unwrap(), watchlist);
        assert!(!store.load_preferences().unwrap().auto_update_enabled);
    }

    #[test]
    fn test_wrong_shape_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.set(AUTO_UPDATE_KEY, Value::String("yes".into())).unwrap();
        store.set(WATCHLIST_KEY, serde_json::json!({"a": 1})).unwrap();

        assert!(store.load_preferences().unwrap().auto_update_enabled);
        assert_eq!(store.load().unwrap(), Watchlist::builtin());

        store.set(AUTO_UPDATE_KEY, serde_json::json!(1)).unwrap();
        store.set(WATCHLIST_KEY, serde_json::json!("bitcoin")).unwrap();
        assert!(store.load_preferences().unwrap().auto_update_enabled);
        assert_eq!(store.load().unwrap(), Watchlist::builtin());
    }

    #[test]
    fn test_duplicates_removed_on_load() {
        let store = MemoryStore::new();
        store
            .set(WATCHLIST_KEY, serde_json::json!(["bitcoin", "solana", "bitcoin"]))
            .unwrap();
        assert_eq!(
            store.load().unwrap().ids(),
            &["bitcoin".to_string(), "solana".to_string()]
        );
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let store = FileStore::new(&path);
        assert_eq!(store.load().unwrap(), Watchlist::builtin());

        let watchlist = Watchlist::from_ids(["cardano", "bitcoin"]);
        store.save(&watchlist).unwrap();
        store
            .save_preferences(&Preferences {
                auto_update_enabled: false,
            })
            .unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.load().unwrap(), watchlist);
        assert!(!reopened.load_preferences().unwrap().auto_update_enabled);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["savedCoinIDs"], serde_json::json!(["cardano", "bitcoin"]));
        assert_eq!(raw["autoUpdateEnabled"], Value::Bool(false));
    }

    #[test]
    fn test_file_store_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let documents = [
            "[1, 2, 3]",
            "{not json",
            r#"{"savedCoinIDs":"bitcoin","autoUpdateEnabled":1}"#,
        ];
        for corrupt in documents {
            fs::write(&path, corrupt).unwrap();
            let store = FileStore::new(&path);
            assert_eq!(store.load().unwrap(), Watchlist::builtin());
            assert!(store.load_preferences().unwrap().auto_update_enabled);
        }

        // The next write replaces the corrupt document
        fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(&path);
        store.save(&Watchlist::from_ids(["cardano"])).unwrap();
        assert_eq!(store.load().unwrap(), Watchlist::from_ids(["cardano"]));
    }

    #[test]
    fn test_file_store_io_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a document
        let store = FileStore::new(dir.path());
        assert!(matches!(store.load(), Err(StoreError::Io(_))));
    }
}
