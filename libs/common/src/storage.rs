//! Persisted session storage
//!
//! The session lives in a small key/value store under stable keys, the same
//! way a browser client keeps it in local storage. Reads always go to the
//! store so that a token rotated by a concurrent refresh is seen immediately.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::session::{Session, UserSummary};

/// Key holding the access token
pub const ACCESS_TOKEN_KEY: &str = "auth-token";
/// Key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "auth-refresh-token";
/// Key holding the serialized user
pub const USER_KEY: &str = "auth-user";

/// A string key/value store
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Set a key-value pair, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get several values, in the order of `keys`.
    ///
    /// Stores that can read every key at once should override this so the
    /// values come from a single snapshot.
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Set several key-value pairs.
    ///
    /// Stores that can write every pair at once should override this so
    /// readers never see half of the update.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Store backed by a JSON object in a single file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// Create a store at `path`. The file and its parent directories are
    /// created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StorageResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(StorageError::Serialization),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let content = serde_json::to_string_pretty(entries).map_err(StorageError::Serialization)?;

        // Staged write, then rename over the original
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, content).map_err(StorageError::Io)?;
        std::fs::rename(&staging, &self.path).map_err(StorageError::Io)?;

        Ok(())
    }

    fn update<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        change(&mut entries);
        self.write_entries(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        Ok(keys.iter().map(|key| entries.remove(*key)).collect())
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        self.update(|entries| {
            for (key, value) in pairs {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }
}

/// Maps the [`Session`] onto the stable storage keys
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    /// Create a session storage over any key/value store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Create a session storage that only lives in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Load the current session.
    ///
    /// Returns `None` when the access token or the user is missing. A user
    /// entry that cannot be parsed clears the stored session.
    pub fn load(&self) -> StorageResult<Option<Session>> {
        let mut values = self
            .store
            .get_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])?
            .into_iter();
        let access_token = values.next().flatten();
        let refresh_token = values.next().flatten();
        let raw_user = values.next().flatten();

        let (Some(access_token), Some(raw_user)) = (access_token, raw_user) else {
            return Ok(None);
        };

        let user: UserSummary = match serde_json::from_str(&raw_user) {
            Ok(user) => user,
            Err(e) => {
                warn!("Discarding stored session with unreadable user: {}", e);
                self.clear()?;
                return Ok(None);
            }
        };

        Ok(Some(Session::new(access_token, refresh_token, user)))
    }

    /// Access token of the current session
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        Ok(self.load()?.map(|session| session.access_token))
    }

    /// Refresh token of the current session
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        Ok(self.load()?.and_then(|session| session.refresh_token))
    }

    /// Persist a new session, replacing the previous one
    pub fn save(&self, session: &Session) -> StorageResult<()> {
        debug!("Saving session for user: {}", session.user.id);

        let user = serde_json::to_string(&session.user).map_err(StorageError::Serialization)?;
        self.store.set(USER_KEY, &user)?;
        self.store.set(ACCESS_TOKEN_KEY, &session.access_token)?;
        match &session.refresh_token {
            Some(refresh_token) => self.store.set(REFRESH_TOKEN_KEY, refresh_token),
            None => self.store.delete(REFRESH_TOKEN_KEY),
        }
    }

    /// Replace the tokens of the current session, keeping the user.
    ///
    /// A `None` refresh token leaves the stored one untouched. Both tokens
    /// are written in one store operation.
    pub fn update_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> StorageResult<()> {
        match refresh_token {
            Some(refresh_token) => self.store.set_many(&[
                (ACCESS_TOKEN_KEY, access_token),
                (REFRESH_TOKEN_KEY, refresh_token),
            ]),
            None => self.store.set(ACCESS_TOKEN_KEY, access_token),
        }
    }

    /// Remove every session key
    pub fn clear(&self) -> StorageResult<()> {
        debug!("Clearing stored session");

        self.store.delete(ACCESS_TOKEN_KEY)?;
        self.store.delete(REFRESH_TOKEN_KEY)?;
        self.store.delete(USER_KEY)?;
        Ok(())
    }
}
