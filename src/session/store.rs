//! Durable key-value storage for the cached user.
//!
//! Stores are synchronous and fallible. [`UserCache`] sits on top and turns
//! every failure into a cache miss or a no-op, so storage problems never
//! reach the session logic.

use crate::error::{Error, Result};
use crate::session::profile::ApplicationUser;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synchronous key-value storage that survives restarts.
pub trait DurableStore: Send + Sync {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be modified.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores each key as `<key>.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::Storage(format!("invalid store key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Storage(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        // Entries are replaced atomically via a sibling temp file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("failed to replace {}: {e}", path.display())))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-process store. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// The cached [`ApplicationUser`] under a single fixed store key.
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl UserCache {
    /// Cache the user under `key` in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Store key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the cached user. Missing or unreadable entries yield `None`.
    #[must_use]
    pub fn load(&self) -> Option<ApplicationUser> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No cached user under {}", self.key);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cached user: {e}");
                return None;
            }
        };

        match serde_json::from_str::<ApplicationUser>(&raw) {
            Ok(user) => {
                debug!("Loaded cached user {}", user.id());
                Some(user)
            }
            Err(e) => {
                warn!("Discarding unparseable cached user: {e}");
                None
            }
        }
    }

    /// Overwrite the cached user. Failures are logged and ignored.
    pub fn save(&self, user: &ApplicationUser) {
        let raw = match serde_json::to_string(user) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize user {}: {e}", user.id());
                return;
            }
        };
        match self.store.set(&self.key, &raw) {
            Ok(()) => debug!("Cached user {}", user.id()),
            Err(e) => warn!("Failed to update user cache: {e}"),
        }
    }

    /// Remove the cached user. Failures are logged and ignored.
    pub fn clear(&self) {
        match self.store.remove(&self.key) {
            Ok(()) => info!("User cache cleared"),
            Err(e) => warn!("Failed to clear user cache: {e}"),
        }
    }
}
