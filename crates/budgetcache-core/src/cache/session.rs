use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::store::{KeyValueStore, MemoryStore};

/// Session key for the backend settings document.
pub const SETTINGS_KEY: &str = "settings";

/// Session key for the tag definition list.
pub const TAG_DEFINITIONS_KEY: &str = "tag_definitions";

/// Every key whose value a record mutation can change.
pub const REFERENCE_KEYS: [&str; 2] = [SETTINGS_KEY, TAG_DEFINITIONS_KEY];

/// Response cache scoped to one running session.
///
/// Entries have no expiry. A key is valid from `set` until it is invalidated
/// or the session ends; absence is the only miss signal.
pub struct SessionCache<S: KeyValueStore = MemoryStore> {
    store: S,
}

impl SessionCache<MemoryStore> {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
        }
    }
}

impl Default for SessionCache<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyValueStore> SessionCache<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Pure read. An entry that does not decode as `T` is a miss and is
    /// left in place.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            debug!(key = key, "Session cache miss");
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = key, error = %e, "Session cache entry has unexpected shape");
                Ok(None)
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize session cache entry: {}", key))?;
        self.store.set(key, &raw)
    }

    /// Removes exactly the named entries.
    pub fn invalidate(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.delete(key)?;
        }
        debug!(keys = ?keys, "Invalidated session cache entries");
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.store.clear()?;
        debug!("Cleared session cache");
        Ok(())
    }
}
