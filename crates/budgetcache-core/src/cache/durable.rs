use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::store::KeyValueStore;

/// Exchange rates change at most daily; four hours keeps the feed call rate low.
pub const DEFAULT_TTL_MS: i64 = 4 * 60 * 60 * 1000;

const MS_PER_MINUTE: i64 = 60 * 1000;

/// A cached value paired with the time it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    /// Milliseconds since the Unix epoch.
    pub fetched_at: i64,
}

impl<T> CachedData<T> {
    pub fn new(data: T, fetched_at: i64) -> Self {
        Self { data, fetched_at }
    }

    /// Age relative to `now`, or `None` when the clock went backwards.
    pub fn age_ms(&self, now: i64) -> Option<i64> {
        let age = now.checked_sub(self.fetched_at)?;
        (age >= 0).then_some(age)
    }

    pub fn is_valid(&self, now: i64, ttl_ms: i64) -> bool {
        matches!(self.age_ms(now), Some(age) if age < ttl_ms)
    }

    pub fn age_display(&self, now: i64) -> String {
        let minutes = self.age_ms(now).unwrap_or(0) / MS_PER_MINUTE;
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Single-key cache that survives restarts and expires after a fixed TTL.
///
/// There is no background refresh. A miss tells the caller to go to the
/// network and call [`DurableCache::set`] with what it got.
pub struct DurableCache<S: KeyValueStore> {
    store: S,
    key: String,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> DurableCache<S> {
    pub fn new(store: S, key: impl Into<String>, ttl_ms: i64) -> Self {
        Self::with_clock(store, key, ttl_ms, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: S,
        key: impl Into<String>,
        ttl_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            ttl_ms,
            clock,
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Load the raw entry regardless of age. Corrupt entries read as absent.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<CachedData<T>>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring unreadable durable cache entry");
                Ok(None)
            }
        }
    }

    /// Return the value only while `0 <= now - fetched_at < ttl`.
    pub fn get<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let Some(cached) = self.load::<T>()? else {
            debug!(key = %self.key, "Durable cache miss: no entry");
            return Ok(None);
        };

        let now = self.clock.now_millis();
        match cached.age_ms(now) {
            None => {
                warn!(key = %self.key, fetched_at = cached.fetched_at, now, "Durable cache entry from the future, ignoring");
                Ok(None)
            }
            Some(age) if age >= self.ttl_ms => {
                debug!(key = %self.key, age_ms = age, "Durable cache entry expired");
                if let Err(e) = self.store.delete(&self.key) {
                    debug!(key = %self.key, error = %e, "Failed to drop expired entry");
                }
                Ok(None)
            }
            Some(_) => Ok(Some(cached.data)),
        }
    }

    /// Store `value` stamped with the current time.
    pub fn set<T: Serialize>(&self, value: &T) -> Result<()> {
        let cached = CachedData::new(value, self.clock.now_millis());
        let raw = serde_json::to_string_pretty(&cached)
            .with_context(|| format!("Failed to serialize durable cache entry: {}", self.key))?;
        self.store.set(&self.key, &raw)
    }

    /// Human readable age of the stored entry, valid or not.
    pub fn age_display(&self) -> Option<String> {
        match self.load::<serde_json::Value>() {
            Ok(cached) => cached.map(|c| c.age_display(self.clock.now_millis())),
            Err(e) => {
                debug!(key = %self.key, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.delete(&self.key)
    }
}
