use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::client::Gateway;
use super::models::{Mutation, Settings, TagDefinition, TransactionFilter};
use crate::cache::{SessionCache, SETTINGS_KEY, TAG_DEFINITIONS_KEY};

/// Backend access with settings and tag definitions cached per session.
///
/// Every write clears the session cache before returning, so the next read
/// of reference data always goes back to the backend. A read that was in
/// flight while a write completed is returned to its caller but not cached.
pub struct ReferenceData {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionCache>,
    /// Bumped on every completed write. Held while caching a read.
    generation: Mutex<u64>,
}

impl ReferenceData {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionCache>) -> Self {
        Self {
            gateway,
            session,
            generation: Mutex::new(0),
        }
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub async fn settings(&self) -> Result<Settings> {
        if let Some(settings) = self.cached(SETTINGS_KEY) {
            return Ok(settings);
        }
        let started = self.generation()?;
        let settings = self.gateway.fetch_settings().await?;
        self.remember(SETTINGS_KEY, &settings, started)?;
        Ok(settings)
    }

    pub async fn tag_definitions(&self) -> Result<Vec<TagDefinition>> {
        if let Some(definitions) = self.cached(TAG_DEFINITIONS_KEY) {
            return Ok(definitions);
        }
        let started = self.generation()?;
        let definitions = self.gateway.fetch_tag_definitions().await?;
        self.remember(TAG_DEFINITIONS_KEY, &definitions, started)?;
        Ok(definitions)
    }

    /// Transactions are never cached.
    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Value>> {
        self.gateway.fetch_transactions(filter).await
    }

    pub async fn add_transaction(&self, transaction: &Value) -> Result<Value> {
        self.mutate(Mutation::Add, transaction).await
    }

    pub async fn edit_transaction(&self, transaction: &Value) -> Result<Value> {
        self.mutate(Mutation::Edit, transaction).await
    }

    pub async fn soft_delete(&self, id: &str) -> Result<Value> {
        self.mutate(Mutation::SoftDelete, &json!({ "id": id })).await
    }

    pub async fn restore(&self, id: &str) -> Result<Value> {
        self.mutate(Mutation::Restore, &json!({ "id": id })).await
    }

    /// A failed write may still have reached the sheet, so the cache is
    /// cleared whatever the outcome.
    async fn mutate(&self, mutation: Mutation, payload: &Value) -> Result<Value> {
        let result = self.gateway.mutate(mutation, payload).await;
        {
            let mut generation = self.lock_generation()?;
            *generation += 1;
            self.session.invalidate_all()?;
        }
        debug!(action = mutation.action(), ok = result.is_ok(), "Reference data invalidated after write");
        result
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.session.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Session cache read failed");
                None
            }
        }
    }

    fn lock_generation(&self) -> Result<std::sync::MutexGuard<'_, u64>> {
        self.generation
            .lock()
            .map_err(|_| anyhow!("Reference data lock poisoned"))
    }

    fn generation(&self) -> Result<u64> {
        Ok(*self.lock_generation()?)
    }

    /// Cache `value` unless a write completed since the read started.
    fn remember<T: serde::Serialize>(&self, key: &str, value: &T, started: u64) -> Result<()> {
        let generation = self.lock_generation()?;
        if *generation != started {
            debug!(key = key, "Write completed during read, not caching");
            return Ok(());
        }
        if let Err(e) = self.session.set(key, value) {
            warn!(key = key, error = %e, "Session cache write failed");
        }
        Ok(())
    }
}
