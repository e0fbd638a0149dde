//! Wiring of the caches and clients for one running session.
//!
//! Everything with a lifetime lives here: the session cache dies with the
//! context, the rate cache and asset cache live on disk under the cache
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::cache::{DurableCache, SessionCache};
use crate::config::Config;
use crate::gateway::{GatewayClient, ReferenceData};
use crate::rates::{NbuFeed, RatesService, RATES_CACHE_KEY};
use crate::shell::{DiskAssetStore, HttpFetcher, ShellConfig, ShellManager};
use crate::store::FileStore;

const DURABLE_DIR: &str = "durable";
const ASSETS_DIR: &str = "assets";

pub struct AppContext {
    config: Config,
    cache_dir: PathBuf,
    session: Arc<SessionCache>,
    rates: RatesService<FileStore>,
    reference: Option<ReferenceData>,
    shell: Arc<ShellManager>,
}

impl AppContext {
    /// Build from configuration, storing caches in the user cache directory.
    pub fn from_config(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        Self::build(config, cache_dir)
    }

    pub fn build(config: Config, cache_dir: PathBuf) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        // All outbound traffic goes through the shell's routing policy.
        let shell = Arc::new(ShellManager::new(
            ShellConfig::from_config(&config)?,
            Arc::new(HttpFetcher::new(timeout)?),
            Arc::new(DiskAssetStore::new(cache_dir.join(ASSETS_DIR))?),
        ));
        shell.resume(&config.version)?;

        let durable = FileStore::new(cache_dir.join(DURABLE_DIR))?;
        let rates = RatesService::new(
            DurableCache::new(durable, RATES_CACHE_KEY, config.rates_ttl_ms),
            Arc::new(NbuFeed::new(&config.rates_url, Arc::clone(&shell))?),
        );

        let session = Arc::new(SessionCache::new());
        let reference = match config.backend_url.as_deref() {
            Some(url) => Some(ReferenceData::new(
                Arc::new(GatewayClient::new(url, Arc::clone(&shell))?),
                Arc::clone(&session),
            )),
            None => None,
        };

        info!(cache_dir = %cache_dir.display(), "Application context ready");
        Ok(Self {
            config,
            cache_dir,
            session,
            rates,
            reference,
            shell,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn rates(&self) -> &RatesService<FileStore> {
        &self.rates
    }

    pub fn reference(&self) -> Result<&ReferenceData> {
        self.reference.as_ref().ok_or_else(|| {
            anyhow!("No backend configured. Set backend_url in config or BUDGETCACHE_BACKEND_URL.")
        })
    }

    pub fn shell(&self) -> &ShellManager {
        &self.shell
    }

    /// Discard everything scoped to this session.
    pub fn end_session(&self) -> Result<()> {
        self.session.invalidate_all()
    }
}
