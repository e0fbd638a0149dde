//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the app-shell
//! name, version and asset list, the backend and exchange-rate endpoints,
//! and cache timing.
//!
//! Configuration is stored at `~/.config/budgetcache/config.json`.
//! A handful of `BUDGETCACHE_*` environment variables override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL_MS;

/// Application name used for config/cache directory paths
const APP_DIR: &str = "budgetcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// National Bank of Ukraine exchange-rate feed
const DEFAULT_RATES_URL: &str = "https://bank.gov.ua/NBU_Exchange/exchange_new?json";

/// Static files needed to boot the UI offline.
const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/app/api.js",
    "/app/currency.js",
    "/app/tags.js",
    "/app/add.js",
    "/app/history.js",
    "/app/charts.js",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix of every asset namespace (`<app_name>-<version>`).
    pub app_name: String,
    pub version: String,
    /// Origin the app shell is served from.
    pub origin: String,
    pub backend_url: Option<String>,
    pub rates_url: String,
    pub assets: Vec<String>,
    /// Served in place of a page navigation that failed offline.
    pub root_document: String,
    pub request_timeout_secs: u64,
    pub rates_ttl_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "family-budget".to_string(),
            version: "v1".to_string(),
            origin: "http://localhost:8080".to_string(),
            backend_url: None,
            rates_url: DEFAULT_RATES_URL.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            root_document: "/index.html".to_string(),
            request_timeout_secs: 30,
            rates_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_DIR))
    }

    /// Apply `BUDGETCACHE_*` overrides; empty values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("BUDGETCACHE_BACKEND_URL") {
            self.backend_url = Some(url);
        }
        if let Some(url) = var("BUDGETCACHE_RATES_URL") {
            self.rates_url = url;
        }
        if let Some(origin) = var("BUDGETCACHE_ORIGIN") {
            self.origin = origin;
        }
        if let Some(version) = var("BUDGETCACHE_VERSION") {
            self.version = version;
        }
    }
}
