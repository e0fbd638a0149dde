//! Namespaced storage for app-shell assets.
//!
//! Entries are grouped by namespace. A namespace is written wholesale by
//! `replace` during install; afterwards only `put` adds to it, and only
//! while it still exists.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::request::ShellResponse;

/// One cached response, keyed by request identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub key: String,
    pub response: ShellResponse,
}

impl AssetEntry {
    pub fn new(key: impl Into<String>, response: ShellResponse) -> Self {
        Self {
            key: key.into(),
            response,
        }
    }
}

pub trait AssetStore: Send + Sync {
    fn namespaces(&self) -> Result<Vec<String>>;

    /// Create or overwrite `namespace` with exactly `entries`.
    fn replace(&self, namespace: &str, entries: Vec<AssetEntry>) -> Result<()>;

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Arc<AssetEntry>>>;

    /// Add one entry to an existing namespace. Returns `false` without
    /// writing when the namespace is gone.
    fn put(&self, namespace: &str, entry: AssetEntry) -> Result<bool>;

    /// Returns `true` if something was deleted.
    fn delete(&self, namespace: &str) -> Result<bool>;

    fn len(&self, namespace: &str) -> Result<usize>;
}

type Namespace = Arc<HashMap<String, Arc<AssetEntry>>>;

/// Copy-on-write in-memory store. Readers hold a snapshot of the namespace
/// map, writers swap in a new one.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, namespace: &str) -> Result<Option<Namespace>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        Ok(namespaces.get(namespace).cloned())
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Asset store lock poisoned")
}

impl AssetStore for MemoryAssetStore {
    fn namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let mut names: Vec<String> = namespaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn replace(&self, namespace: &str, entries: Vec<AssetEntry>) -> Result<()> {
        let map: HashMap<String, Arc<AssetEntry>> = entries
            .into_iter()
            .map(|entry| (entry.key.clone(), Arc::new(entry)))
            .collect();
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        namespaces.insert(namespace.to_string(), Arc::new(map));
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Arc<AssetEntry>>> {
        Ok(self
            .snapshot(namespace)?
            .and_then(|ns| ns.get(key).cloned()))
    }

    fn put(&self, namespace: &str, entry: AssetEntry) -> Result<bool> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        let Some(current) = namespaces.get(namespace) else {
            return Ok(false);
        };
        let mut updated: HashMap<String, Arc<AssetEntry>> = (**current).clone();
        updated.insert(entry.key.clone(), Arc::new(entry));
        namespaces.insert(namespace.to_string(), Arc::new(updated));
        Ok(true)
    }

    fn delete(&self, namespace: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        Ok(namespaces.remove(namespace).is_some())
    }

    fn len(&self, namespace: &str) -> Result<usize> {
        Ok(self.snapshot(namespace)?.map(|ns| ns.len()).unwrap_or(0))
    }
}

/// Prefix of directories being assembled by `replace`.
const STAGING_PREFIX: &str = ".staging-";

/// Prefix of the previous copy while `replace` swaps it out.
const RETIRED_PREFIX: &str = ".retired-";

/// Disk-backed store: `<root>/<namespace>/<sha256(key)>.json`.
#[derive(Debug, Clone)]
pub struct DiskAssetStore {
    root: PathBuf,
}

impl DiskAssetStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create asset cache: {}", root.display()))?;
        Ok(Self { root })
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || namespace.starts_with('.')
            || namespace.contains(['/', '\\'])
        {
            return Err(anyhow!("Invalid namespace name: {:?}", namespace));
        }
        Ok(self.root.join(namespace))
    }

    fn file_name(key: &str) -> String {
        format!("{}.json", hex::encode(Sha256::digest(key.as_bytes())))
    }

    fn write_entry(dir: &std::path::Path, entry: &AssetEntry) -> Result<()> {
        let path = dir.join(Self::file_name(&entry.key));
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec(entry)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write asset: {}", entry.key))?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl AssetStore for DiskAssetStore {
    fn namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn replace(&self, namespace: &str, entries: Vec<AssetEntry>) -> Result<()> {
        let target = self.namespace_dir(namespace)?;
        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, namespace));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;
        for entry in &entries {
            Self::write_entry(&staging, entry)?;
        }
        if !target.exists() {
            std::fs::rename(&staging, &target)
                .with_context(|| format!("Failed to commit namespace: {}", namespace))?;
            return Ok(());
        }

        // Swap by rename so the old copy stays whole until the new one lands.
        let retired = self.root.join(format!("{}{}", RETIRED_PREFIX, namespace));
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }
        std::fs::rename(&target, &retired)?;
        if let Err(e) = std::fs::rename(&staging, &target) {
            std::fs::rename(&retired, &target)?;
            return Err(e).with_context(|| format!("Failed to commit namespace: {}", namespace));
        }
        std::fs::remove_dir_all(&retired)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Arc<AssetEntry>>> {
        let path = self.namespace_dir(namespace)?.join(Self::file_name(key));
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&path)
            .with_context(|| format!("Failed to read asset: {}", key))?;
        let entry: AssetEntry = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse asset: {}", key))?;
        Ok(Some(Arc::new(entry)))
    }

    fn put(&self, namespace: &str, entry: AssetEntry) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        Self::write_entry(&dir, &entry)?;
        Ok(true)
    }

    fn delete(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    fn len(&self, namespace: &str) -> Result<usize> {
        let dir = self.namespace_dir(namespace)?;
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            if entry?.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}
