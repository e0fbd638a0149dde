use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use reqwest::Url;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::fetcher::Fetcher;
use super::namespace::CacheNamespace;
use super::policy::{NetworkOnlyHost, RoutePolicy, RoutingTable, ASSET_OFFLINE_MESSAGE};
use super::request::{Destination, ShellRequest, ShellResponse};
use super::storage::{AssetEntry, AssetStore};
use crate::config::Config;
use crate::error::CacheError;

/// Install/activate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninstalled,
    Installing,
    /// Installed but not yet serving.
    Installed,
    Activating,
    Active,
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub app_name: String,
    pub assets: Vec<String>,
    pub root_document: String,
    pub routing: RoutingTable,
}

impl ShellConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            app_name: config.app_name.clone(),
            assets: config.assets.clone(),
            root_document: config.root_document.clone(),
            routing: RoutingTable::from_config(config)?,
        })
    }

    fn origin(&self) -> &Url {
        self.routing.origin()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub namespace: String,
    pub assets: usize,
    /// The new generation may activate immediately.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub namespace: String,
    pub purged: Vec<String>,
}

#[derive(Debug)]
struct ShellState {
    lifecycle: Lifecycle,
    /// Namespace routing reads from.
    current: Option<CacheNamespace>,
    /// Installed, waiting for activation.
    pending: Option<CacheNamespace>,
    skip_waiting: bool,
    clients_claimed: bool,
}

/// Owns the versioned app-shell cache and routes every outbound request.
///
/// `route` never fails: every path ends in a real or synthetic response.
/// Install and activate are serialized against each other but never block
/// routing, which keeps reading the current namespace until activation
/// swaps it.
pub struct ShellManager {
    config: ShellConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn AssetStore>,
    state: RwLock<ShellState>,
    lifecycle_lock: Mutex<()>,
}

impl ShellManager {
    pub fn new(config: ShellConfig, fetcher: Arc<dyn Fetcher>, store: Arc<dyn AssetStore>) -> Self {
        Self {
            config,
            fetcher,
            store,
            state: RwLock::new(ShellState {
                lifecycle: Lifecycle::Uninstalled,
                current: None,
                pending: None,
                skip_waiting: false,
                clients_claimed: false,
            }),
            lifecycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.read().map(|s| s.lifecycle).unwrap_or(Lifecycle::Uninstalled)
    }

    pub fn current_namespace(&self) -> Option<String> {
        self.current().map(|ns| ns.name())
    }

    pub fn clients_claimed(&self) -> bool {
        self.state.read().map(|s| s.clients_claimed).unwrap_or(false)
    }

    pub fn skip_waiting(&self) -> bool {
        self.state.read().map(|s| s.skip_waiting).unwrap_or(false)
    }

    fn current(&self) -> Option<CacheNamespace> {
        self.state.read().ok().and_then(|s| s.current.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ShellState) -> T) -> Result<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| anyhow!("Shell state lock poisoned"))?;
        Ok(f(&mut state))
    }

    // ===== Lifecycle =====

    /// Pick up a generation installed by a previous run.
    ///
    /// Any other generation of this app left on disk is purged first, so a
    /// run that crashed between install and activate finishes activating
    /// here instead of serving mixed generations.
    pub fn resume(&self, version: &str) -> Result<bool> {
        let namespace = CacheNamespace::new(&self.config.app_name, version);
        let exists = self.store.namespaces()?.contains(&namespace.name());
        if exists {
            let purged = self.purge_stale(&namespace)?;
            info!(namespace = %namespace, purged = purged.len(), "Resuming active app shell");
            self.with_state(|s| {
                s.lifecycle = Lifecycle::Active;
                s.current = Some(namespace);
                s.clients_claimed = true;
            })?;
        }
        Ok(exists)
    }

    /// Install the configured asset list as `version`.
    pub async fn install_configured(&self, version: &str) -> Result<InstallReport> {
        let assets = self.config.assets.clone();
        self.install(&assets, version).await
    }

    /// Fetch every asset and store them as a new namespace.
    ///
    /// All or nothing: if any asset fails, nothing is written and the
    /// current namespace keeps serving.
    pub async fn install(&self, assets: &[String], version: &str) -> Result<InstallReport> {
        let _guard = self.lifecycle_lock.lock().await;
        let namespace = CacheNamespace::new(&self.config.app_name, version);
        let previous = self.with_state(|s| std::mem::replace(&mut s.lifecycle, Lifecycle::Installing))?;
        info!(namespace = %namespace, assets = assets.len(), "Installing app shell");

        let stored = match self.fetch_assets(assets).await {
            Ok(entries) => {
                let count = entries.len();
                self.store
                    .replace(&namespace.name(), entries)
                    .with_context(|| format!("Failed to store namespace {}", namespace))
                    .map(|_| count)
            }
            Err(e) => Err(e),
        };

        let count = match stored {
            Ok(count) => count,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "App shell install failed");
                self.with_state(|s| s.lifecycle = previous)?;
                return Err(e);
            }
        };

        self.with_state(|s| {
            s.lifecycle = Lifecycle::Installed;
            s.pending = Some(namespace.clone());
            s.skip_waiting = true;
        })?;
        info!(namespace = %namespace, assets = count, "App shell installed");

        Ok(InstallReport {
            namespace: namespace.name(),
            assets: count,
            skip_waiting: true,
        })
    }

    async fn fetch_assets(&self, assets: &[String]) -> Result<Vec<AssetEntry>> {
        let requests = assets
            .iter()
            .map(|path| ShellRequest::get_path(self.config.origin(), path).map(|req| (path, req)))
            .collect::<Result<Vec<_>>>()?;

        let fetches = requests.iter().map(|(_, req)| self.fetcher.fetch(req));
        let results = join_all(fetches).await;

        let mut entries = Vec::with_capacity(results.len());
        for ((path, request), result) in requests.iter().zip(results) {
            let response = result.map_err(|e| CacheError::InstallFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_success() {
                return Err(CacheError::InstallFailed {
                    path: path.to_string(),
                    reason: format!("status {}", response.status),
                }
                .into());
            }
            entries.push(AssetEntry::new(request.cache_key(), response));
        }
        Ok(entries)
    }

    /// Make `version` current, purge every other generation of this app,
    /// then claim clients.
    ///
    /// Activating the already-current version repeats the purge, so an
    /// interrupted activation can be retried.
    pub async fn activate(&self, version: &str) -> Result<ActivationReport> {
        let _guard = self.lifecycle_lock.lock().await;
        let namespace = CacheNamespace::new(&self.config.app_name, version);

        self.with_state(|s| {
            let installed = s.pending.as_ref() == Some(&namespace)
                || s.current.as_ref() == Some(&namespace);
            if !installed {
                return Err(CacheError::NotInstalled(version.to_string()));
            }
            s.lifecycle = Lifecycle::Activating;
            s.current = Some(namespace.clone());
            s.pending = None;
            Ok(())
        })??;

        let purged = self.purge_stale(&namespace)?;

        self.with_state(|s| {
            s.lifecycle = Lifecycle::Active;
            s.skip_waiting = false;
            s.clients_claimed = true;
        })?;
        info!(namespace = %namespace, purged = purged.len(), "App shell active");

        Ok(ActivationReport {
            namespace: namespace.name(),
            purged,
        })
    }

    /// Delete every other generation of this app.
    fn purge_stale(&self, namespace: &CacheNamespace) -> Result<Vec<String>> {
        let mut purged = Vec::new();
        for name in self.store.namespaces()? {
            if namespace.is_stale(&name) && self.store.delete(&name)? {
                debug!(namespace = %name, "Deleted stale namespace");
                purged.push(name);
            }
        }
        Ok(purged)
    }

    // ===== Routing =====

    /// Route one request according to its policy.
    pub async fn route(&self, request: &ShellRequest) -> ShellResponse {
        match self.config.routing.classify(request) {
            RoutePolicy::NetworkOnly(provider) => self.network_only(request, provider).await,
            RoutePolicy::CacheFirst { same_origin } => self.cache_first(request, same_origin).await,
        }
    }

    async fn network_only(&self, request: &ShellRequest, provider: &NetworkOnlyHost) -> ShellResponse {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(dependency = %provider.dependency, error = %e, "Dependency unreachable");
                ShellResponse::offline(provider.offline_message.clone())
            }
        }
    }

    async fn cache_first(&self, request: &ShellRequest, same_origin: bool) -> ShellResponse {
        let key = request.cache_key();
        let current = self.current();

        // Only reads are ever stored, so only reads can hit.
        if let (true, Some(ns)) = (request.is_read(), current.as_ref()) {
            if let Some(entry) = self.lookup(ns, &key) {
                return entry.response.clone();
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let cacheable = response.status == 200 && request.is_read() && same_origin;
                if let (true, Some(ns)) = (cacheable, current) {
                    self.populate(ns.name(), AssetEntry::new(key, response.clone()));
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Cache miss and network unavailable");
                if request.destination == Destination::Document {
                    if let Some(root) = current.as_ref().and_then(|ns| self.root_document(ns)) {
                        return root.response.clone();
                    }
                }
                ShellResponse::offline(ASSET_OFFLINE_MESSAGE)
            }
        }
    }

    fn lookup(&self, namespace: &CacheNamespace, key: &str) -> Option<Arc<AssetEntry>> {
        match self.store.get(&namespace.name(), key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(namespace = %namespace, key = key, error = %e, "Failed to read cached asset");
                None
            }
        }
    }

    fn root_document(&self, namespace: &CacheNamespace) -> Option<Arc<AssetEntry>> {
        let request = ShellRequest::get_path(self.config.origin(), &self.config.root_document).ok()?;
        self.lookup(namespace, &request.cache_key())
    }

    /// Store a copy in the background. The caller already has its response;
    /// failures here are only logged.
    fn populate(&self, namespace: String, entry: AssetEntry) {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let key = entry.key.clone();
            match store.put(&namespace, entry) {
                Ok(true) => debug!(namespace = %namespace, key = %key, "Cached asset"),
                Ok(false) => debug!(namespace = %namespace, key = %key, "Namespace gone, not caching"),
                Err(e) => warn!(namespace = %namespace, key = %key, error = %e, "Failed to cache asset"),
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::policy::{BACKEND_OFFLINE_MESSAGE, RATES_OFFLINE_MESSAGE};
    use crate::shell::storage::MemoryAssetStore;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Serves canned bodies by URL; can be switched offline.
    #[derive(Default)]
    struct ScriptedFetcher {
        bodies: StdMutex<HashMap<String, ShellResponse>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn serve(&self, url: &str, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), ShellResponse::ok(body));
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(CacheError::network("test", "simulated outage"));
            }
            let bodies = self.bodies.lock().unwrap();
            Ok(bodies
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| ShellResponse::with_status(404, "")))
        }
    }

    const ORIGIN: &str = "http://localhost:8080";

    fn setup() -> (ShellManager, Arc<ScriptedFetcher>, Arc<MemoryAssetStore>) {
        let config = Config {
            app_name: "app".to_string(),
            backend_url: Some("https://script.google.com/macros/s/abc/exec".to_string()),
            root_document: "/".to_string(),
            ..Config::default()
        };
        let fetcher = Arc::new(ScriptedFetcher::default());
        for path in ["/", "/a.js", "/b.js", "/late.js"] {
            fetcher.serve(&format!("{}{}", ORIGIN, path), &format!("body of {}", path));
        }
        let store = Arc::new(MemoryAssetStore::new());
        let manager = ShellManager::new(
            ShellConfig::from_config(&config).unwrap(),
            fetcher.clone(),
            store.clone(),
        );
        (manager, fetcher, store)
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn request(path: &str) -> ShellRequest {
        ShellRequest::get(Url::parse(&format!("{}{}", ORIGIN, path)).unwrap())
    }

    async fn wait_for_len(store: &MemoryAssetStore, namespace: &str, len: usize) {
        for _ in 0..100 {
            if store.len(namespace).unwrap() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("namespace {} never reached {} entries", namespace, len);
    }

    #[tokio::test]
    async fn test_install_activate_upgrade_scenario() {
        let (manager, _fetcher, store) = setup();
        assert_eq!(manager.lifecycle(), Lifecycle::Uninstalled);

        let report = manager.install(&paths(&["/", "/a.js"]), "v1").await.unwrap();
        assert_eq!(report.namespace, "app-v1");
        assert_eq!(report.assets, 2);
        assert!(report.skip_waiting);
        assert_eq!(manager.lifecycle(), Lifecycle::Installed);
        assert!(!manager.clients_claimed());

        manager.activate("v1").await.unwrap();
        assert_eq!(manager.lifecycle(), Lifecycle::Active);
        assert!(manager.clients_claimed());
        assert_eq!(store.namespaces().unwrap(), vec!["app-v1".to_string()]);
        assert_eq!(store.len("app-v1").unwrap(), 2);

        manager.install(&paths(&["/", "/a.js", "/b.js"]), "v2").await.unwrap();
        // Old generation keeps serving until activation.
        assert_eq!(manager.current_namespace().as_deref(), Some("app-v1"));

        let report = manager.activate("v2").await.unwrap();
        assert_eq!(report.purged, vec!["app-v1".to_string()]);
        assert_eq!(store.namespaces().unwrap(), vec!["app-v2".to_string()]);
        assert_eq!(store.len("app-v2").unwrap(), 3);
        assert_eq!(manager.current_namespace().as_deref(), Some("app-v2"));
    }

    #[tokio::test]
    async fn test_activate_purges_every_older_generation_only() {
        let (manager, _fetcher, store) = setup();
        store.replace("app-v0", vec![]).unwrap();
        store.replace("app-legacy", vec![]).unwrap();
        store.replace("other-v1", vec![]).unwrap();

        manager.install(&paths(&["/"]), "v1").await.unwrap();
        let report = manager.activate("v1").await.unwrap();

        assert_eq!(report.purged.len(), 2);
        assert_eq!(
            store.namespaces().unwrap(),
            vec!["app-v1".to_string(), "other-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let (manager, _fetcher, store) = setup();
        manager.install(&paths(&["/", "/a.js"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let err = manager
            .install(&paths(&["/", "/missing.js"]), "v2")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CacheError>(),
            Some(CacheError::InstallFailed { path, .. }) if path == "/missing.js"
        ));

        assert_eq!(manager.lifecycle(), Lifecycle::Active);
        assert_eq!(store.namespaces().unwrap(), vec!["app-v1".to_string()]);
        assert_eq!(manager.current_namespace().as_deref(), Some("app-v1"));
        let err = manager.activate("v2").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CacheError>(),
            Some(CacheError::NotInstalled(_))
        ));
    }

    #[tokio::test]
    async fn test_install_offline_fails_cleanly() {
        let (manager, fetcher, store) = setup();
        fetcher.set_offline(true);
        assert!(manager.install(&paths(&["/", "/a.js"]), "v1").await.is_err());
        assert_eq!(manager.lifecycle(), Lifecycle::Uninstalled);
        assert!(store.namespaces().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_asset_served_while_offline() {
        let (manager, fetcher, _store) = setup();
        manager.install(&paths(&["/", "/a.js"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        fetcher.set_offline(true);
        let calls_before = fetcher.calls();
        let resp = manager.route(&request("/a.js")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.text(), "body of /a.js");
        assert_eq!(fetcher.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_network_only_offline_yields_503() {
        let (manager, fetcher, _store) = setup();
        fetcher.set_offline(true);

        let backend = ShellRequest::get(
            Url::parse("https://script.google.com/macros/s/abc/exec?action=settings").unwrap(),
        );
        let resp = manager.route(&backend).await;
        assert_eq!(resp.status, 503);
        assert_eq!(resp.text(), BACKEND_OFFLINE_MESSAGE);

        let rates = ShellRequest::get(
            Url::parse("https://bank.gov.ua/NBU_Exchange/exchange_new?json").unwrap(),
        );
        let resp = manager.route(&rates).await;
        assert_eq!(resp.status, 503);
        assert_eq!(resp.text(), RATES_OFFLINE_MESSAGE);
    }

    #[tokio::test]
    async fn test_network_only_never_cached() {
        let (manager, fetcher, store) = setup();
        let url = "https://script.google.com/macros/s/abc/exec?action=settings";
        fetcher.serve(url, r#"{"success":true}"#);
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let req = ShellRequest::get(Url::parse(url).unwrap());
        assert_eq!(manager.route(&req).await.status, 200);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.len("app-v1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_miss_populates_current_namespace_in_background() {
        let (manager, fetcher, store) = setup();
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let resp = manager.route(&request("/late.js")).await;
        assert_eq!(resp.text(), "body of /late.js");
        wait_for_len(&store, "app-v1", 2).await;

        fetcher.set_offline(true);
        let resp = manager.route(&request("/late.js")).await;
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_non_read_and_error_responses_not_cached() {
        let (manager, _fetcher, store) = setup();
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let post = ShellRequest::new(
            Method::POST,
            Url::parse(&format!("{}/late.js", ORIGIN)).unwrap(),
            Destination::Script,
        );
        manager.route(&post).await;
        assert_eq!(manager.route(&request("/nothing.js")).await.status, 404);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.len("app-v1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cross_origin_miss_not_cached() {
        let (manager, fetcher, store) = setup();
        fetcher.serve("https://cdn.example.com/chart.js", "chart");
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let req = ShellRequest::get(Url::parse("https://cdn.example.com/chart.js").unwrap());
        assert_eq!(manager.route(&req).await.text(), "chart");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.len("app-v1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_navigation_falls_back_to_root_document() {
        let (manager, fetcher, _store) = setup();
        manager.install(&paths(&["/", "/a.js"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();
        fetcher.set_offline(true);

        let nav = ShellRequest::navigation(Url::parse(&format!("{}/history", ORIGIN)).unwrap());
        let resp = manager.route(&nav).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.text(), "body of /");

        let script = manager.route(&request("/uncached.js")).await;
        assert_eq!(script.status, 503);
        assert_eq!(script.text(), ASSET_OFFLINE_MESSAGE);
    }

    #[tokio::test]
    async fn test_route_before_install_goes_to_network() {
        let (manager, fetcher, store) = setup();
        assert_eq!(manager.route(&request("/a.js")).await.status, 200);
        fetcher.set_offline(true);
        let nav = ShellRequest::navigation(Url::parse(&format!("{}/", ORIGIN)).unwrap());
        assert_eq!(manager.route(&nav).await.status, 503);
        assert!(store.namespaces().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reactivate_current_version_is_allowed() {
        let (manager, _fetcher, store) = setup();
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();
        store.replace("app-v0", vec![]).unwrap();

        let report = manager.activate("v1").await.unwrap();
        assert_eq!(report.purged, vec!["app-v0".to_string()]);
    }

    /// Memory store whose `put` always fails.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryAssetStore,
        put_attempts: AtomicUsize,
    }

    impl AssetStore for ReadOnlyStore {
        fn namespaces(&self) -> Result<Vec<String>> {
            self.inner.namespaces()
        }
        fn replace(&self, namespace: &str, entries: Vec<AssetEntry>) -> Result<()> {
            self.inner.replace(namespace, entries)
        }
        fn get(&self, namespace: &str, key: &str) -> Result<Option<Arc<AssetEntry>>> {
            self.inner.get(namespace, key)
        }
        fn put(&self, _namespace: &str, _entry: AssetEntry) -> Result<bool> {
            self.put_attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("disk full"))
        }
        fn delete(&self, namespace: &str) -> Result<bool> {
            self.inner.delete(namespace)
        }
        fn len(&self, namespace: &str) -> Result<usize> {
            self.inner.len(namespace)
        }
    }

    #[tokio::test]
    async fn test_failed_population_does_not_affect_response() {
        let config = Config {
            app_name: "app".to_string(),
            root_document: "/".to_string(),
            ..Config::default()
        };
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.serve(&format!("{}/", ORIGIN), "root");
        fetcher.serve(&format!("{}/late.js", ORIGIN), "late");
        let store = Arc::new(ReadOnlyStore::default());
        let manager = ShellManager::new(
            ShellConfig::from_config(&config).unwrap(),
            fetcher.clone(),
            store.clone(),
        );
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let resp = manager.route(&request("/late.js")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.text(), "late");

        for _ in 0..100 {
            if store.put_attempts.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.put_attempts.load(Ordering::SeqCst), 1);

        let resp = manager.route(&request("/late.js")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(manager.route(&request("/")).await.text(), "root");
        assert_eq!(manager.lifecycle(), Lifecycle::Active);
    }

    #[tokio::test]
    async fn test_write_to_cached_url_goes_to_network() {
        let (manager, fetcher, _store) = setup();
        manager.install(&paths(&["/", "/a.js"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();
        fetcher.set_offline(true);

        let post = ShellRequest::post(Url::parse(&format!("{}/a.js", ORIGIN)).unwrap(), "x");
        let resp = manager.route(&post).await;
        assert_eq!(resp.status, 503);
        assert!(resp.synthetic);
    }

    #[tokio::test]
    async fn test_resume_purges_other_generations() {
        let (manager, _fetcher, store) = setup();
        store.replace("app-v1", vec![]).unwrap();
        store.replace("app-v2", vec![]).unwrap();
        store.replace("other-v1", vec![]).unwrap();

        assert!(manager.resume("v2").unwrap());
        assert_eq!(
            store.namespaces().unwrap(),
            vec!["app-v2".to_string(), "other-v1".to_string()]
        );
        assert_eq!(manager.current_namespace().as_deref(), Some("app-v2"));
    }

    #[tokio::test]
    async fn test_resume_existing_generation() {
        let (manager, _fetcher, store) = setup();
        store
            .replace("app-v3", vec![AssetEntry::new(format!("{}/", ORIGIN), ShellResponse::ok("cached root"))])
            .unwrap();

        assert!(!manager.resume("v2").unwrap());
        assert!(manager.resume("v3").unwrap());
        assert_eq!(manager.lifecycle(), Lifecycle::Active);
        assert_eq!(manager.route(&request("/")).await.text(), "cached root");
    }

    #[tokio::test]
    async fn test_concurrent_routes_for_same_miss() {
        let (manager, _fetcher, store) = setup();
        manager.install(&paths(&["/"]), "v1").await.unwrap();
        manager.activate("v1").await.unwrap();

        let req = request("/late.js");
        let responses = join_all((0..8).map(|_| manager.route(&req))).await;
        assert!(responses.iter().all(|r| r.text() == "body of /late.js"));
        wait_for_len(&store, "app-v1", 2).await;
    }
}
