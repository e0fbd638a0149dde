//! App-shell cache: a versioned cache of the static files the UI boots from,
//! and the routing policy every outbound request passes through.
//!
//! - Same-origin assets are served cache-first from the current namespace
//! - Backend and exchange-rate traffic is network-only, with a synthetic
//!   503 when unreachable
//! - Install stores a new namespace; activate makes it current and purges
//!   every other generation

pub mod fetcher;
pub mod manager;
pub mod namespace;
pub mod policy;
pub mod request;
pub mod storage;

pub use fetcher::{Fetcher, HttpFetcher};
pub use manager::{ActivationReport, InstallReport, Lifecycle, ShellConfig, ShellManager};
pub use namespace::CacheNamespace;
pub use policy::{
    NetworkOnlyHost, RoutePolicy, RoutingTable, ASSET_OFFLINE_MESSAGE, BACKEND_OFFLINE_MESSAGE,
    RATES_OFFLINE_MESSAGE,
};
pub use request::{Destination, ShellRequest, ShellResponse};
pub use storage::{AssetEntry, AssetStore, DiskAssetStore, MemoryAssetStore};
