//! Caching and offline-resilience layer for the family budget app.
//!
//! Three caches sit between the UI and the network:
//!
//! - `shell`: versioned app-shell asset cache and the routing policy every
//!   outbound request passes through
//! - `cache::SessionCache`: settings and tag definitions for one session,
//!   cleared on every record write
//! - `cache::DurableCache`: exchange rates on disk with a fixed TTL
//!
//! `AppContext` owns one instance of each and hands them to callers.

pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod rates;
pub mod shell;
pub mod store;

pub use config::Config;
pub use context::AppContext;
pub use error::CacheError;
