//! Application-level response caches.
//!
//! Two stores sit above the network calls for reference data:
//! - `SessionCache`: settings and tag definitions for the running session,
//!   no expiry, cleared whenever a record is written
//! - `DurableCache`: exchange rates on disk, valid for a fixed TTL across
//!   restarts

pub mod durable;
pub mod session;

pub use durable::{CachedData, DurableCache, DEFAULT_TTL_MS};
pub use session::{SessionCache, REFERENCE_KEYS, SETTINGS_KEY, TAG_DEFINITIONS_KEY};
