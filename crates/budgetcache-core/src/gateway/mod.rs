//! Client side of the spreadsheet backend.
//!
//! The backend answers every call with `{success, data, error}`. This module
//! provides the `Gateway` client and `ReferenceData`, which caches settings
//! and tag definitions for the session and clears them on every write.

pub mod client;
pub mod models;
pub mod reference;

pub use client::{Gateway, GatewayClient};
pub use models::{Envelope, Mutation, Settings, TagDefinition, TransactionFilter};
pub use reference::ReferenceData;
