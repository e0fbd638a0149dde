//! Wire types for the spreadsheet backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CacheError;

/// Every backend reply: `{success, data, error}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap `data`, turning `success: false` into [`CacheError::Backend`].
    pub fn into_result(self, fallback: &str) -> Result<Option<T>, CacheError> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            Err(CacheError::Backend(message))
        }
    }
}

/// Household settings. Only `member_names` is read here; the rest is kept
/// as-is for the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Settings {
    #[serde(default)]
    pub member_names: Vec<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TagDefinition {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    /// `key:value` constraint, empty when unconstrained.
    #[serde(default)]
    pub related_to: String,
}

/// Query for the transaction list. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub author: Option<String>,
    pub tag: Option<String>,
}

impl TransactionFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("from", &self.from),
            ("to", &self.to),
            ("author", &self.author),
            ("tag", &self.tag),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }
}

/// Write operations accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Add,
    Edit,
    SoftDelete,
    Restore,
}

impl Mutation {
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::Add => "add",
            Mutation::Edit => "edit",
            Mutation::SoftDelete => "soft_delete",
            Mutation::Restore => "restore",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Mutation::Add => "add transaction",
            Mutation::Edit => "edit transaction",
            Mutation::SoftDelete => "delete transaction",
            Mutation::Restore => "restore transaction",
        }
    }
}
