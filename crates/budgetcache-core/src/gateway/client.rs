//! Client for the spreadsheet backend.
//!
//! Reads are `GET <base>?action=<name>`. Writes POST a JSON string to
//! `<base>?action=<mutation>` with a `text/plain` content type, which keeps
//! the browser from sending a CORS preflight the backend cannot answer.
//!
//! Every request goes out through the app-shell manager, so the backend is
//! subject to its network-only policy.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::models::{Envelope, Mutation, Settings, TagDefinition, TransactionFilter};
use crate::error::CacheError;
use crate::shell::{ShellManager, ShellRequest, ShellResponse};

/// Backend operations the cache layer depends on.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn fetch_settings(&self) -> Result<Settings>;
    async fn fetch_tag_definitions(&self) -> Result<Vec<TagDefinition>>;
    async fn fetch_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Value>>;
    async fn mutate(&self, mutation: Mutation, payload: &Value) -> Result<Value>;
}

/// Client for the backend web app.
#[derive(Clone)]
pub struct GatewayClient {
    shell: Arc<ShellManager>,
    base_url: Url,
}

impl GatewayClient {
    pub fn new(base_url: &str, shell: Arc<ShellManager>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        Ok(Self { shell, base_url })
    }

    fn action_url(&self, action: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        url
    }

    /// Decode an envelope, mapping offline and status failures first.
    fn read_envelope<T: DeserializeOwned>(
        response: ShellResponse,
        fallback: &str,
    ) -> Result<Option<T>> {
        if response.synthetic {
            return Err(CacheError::network("backend", response.text()).into());
        }
        if !response.is_success() {
            return Err(CacheError::from_status(response.status_code(), &response.text()).into());
        }
        let envelope: Envelope<T> = serde_json::from_slice(&response.body)
            .context("Failed to parse backend response")?;
        Ok(envelope.into_result(fallback)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
        fallback: &str,
    ) -> Result<Option<T>> {
        let url = self.action_url(action, params);
        debug!(action = action, "Backend read");
        let response = self.shell.route(&ShellRequest::get(url)).await;
        Self::read_envelope(response, fallback)
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn fetch_settings(&self) -> Result<Settings> {
        let settings = self
            .get::<Settings>("settings", &[], "Failed to fetch settings")
            .await
            .context("Could not load settings")?;
        Ok(settings.unwrap_or_default())
    }

    async fn fetch_tag_definitions(&self) -> Result<Vec<TagDefinition>> {
        let definitions = self
            .get::<Vec<TagDefinition>>("tag_definitions", &[], "Failed to fetch tags")
            .await
            .context("Could not load tag definitions")?;
        Ok(definitions.unwrap_or_default())
    }

    async fn fetch_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Value>> {
        let transactions = self
            .get::<Vec<Value>>("transactions", &filter.query_pairs(), "Failed to fetch transactions")
            .await
            .context("Could not load transactions")?;
        Ok(transactions.unwrap_or_default())
    }

    async fn mutate(&self, mutation: Mutation, payload: &Value) -> Result<Value> {
        let url = self.action_url(mutation.action(), &[]);
        let request = ShellRequest::post(url, serde_json::to_vec(payload)?)
            .with_header("content-type", "text/plain");
        debug!(action = mutation.action(), "Backend write");

        let response = self.shell.route(&request).await;
        let data = Self::read_envelope(response, "Request failed")
            .with_context(|| format!("Could not {}", mutation.describe()))?;
        Ok(data.unwrap_or(Value::Null))
    }
}
