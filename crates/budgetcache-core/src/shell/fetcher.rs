//! Network access for the app-shell manager.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::request::{ShellRequest, ShellResponse};
use crate::error::CacheError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Any HTTP status is a response; only a
    /// transport-level failure is an error.
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, CacheError>;
}

/// `Fetcher` over a pooled reqwest client with a transport timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, CacheError> {
        let host = request.host().unwrap_or("network").to_string();
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| CacheError::network(host.clone(), e))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::network(host, e))?;

        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Fetched");
        Ok(ShellResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.to_vec(),
            synthetic: false,
        })
    }
}
