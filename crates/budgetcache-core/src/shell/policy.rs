//! Request classification for the app-shell manager.

use anyhow::{Context, Result};
use reqwest::Url;

use super::request::ShellRequest;
use crate::config::Config;

pub const BACKEND_OFFLINE_MESSAGE: &str = "Offline: Cannot reach backend. Check your connection.";
pub const RATES_OFFLINE_MESSAGE: &str = "Offline: Cannot reach exchange rate service.";
pub const ASSET_OFFLINE_MESSAGE: &str = "Offline: Resource not cached.";

/// A dynamic data provider whose responses are never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOnlyHost {
    pub host: String,
    /// Human name used in logs, e.g. "backend".
    pub dependency: String,
    pub offline_message: String,
}

impl NetworkOnlyHost {
    pub fn new(host: &str, dependency: &str, offline_message: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            dependency: dependency.to_string(),
            offline_message: offline_message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePolicy<'a> {
    /// Always forward; answer with a synthetic 503 when unreachable.
    NetworkOnly(&'a NetworkOnlyHost),
    /// Serve from the current namespace, fall back to the network.
    /// Only same-origin reads are written back into the cache.
    CacheFirst { same_origin: bool },
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    origin: Url,
    network_only: Vec<NetworkOnlyHost>,
}

impl RoutingTable {
    pub fn new(origin: Url, network_only: Vec<NetworkOnlyHost>) -> Self {
        Self {
            origin,
            network_only,
        }
    }

    /// Backend and exchange-rate hosts are network-only.
    pub fn from_config(config: &Config) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .with_context(|| format!("Invalid origin: {}", config.origin))?;

        let mut network_only = Vec::new();
        if let Some(ref backend) = config.backend_url {
            let url = Url::parse(backend)
                .with_context(|| format!("Invalid backend URL: {}", backend))?;
            if let Some(host) = url.host_str() {
                network_only.push(NetworkOnlyHost::new(host, "backend", BACKEND_OFFLINE_MESSAGE));
            }
        }
        let rates = Url::parse(&config.rates_url)
            .with_context(|| format!("Invalid rates URL: {}", config.rates_url))?;
        if let Some(host) = rates.host_str() {
            network_only.push(NetworkOnlyHost::new(
                host,
                "exchange rate service",
                RATES_OFFLINE_MESSAGE,
            ));
        }

        Ok(Self::new(origin, network_only))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn classify(&self, request: &ShellRequest) -> RoutePolicy<'_> {
        if let Some(host) = request.host() {
            if let Some(provider) = self
                .network_only
                .iter()
                .find(|p| p.host.eq_ignore_ascii_case(host))
            {
                return RoutePolicy::NetworkOnly(provider);
            }
        }
        RoutePolicy::CacheFirst {
            same_origin: request.url.origin() == self.origin.origin(),
        }
    }
}
