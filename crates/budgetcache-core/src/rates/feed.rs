//! Exchange-rate feed client.
//!
//! The feed returns a JSON array of `{cc, rate, ...}` objects quoting each
//! currency in hryvnia.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::shell::{ShellManager, ShellRequest};

/// Supported currencies. UAH is the base every rate is quoted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Uah,
    Usd,
    Eur,
    Pln,
}

impl Currency {
    pub const QUOTED: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Pln];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Uah => "UAH",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Pln => "PLN",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "UAH" => Some(Currency::Uah),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "PLN" => Some(Currency::Pln),
            _ => None,
        }
    }
}

/// Hryvnia per one unit of each quoted currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub struct ExchangeRates {
    pub usd: f64,
    pub eur: f64,
    pub pln: f64,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self {
            usd: 1.0,
            eur: 1.0,
            pln: 1.0,
        }
    }
}

impl ExchangeRates {
    pub fn rate(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Uah => 1.0,
            Currency::Usd => self.usd,
            Currency::Eur => self.eur,
            Currency::Pln => self.pln,
        }
    }

    fn set(&mut self, currency: Currency, rate: f64) {
        match currency {
            Currency::Uah => {}
            Currency::Usd => self.usd = rate,
            Currency::Eur => self.eur = rate,
            Currency::Pln => self.pln = rate,
        }
    }
}

/// One row of the feed. Everything else in the row is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRate {
    pub cc: Option<String>,
    pub rate: Option<f64>,
}

/// Build rates from feed rows. Unknown codes are skipped; a missing code or
/// an unusable rate leaves that currency at 1.
pub fn parse_rates(rows: &[FeedRate]) -> ExchangeRates {
    let mut rates = ExchangeRates::default();
    for row in rows {
        let Some(currency) = row.cc.as_deref().and_then(Currency::from_code) else {
            continue;
        };
        if !Currency::QUOTED.contains(&currency) {
            continue;
        }
        let rate = row
            .rate
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(1.0);
        rates.set(currency, rate);
    }
    rates
}

#[async_trait]
pub trait RatesFeed: Send + Sync {
    async fn fetch_rates(&self) -> Result<ExchangeRates>;
}

/// National Bank of Ukraine feed, fetched through the app-shell manager.
#[derive(Clone)]
pub struct NbuFeed {
    shell: Arc<ShellManager>,
    url: Url,
}

impl NbuFeed {
    pub fn new(url: &str, shell: Arc<ShellManager>) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid rates URL: {}", url))?;
        Ok(Self { shell, url })
    }
}

#[async_trait]
impl RatesFeed for NbuFeed {
    async fn fetch_rates(&self) -> Result<ExchangeRates> {
        let response = self.shell.route(&ShellRequest::get(self.url.clone())).await;
        if response.synthetic {
            return Err(CacheError::FeedUnavailable(response.text()).into());
        }
        if !response.is_success() {
            return Err(CacheError::from_status(response.status_code(), &response.text()).into());
        }

        let rows: Vec<FeedRate> = serde_json::from_slice(&response.body)
            .context("Failed to parse exchange rate response")?;
        debug!(rows = rows.len(), "Fetched exchange rates");
        Ok(parse_rates(&rows))
    }
}
