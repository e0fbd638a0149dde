//! Currency exchange rates with a durable TTL cache in front of the feed.

pub mod convert;
pub mod feed;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cache::DurableCache;
use crate::error::CacheError;
use crate::store::KeyValueStore;

pub use convert::{convert_all, ConvertedAmounts};
pub use feed::{parse_rates, Currency, ExchangeRates, FeedRate, NbuFeed, RatesFeed};

/// Durable store key for cached rates.
pub const RATES_CACHE_KEY: &str = "nbu_rates_cache";

pub struct RatesService<S: KeyValueStore> {
    cache: DurableCache<S>,
    feed: Arc<dyn RatesFeed>,
}

impl<S: KeyValueStore> RatesService<S> {
    pub fn new(cache: DurableCache<S>, feed: Arc<dyn RatesFeed>) -> Self {
        Self { cache, feed }
    }

    pub fn cache(&self) -> &DurableCache<S> {
        &self.cache
    }

    /// Cached rates while valid, otherwise one fetch from the feed.
    ///
    /// Fails with [`CacheError::FeedUnavailable`] when the feed fails and
    /// nothing valid is cached; there is no safe default to fall back to.
    pub async fn get_rates(&self) -> Result<ExchangeRates> {
        match self.cache.get::<ExchangeRates>() {
            Ok(Some(rates)) => {
                debug!("Using cached exchange rates");
                return Ok(rates);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read rate cache, fetching"),
        }

        let rates = self
            .feed
            .fetch_rates()
            .await
            .map_err(|e| CacheError::FeedUnavailable(format!("{:#}", e)))?;

        if let Err(e) = self.cache.set(&rates) {
            warn!(error = %e, "Failed to cache exchange rates");
        }
        info!(usd = rates.usd, eur = rates.eur, pln = rates.pln, "Refreshed exchange rates");
        Ok(rates)
    }
}
