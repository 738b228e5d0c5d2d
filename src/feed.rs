//! The price feed facade.
//!
//! [`PriceFeed`] is the single entry point route handlers call for market data.
//! Requests resolve against the response cache first; only a miss reaches the
//! throttled, retrying REST client. Upstream payloads are normalized into
//! [`CoinSnapshot`] records before caching, so consumers are insulated from
//! upstream schema changes.
//!
//! The feed is constructed explicitly from a [`FeedConfig`] — once, at process
//! startup — and shared by cloning; there are no hidden module-level
//! singletons, so tests can build isolated instances against a mock server.
//!
//! # Example
//!
//! ```rust,no_run
//! use price_feed_client::{FeedConfig, PriceFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let feed = PriceFeed::new(FeedConfig::from_env());
//!     let coins = feed.get_price_data().await?;
//!     for coin in coins {
//!         println!("{}: {}", coin.symbol, coin.current_price);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::rest::{CoinMarketEntry, CoinMarketsRequest, MarketChart, MarketChartRequest, MarketRestClient};

/// A normalized market-data record.
///
/// Regenerated wholesale on every successful fetch; never partially merged.
/// Read-only to all consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    /// Upstream coin id (e.g. "bitcoin").
    pub id: String,
    /// Ticker symbol, uppercased (e.g. "BTC").
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Logo URL, empty when the upstream has none.
    pub image: String,
    /// Current price in the configured quote currency.
    pub current_price: Decimal,
    /// Price change over the last 24 hours, percent.
    pub change_24h_pct: Decimal,
    /// Market capitalization.
    pub market_cap: Decimal,
    /// Trading volume over the last 24 hours.
    pub volume_24h: Decimal,
    /// Recent price history; empty on a markets fetch, populated by
    /// [`PriceFeed::get_coin_history`].
    pub price_history: Vec<PricePoint>,
}

/// One point of a coin's price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Price in the configured quote currency.
    pub price: Decimal,
}

impl From<CoinMarketEntry> for CoinSnapshot {
    fn from(entry: CoinMarketEntry) -> Self {
        Self {
            id: entry.id,
            symbol: entry.symbol.to_uppercase(),
            name: entry.name,
            image: entry.image.unwrap_or_default(),
            current_price: entry.current_price.unwrap_or_default(),
            change_24h_pct: entry.price_change_percentage_24h.unwrap_or_default(),
            market_cap: entry.market_cap.unwrap_or_default(),
            volume_24h: entry.total_volume.unwrap_or_default(),
            price_history: Vec::new(),
        }
    }
}

/// Which coins a top-coins request selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinSelection {
    /// The top N coins ordered by market capitalization.
    TopByMarketCap,
    /// A fixed allow-list of coin ids; the requested count is ignored in favor
    /// of the list.
    AllowList(Vec<String>),
}

/// The domain-level facade over cache, limiter and REST client.
///
/// Cloning shares all state, so one feed constructed at startup serves every
/// route handler in the process.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    client: MarketRestClient,
    config: FeedConfig,
    markets: Arc<Mutex<ResponseCache<Vec<CoinSnapshot>>>>,
    history: Arc<Mutex<ResponseCache<Vec<PricePoint>>>>,
}

impl PriceFeed {
    /// Create a feed from the given configuration.
    pub fn new(config: FeedConfig) -> Self {
        let client = MarketRestClient::builder()
            .base_url(config.base_url.clone())
            .timeout(config.timeout)
            .retry_policy(config.retry_policy())
            .limiter_settings(config.limiter_settings())
            .build();
        Self::with_client(client, config)
    }

    /// Create a feed from the process environment.
    pub fn from_env() -> Self {
        Self::new(FeedConfig::from_env())
    }

    /// Create a feed around an existing client. The client's base URL, retry
    /// and limiter settings take precedence over the config's.
    pub fn with_client(client: MarketRestClient, config: FeedConfig) -> Self {
        let markets = ResponseCache::new(config.cache_default_ttl);
        let history = ResponseCache::new(config.cache_default_ttl);
        Self {
            client,
            config,
            markets: Arc::new(Mutex::new(markets)),
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// The configuration this feed was built from.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Get the top `count` coins as normalized snapshots.
    ///
    /// Served from cache when a live `topCoins_{count}` entry exists — no
    /// upstream call and no rate-limiter interaction on a hit. On a miss the
    /// result is written back with the configured top-coins TTL.
    pub async fn get_top_coins(&self, count: u32) -> Result<Vec<CoinSnapshot>, FeedError> {
        let cache_key = format!("topCoins_{count}");
        if let Some(cached) = self.markets.lock().await.get(&cache_key) {
            return Ok(cached);
        }

        let request = match &self.config.coin_selection {
            CoinSelection::TopByMarketCap => {
                CoinMarketsRequest::top_by_market_cap(&self.config.vs_currency, count)
            }
            CoinSelection::AllowList(ids) => {
                CoinMarketsRequest::allow_list(&self.config.vs_currency, ids)
            }
        };

        let entries = self.client.get_coin_markets(&request).await?;
        let snapshots: Vec<CoinSnapshot> = entries.into_iter().map(CoinSnapshot::from).collect();
        tracing::debug!(count = snapshots.len(), key = %cache_key, "fetched coin listings");

        self.markets
            .lock()
            .await
            .insert(cache_key, snapshots.clone(), self.config.top_coins_ttl);
        Ok(snapshots)
    }

    /// Get `days` of price history for one coin.
    ///
    /// Cached under `coinHistory_{coinId}_{days}` with the configured history
    /// TTL.
    pub async fn get_coin_history(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, FeedError> {
        let cache_key = format!("coinHistory_{coin_id}_{days}");
        if let Some(cached) = self.history.lock().await.get(&cache_key) {
            return Ok(cached);
        }

        let request = MarketChartRequest {
            vs_currency: self.config.vs_currency.clone(),
            days,
        };
        let chart = self.client.get_market_chart(coin_id, &request).await?;
        let points = to_price_points(chart);
        tracing::debug!(coin_id, days, points = points.len(), "fetched coin history");

        self.history
            .lock()
            .await
            .insert(cache_key, points.clone(), self.config.coin_history_ttl);
        Ok(points)
    }

    /// Convenience wrapper: the default top-coins selection.
    pub async fn get_price_data(&self) -> Result<Vec<CoinSnapshot>, FeedError> {
        self.get_top_coins(self.config.default_count).await
    }

    /// Check whether a live cache entry exists for the given key.
    pub async fn has_cached(&self, key: &str) -> bool {
        self.markets.lock().await.contains(key) || self.history.lock().await.contains(key)
    }

    /// Remove every cached response.
    pub async fn flush_cache(&self) {
        self.markets.lock().await.flush_all();
        self.history.lock().await.flush_all();
    }

    /// Combined hit/miss counters and live-key count across both caches.
    pub async fn cache_stats(&self) -> CacheStats {
        let markets = self.markets.lock().await.stats();
        let history = self.history.lock().await.stats();
        CacheStats {
            hits: markets.hits + history.hits,
            misses: markets.misses + history.misses,
            keys: markets.keys + history.keys,
        }
    }

    /// Drop expired entries from both caches.
    pub async fn purge_expired(&self) {
        self.markets.lock().await.purge_expired();
        self.history.lock().await.purge_expired();
    }

    /// Spawn a background task sweeping expired entries every
    /// `cache_check_period`. The task runs until the handle is aborted or the
    /// runtime shuts down.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let feed = self.clone();
        let period = self.config.cache_check_period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                feed.purge_expired().await;
            }
        })
    }
}

fn to_price_points(chart: MarketChart) -> Vec<PricePoint> {
    chart
        .prices
        .into_iter()
        .map(|(timestamp_ms, price)| PricePoint {
            timestamp_ms,
            price,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> CoinMarketEntry {
        let json = format!(
            r#"{{
                "id": "{id}",
                "symbol": "btc",
                "name": "Bitcoin",
                "image": "https://example.com/btc.png",
                "current_price": 45000.5,
                "market_cap": 880000000000,
                "total_volume": 28000000000,
                "price_change_percentage_24h": -2.5
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_snapshot_normalization() {
        let snapshot = CoinSnapshot::from(entry("bitcoin"));

        assert_eq!(snapshot.id, "bitcoin");
        assert_eq!(snapshot.symbol, "BTC");
        assert_eq!(snapshot.current_price, "45000.5".parse().unwrap());
        assert_eq!(snapshot.change_24h_pct, "-2.5".parse().unwrap());
        assert!(snapshot.price_history.is_empty());
    }

    #[test]
    fn test_snapshot_null_fields_default_to_zero() {
        let entry: CoinMarketEntry =
            serde_json::from_str(r#"{"id": "dust", "symbol": "dst", "name": "Dust"}"#).unwrap();
        let snapshot = CoinSnapshot::from(entry);

        assert_eq!(snapshot.current_price, Decimal::ZERO);
        assert_eq!(snapshot.market_cap, Decimal::ZERO);
        assert_eq!(snapshot.volume_24h, Decimal::ZERO);
        assert_eq!(snapshot.image, "");
    }

    #[test]
    fn test_to_price_points() {
        let chart = MarketChart {
            prices: vec![
                (1700000000000, "45000.5".parse().unwrap()),
                (1700003600000, "45100".parse().unwrap()),
            ],
        };
        let points = to_price_points(chart);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp_ms, 1700000000000);
        assert_eq!(points[1].price, "45100".parse().unwrap());
    }

    #[tokio::test]
    async fn test_flush_cache_and_stats_start_empty() {
        let feed = PriceFeed::new(FeedConfig::default());

        assert_eq!(feed.cache_stats().await, CacheStats::default());
        feed.flush_cache().await;
        assert!(!feed.has_cached("topCoins_10").await);
    }
}
