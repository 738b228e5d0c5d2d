//! Raw upstream payload types.
//!
//! These mirror the upstream's documented coin-market and market-chart schemas.
//! Numeric fields the upstream may null out (delisted or thinly traded coins)
//! are optional here; normalization into [`crate::feed::CoinSnapshot`] decides
//! their defaults so consumers are insulated from upstream schema drift.

use rust_decimal::Decimal;
use serde::Deserialize;

/// One entry of the `/coins/markets` response array.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinMarketEntry {
    /// Upstream coin id (e.g. "bitcoin").
    pub id: String,
    /// Ticker symbol, lowercase (e.g. "btc").
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Logo URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Current price in the quote currency.
    #[serde(default)]
    pub current_price: Option<Decimal>,
    /// Market capitalization.
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    /// Rank by market capitalization.
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    /// Trading volume over the last 24 hours.
    #[serde(default)]
    pub total_volume: Option<Decimal>,
    /// Price change over the last 24 hours, percent.
    #[serde(default)]
    pub price_change_percentage_24h: Option<Decimal>,
    /// When the upstream last refreshed this entry.
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// The `/coins/{id}/market_chart` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChart {
    /// `[unix_millis, price]` pairs over the requested day range.
    pub prices: Vec<(i64, Decimal)>,
}
