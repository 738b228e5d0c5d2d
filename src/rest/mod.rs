//! REST access to the upstream market-data API.

mod client;
pub mod endpoints;
mod types;

pub use client::{MarketRestClient, MarketRestClientBuilder};
pub use endpoints::{CoinMarketsRequest, MarketChartRequest};
pub use types::{CoinMarketEntry, MarketChart};
