//! # Price Feed Client
//!
//! An async Rust client for CoinGecko-compatible market-data APIs, built for
//! services that front a rate-limited upstream: every request passes a response
//! cache, a local request throttle and a bounded retry loop before touching the
//! network.
//!
//! ## Features
//!
//! - Response caching with per-endpoint TTLs
//! - Dual-window rate limiting (per-second and per-minute ceilings) with burst
//!   smoothing, shared across every caller in the process
//! - Retry with jittered exponential backoff; upstream `Retry-After` honored
//! - Normalized [`CoinSnapshot`] records, insulating consumers from upstream
//!   schema changes
//! - Financial precision with `rust_decimal`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use price_feed_client::{FeedConfig, PriceFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let feed = PriceFeed::new(FeedConfig::from_env());
//!     let coins = feed.get_top_coins(10).await?;
//!     println!("{} coins", coins.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod rate_limit;
pub mod rest;
pub mod retry;

// Re-export commonly used types at crate root
pub use config::FeedConfig;
pub use error::FeedError;
pub use feed::{CoinSelection, CoinSnapshot, PriceFeed, PricePoint};
pub use retry::RetryPolicy;

/// Result type alias using FeedError
pub type Result<T> = std::result::Result<T, FeedError>;
