//! Local rate limiting for the upstream market-data API.
//!
//! The upstream quota is shared by every route in the process: portfolio
//! refreshes, the price feed endpoint and the history endpoint all draw from
//! the same per-second and per-minute ceilings. This module enforces those
//! ceilings locally, before any network call is made, so quota exhaustion is
//! the cheapest possible failure path.
//!
//! ## Throttle policies
//!
//! - [`ThrottlePolicy::Wait`]: the caller cooperatively sleeps until the window
//!   resets, then proceeds. Useful for background refreshes.
//! - [`ThrottlePolicy::Reject`]: the caller immediately receives a
//!   rate-limited error carrying `retry_after_secs`, which route handlers
//!   translate into HTTP 429. Useful for interactive requests.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use price_feed_client::rate_limit::{DualWindowLimiter, KeyedRateLimiter};
//!
//! // Global quota: 5 req/s, 50 req/min, 2s spacing between requests.
//! let mut limiter = DualWindowLimiter::new(5, 50, Duration::from_secs(2));
//! assert!(limiter.try_acquire().is_ok());
//!
//! // Per-upstream keys, should more than one market-data provider be used.
//! let mut keyed: KeyedRateLimiter<String> = KeyedRateLimiter::new(5, 50, Duration::from_secs(2));
//! assert!(keyed.try_acquire("global".to_string()).is_ok());
//! ```

mod window;

pub use window::{DualWindowLimiter, FixedWindow, KeyedRateLimiter};

/// What to do when the local quota is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThrottlePolicy {
    /// Suspend the caller until the window resets, then proceed.
    #[default]
    Wait,
    /// Fail fast with a rate-limited error carrying the retry-after duration.
    Reject,
}

/// Limiter settings derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    /// Ceiling for the one-second window.
    pub requests_per_second: u32,
    /// Ceiling for the one-minute window.
    pub requests_per_minute: u32,
    /// Minimum spacing between admitted requests.
    pub min_interval: std::time::Duration,
    /// Behavior when the quota is exhausted.
    pub policy: ThrottlePolicy,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            requests_per_minute: defaults::MAX_REQUESTS_PER_MINUTE,
            min_interval: std::time::Duration::from_millis(defaults::MIN_REQUEST_INTERVAL_MS),
            policy: ThrottlePolicy::Wait,
        }
    }
}

/// Default quota values, matching what the free tier of the upstream tolerates.
pub mod defaults {
    /// Maximum requests per second.
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;
    /// Maximum requests per minute.
    pub const MAX_REQUESTS_PER_MINUTE: u32 = 50;
    /// Minimum spacing between admitted requests, in milliseconds.
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 2_000;
    /// The limiter key shared by all endpoint classes.
    pub const GLOBAL_KEY: &str = "global";
}
