//! Environment-sourced configuration for the price feed.
//!
//! Every knob has a default suitable for the public CoinGecko-compatible API;
//! `FeedConfig::from_env` overrides them from the process environment. Malformed
//! values are logged and fall back to the default rather than aborting startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::feed::CoinSelection;
use crate::rate_limit::{LimiterSettings, ThrottlePolicy, defaults};
use crate::retry::RetryPolicy;

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Configuration for a [`crate::feed::PriceFeed`] instance.
///
/// Constructed once at process startup and handed to the feed; the feed and
/// its client are then shared process-wide by cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Upstream market-data base URL.
    pub base_url: String,
    /// Connect/response timeout for every outbound call.
    pub timeout: Duration,
    /// Local quota: requests per second.
    pub requests_per_second: u32,
    /// Local quota: requests per minute.
    pub requests_per_minute: u32,
    /// Minimum spacing between admitted requests.
    pub min_request_interval: Duration,
    /// Maximum attempts per request, counting the first.
    pub max_retries: u32,
    /// Backoff base delay.
    pub min_retry_delay: Duration,
    /// Backoff ceiling.
    pub max_retry_delay: Duration,
    /// Default TTL for cache entries without an endpoint override.
    pub cache_default_ttl: Duration,
    /// Interval between periodic sweeps of expired cache entries.
    pub cache_check_period: Duration,
    /// TTL for `topCoins_{count}` entries.
    pub top_coins_ttl: Duration,
    /// TTL for `coinHistory_{id}_{days}` entries.
    pub coin_history_ttl: Duration,
    /// Quote currency for all price queries.
    pub vs_currency: String,
    /// Coin count used by `get_price_data`.
    pub default_count: u32,
    /// Behavior when the local quota is exhausted.
    pub throttle_policy: ThrottlePolicy,
    /// Which coins a top-coins request selects.
    pub coin_selection: CoinSelection,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(10_000),
            requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            requests_per_minute: defaults::MAX_REQUESTS_PER_MINUTE,
            min_request_interval: Duration::from_millis(defaults::MIN_REQUEST_INTERVAL_MS),
            max_retries: 3,
            min_retry_delay: Duration::from_millis(1_000),
            max_retry_delay: Duration::from_millis(30_000),
            cache_default_ttl: Duration::from_secs(60),
            cache_check_period: Duration::from_secs(120),
            top_coins_ttl: Duration::from_secs(300),
            coin_history_ttl: Duration::from_secs(300),
            vs_currency: "usd".to_string(),
            default_count: 10,
            throttle_policy: ThrottlePolicy::Wait,
            coin_selection: CoinSelection::TopByMarketCap,
        }
    }
}

impl FeedConfig {
    /// Build a configuration from the process environment.
    ///
    /// Recognized variables: `API_BASE_URL`, `API_TIMEOUT` (ms),
    /// `MAX_REQUESTS_PER_SECOND`, `MAX_REQUESTS_PER_MINUTE`,
    /// `MIN_REQUEST_INTERVAL` (ms), `MAX_RETRIES`, `MIN_RETRY_DELAY` (ms),
    /// `MAX_RETRY_DELAY` (ms), `CACHE_DEFAULT_TTL` (s), `CACHE_CHECK_PERIOD`
    /// (s), `CACHE_TOP_COINS_TTL` (s), `CACHE_COIN_HISTORY_TTL` (s),
    /// `VS_CURRENCY`, `TOP_COINS_DEFAULT_COUNT`, `THROTTLE_POLICY`
    /// (`wait`/`reject`), `COIN_ALLOW_LIST` (comma-separated coin ids).
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            base_url: env::var("API_BASE_URL").unwrap_or(base.base_url),
            timeout: env_millis("API_TIMEOUT", base.timeout),
            requests_per_second: env_parse("MAX_REQUESTS_PER_SECOND", base.requests_per_second),
            requests_per_minute: env_parse("MAX_REQUESTS_PER_MINUTE", base.requests_per_minute),
            min_request_interval: env_millis("MIN_REQUEST_INTERVAL", base.min_request_interval),
            max_retries: env_parse("MAX_RETRIES", base.max_retries),
            min_retry_delay: env_millis("MIN_RETRY_DELAY", base.min_retry_delay),
            max_retry_delay: env_millis("MAX_RETRY_DELAY", base.max_retry_delay),
            cache_default_ttl: env_secs("CACHE_DEFAULT_TTL", base.cache_default_ttl),
            cache_check_period: env_secs("CACHE_CHECK_PERIOD", base.cache_check_period),
            top_coins_ttl: env_secs("CACHE_TOP_COINS_TTL", base.top_coins_ttl),
            coin_history_ttl: env_secs("CACHE_COIN_HISTORY_TTL", base.coin_history_ttl),
            vs_currency: env::var("VS_CURRENCY").unwrap_or(base.vs_currency),
            default_count: env_parse("TOP_COINS_DEFAULT_COUNT", base.default_count),
            throttle_policy: env_policy("THROTTLE_POLICY", base.throttle_policy),
            coin_selection: env_selection("COIN_ALLOW_LIST"),
        }
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.min_retry_delay, self.max_retry_delay)
    }

    /// The limiter settings these settings describe.
    pub fn limiter_settings(&self) -> LimiterSettings {
        LimiterSettings {
            requests_per_second: self.requests_per_second,
            requests_per_minute: self.requests_per_minute,
            min_interval: self.min_request_interval,
            policy: self.throttle_policy,
        }
    }
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_parse(name, default.as_millis() as u64))
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(name, default.as_secs()))
}

fn env_policy(name: &str, default: ThrottlePolicy) -> ThrottlePolicy {
    match env::var(name).as_deref() {
        Ok("wait") => ThrottlePolicy::Wait,
        Ok("reject") => ThrottlePolicy::Reject,
        Ok(other) => {
            tracing::warn!(var = name, value = other, "unknown throttle policy, using default");
            default
        }
        Err(_) => default,
    }
}

fn env_selection(name: &str) -> CoinSelection {
    match env::var(name) {
        Ok(raw) => {
            let ids: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            if ids.is_empty() {
                CoinSelection::TopByMarketCap
            } else {
                CoinSelection::AllowList(ids)
            }
        }
        Err(_) => CoinSelection::TopByMarketCap,
    }
}
