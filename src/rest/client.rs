//! Market-data REST client with throttling and retry.
//!
//! Every outbound call passes the local rate limiter first, then runs under a
//! fixed timeout with a bounded retry loop: HTTP 429, HTTP 503 and timeouts are
//! retried with jittered exponential backoff, an upstream `Retry-After` header
//! taking precedence over the computed delay when larger. Other failures
//! propagate immediately.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use tokio::sync::Mutex;
use url::Url;

use crate::config::DEFAULT_BASE_URL;
use crate::error::FeedError;
use crate::rate_limit::{KeyedRateLimiter, LimiterSettings, ThrottlePolicy, defaults};
use crate::rest::endpoints::{self, CoinMarketsRequest, MarketChartRequest};
use crate::rest::types::{CoinMarketEntry, MarketChart};
use crate::retry::RetryPolicy;

/// Longest upstream body snippet preserved in an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// The market-data REST client.
///
/// Cloning is cheap and shares the limiter state, so one client (typically
/// owned by a [`crate::feed::PriceFeed`]) serves the whole process.
///
/// # Example
///
/// ```rust,no_run
/// use price_feed_client::rest::MarketRestClient;
/// use price_feed_client::rest::CoinMarketsRequest;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MarketRestClient::new();
///     let request = CoinMarketsRequest::top_by_market_cap("usd", 10);
///     let coins = client.get_coin_markets(&request).await?;
///     println!("{} coins", coins.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MarketRestClient {
    http_client: reqwest::Client,
    base_url: String,
    retry_policy: RetryPolicy,
    throttle_policy: ThrottlePolicy,
    limiter: Arc<Mutex<KeyedRateLimiter<String>>>,
}

/// Outcome of a single attempt, classified for the retry loop.
struct AttemptFailure {
    error: FeedError,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl MarketRestClient {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> MarketRestClientBuilder {
        MarketRestClientBuilder::new()
    }

    /// Fetch coin listings with market data.
    pub async fn get_coin_markets(
        &self,
        request: &CoinMarketsRequest,
    ) -> Result<Vec<CoinMarketEntry>, FeedError> {
        self.get_with_params(endpoints::COINS_MARKETS, request).await
    }

    /// Fetch historical prices for one coin.
    pub async fn get_market_chart(
        &self,
        coin_id: &str,
        request: &MarketChartRequest,
    ) -> Result<MarketChart, FeedError> {
        self.get_with_params(&endpoints::market_chart(coin_id), request)
            .await
    }

    /// Make a GET request with query parameters, throttled and retried.
    pub(crate) async fn get_with_params<T, Q>(
        &self,
        endpoint: &str,
        params: &Q,
    ) -> Result<T, FeedError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let query_string = serde_urlencoded::to_string(params)
            .map_err(|e| FeedError::InvalidResponse(e.to_string()))?;
        let raw = if query_string.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query_string)
        };
        // A malformed base URL is caught here, before the limiter is charged.
        let url = Url::parse(&raw)?;
        self.request_with_retry(&url).await
    }

    /// The retry loop: admission, attempt, classify, back off, repeat.
    async fn request_with_retry<T>(&self, url: &Url) -> Result<T, FeedError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut attempt: u32 = 0;
        loop {
            self.acquire().await?;

            let failure = match self.execute(url).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let attempts_left = attempt + 1 < self.retry_policy.max_attempts;
            if !failure.retryable || !attempts_left {
                return Err(if failure.retryable {
                    exhausted(failure.error)
                } else {
                    failure.error
                });
            }

            let mut delay = self.retry_policy.delay_for(attempt);
            if let Some(upstream_wait) = failure.retry_after {
                if upstream_wait > delay {
                    delay = upstream_wait;
                }
            }
            tracing::warn!(
                url = %url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "transient upstream failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Acquire admission from the shared limiter, honoring the throttle policy.
    async fn acquire(&self) -> Result<(), FeedError> {
        loop {
            let admission = {
                let mut limiter = self.limiter.lock().await;
                limiter.try_acquire(defaults::GLOBAL_KEY.to_string())
            };

            match admission {
                Ok(spacing) => {
                    if spacing > Duration::ZERO {
                        tokio::time::sleep(spacing).await;
                    }
                    return Ok(());
                }
                Err(retry_after) => match self.throttle_policy {
                    ThrottlePolicy::Reject => {
                        let retry_after_secs = retry_after.as_secs_f64().ceil() as u64;
                        tracing::warn!(retry_after_secs, "local rate limit exceeded");
                        return Err(FeedError::RateLimitExceeded { retry_after_secs });
                    }
                    ThrottlePolicy::Wait => {
                        tracing::debug!(
                            wait_ms = retry_after.as_millis() as u64,
                            "local rate limit reached, waiting for window reset"
                        );
                        tokio::time::sleep(retry_after).await;
                    }
                },
            }
        }
    }

    /// One attempt: send, classify the outcome.
    async fn execute<T>(&self, url: &Url) -> Result<T, AttemptFailure>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = match self.http_client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                return Err(AttemptFailure {
                    error: FeedError::Timeout,
                    retryable: true,
                    retry_after: None,
                });
            }
            Err(error) => {
                let retryable = error.is_connect();
                return Err(AttemptFailure {
                    error: FeedError::Http(error),
                    retryable,
                    retry_after: None,
                });
            }
        };

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(|error| AttemptFailure {
                error: FeedError::Http(error),
                retryable: true,
                retry_after: None,
            })?;
            return serde_json::from_str(&body).map_err(|error| AttemptFailure {
                error: FeedError::InvalidResponse(format!(
                    "failed to parse response: {}. Body: {}",
                    error,
                    snippet(&body)
                )),
                retryable: false,
                retry_after: None,
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(AttemptFailure {
            error: FeedError::Unavailable {
                status: Some(status.as_u16()),
                message: snippet(&body),
            },
            retryable: is_retryable_status(status),
            retry_after,
        })
    }
}

impl Default for MarketRestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MarketRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketRestClient")
            .field("base_url", &self.base_url)
            .field("retry_policy", &self.retry_policy)
            .field("throttle_policy", &self.throttle_policy)
            .finish()
    }
}

/// HTTP 429 and 503 are the upstream's transient statuses; everything else
/// fails immediately.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Parse a `Retry-After` header in its delay-seconds form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// A transient failure that outlived every attempt.
fn exhausted(error: FeedError) -> FeedError {
    match error {
        unavailable @ FeedError::Unavailable { .. } => unavailable,
        other => FeedError::Unavailable {
            status: None,
            message: format!("retries exhausted: {other}"),
        },
    }
}

fn snippet(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(index, _)| *index < ERROR_BODY_LIMIT)
            .last()
            .map_or(0, |(index, c)| index + c.len_utf8());
        format!("{}...", &body[..cut])
    }
}

/// Builder for [`MarketRestClient`].
pub struct MarketRestClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    retry_policy: RetryPolicy,
    limiter_settings: LimiterSettings,
}

impl MarketRestClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: None,
            retry_policy: RetryPolicy::default(),
            limiter_settings: LimiterSettings::default(),
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the connect/response timeout applied to every outbound call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the retry policy for transient failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the local rate limiter ceilings, spacing and throttle policy.
    pub fn limiter_settings(mut self, settings: LimiterSettings) -> Self {
        self.limiter_settings = settings;
        self
    }

    /// Build the client.
    pub fn build(self) -> MarketRestClient {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("price-feed-client/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("price-feed-client"));
        headers.insert(USER_AGENT, header_value);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let limiter = KeyedRateLimiter::new(
            self.limiter_settings.requests_per_second,
            self.limiter_settings.requests_per_minute,
            self.limiter_settings.min_interval,
        );

        MarketRestClient {
            http_client,
            base_url: self.base_url,
            retry_policy: self.retry_policy,
            throttle_policy: self.limiter_settings.policy,
            limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

impl Default for MarketRestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("not-a-number"));
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(500);
        let cut = snippet(&long);
        assert!(cut.len() <= ERROR_BODY_LIMIT + 3);
        assert!(cut.ends_with("..."));

        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn test_exhausted_preserves_status() {
        let error = exhausted(FeedError::Unavailable {
            status: Some(503),
            message: "busy".to_string(),
        });
        match error {
            FeedError::Unavailable { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected error: {other}"),
        }

        let error = exhausted(FeedError::Timeout);
        match error {
            FeedError::Unavailable { status, message } => {
                assert_eq!(status, None);
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
