//! Error types for the price feed client library.

use thiserror::Error;

/// The main error type for all price feed operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL does not form a valid request URL
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Local rate limit exceeded before any network call was made
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Suggested wait time in seconds before retrying
        retry_after_secs: u64,
    },

    /// Upstream API is unavailable: a non-retryable status, or retries exhausted
    #[error("price feed unavailable ({}): {message}", status.map_or("no status".to_string(), |s| s.to_string()))]
    Unavailable {
        /// HTTP status code of the final upstream response, if one was received
        status: Option<u16>,
        /// Description of the failure, preserving the original cause
        message: String,
    },

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Upstream returned 2xx but the body did not match the expected schema
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FeedError {
    /// Suggested wait in seconds, if this is a local rate limit rejection.
    ///
    /// Route layers translate this into an HTTP 429 with a `retryAfter` field.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FeedError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Check if this error was raised by the local rate limiter.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedError::RateLimitExceeded { .. })
    }

    /// Check if this error means the upstream could not be reached or served.
    ///
    /// Route layers translate these into HTTP 500/502.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FeedError::Unavailable { .. } | FeedError::Timeout | FeedError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_secs() {
        let error = FeedError::RateLimitExceeded {
            retry_after_secs: 42,
        };
        assert_eq!(error.retry_after_secs(), Some(42));
        assert!(error.is_rate_limited());
        assert!(!error.is_unavailable());

        let error = FeedError::Timeout;
        assert_eq!(error.retry_after_secs(), None);
        assert!(error.is_unavailable());
    }

    #[test]
    fn test_unavailable_display() {
        let error = FeedError::Unavailable {
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "price feed unavailable (502): bad gateway"
        );
    }
}
