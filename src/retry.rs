//! Retry policy with jittered exponential backoff.
//!
//! Transient upstream failures (HTTP 429/503, timeouts) are retried a bounded
//! number of times. Each retry waits `min(2^attempt * min_delay + jitter,
//! max_delay)`; the jitter desynchronizes concurrent callers that were failed by
//! the same upstream window, so they do not all retry in the same instant.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use price_feed_client::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30));
//! assert_eq!(policy.base_delay(0), Duration::from_secs(1));
//! assert_eq!(policy.base_delay(2), Duration::from_secs(4));
//! assert!(policy.delay_for(10) <= Duration::from_secs(30));
//! ```

use std::time::Duration;

use rand::Rng;

/// Retry configuration for the REST client. Immutable per client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, counting the initial request.
    pub max_attempts: u32,
    /// Backoff base: the delay before the first retry, ignoring jitter.
    pub min_delay: Duration,
    /// Upper bound on any computed delay, jitter included.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
        }
    }

    /// The deterministic part of the backoff: `min(2^attempt * min_delay, max_delay)`.
    ///
    /// Attempt counting starts at 0. The sequence is non-decreasing and
    /// saturates at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// The delay to sleep before retrying `attempt`: base delay plus a uniform
    /// jitter in `[0, min_delay)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ceiling = self.min_delay.as_millis() as u64;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ceiling)
        };

        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = (self.min_delay.as_millis() as u64)
            .saturating_mul(factor)
            .saturating_add(jitter);
        Duration::from_millis(millis).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 3 attempts, 1s base, 30s ceiling: the defaults the upstream quota
        // tolerates without tripping its own abuse detection.
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(30));

        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(2), Duration::from_millis(400));
        assert_eq!(policy.base_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_base_delay_monotonic_until_saturation() {
        let policy = RetryPolicy::new(10, Duration::from_millis(250), Duration::from_secs(5));

        let mut previous = Duration::ZERO;
        for attempt in 0..32 {
            let delay = policy.base_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(policy.base_delay(31), policy.max_delay);
    }

    #[test]
    fn test_delay_for_never_exceeds_max() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(8));

        for attempt in 0..16 {
            assert!(policy.delay_for(attempt) <= policy.max_delay);
        }
    }

    #[test]
    fn test_delay_for_includes_base() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(30));

        for attempt in 0..4 {
            assert!(policy.delay_for(attempt) >= policy.base_delay(attempt));
        }
    }

    #[test]
    fn test_zero_min_delay() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1));
        assert_eq!(policy.base_delay(5), Duration::ZERO);
        assert_eq!(policy.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.base_delay(64), policy.max_delay);
        assert_eq!(policy.delay_for(64), policy.max_delay);
    }
}
