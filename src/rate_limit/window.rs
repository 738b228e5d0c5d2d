//! Fixed-window request counting with dual ceilings and burst smoothing.
//!
//! The upstream market-data API enforces both a per-second and a per-minute
//! quota, shared by every route in the process. [`DualWindowLimiter`] tracks
//! both windows and additionally spaces admitted requests by a minimum interval
//! so that a burst of cache misses does not land on the upstream all at once.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use price_feed_client::rate_limit::DualWindowLimiter;
//!
//! let mut limiter = DualWindowLimiter::new(5, 50, Duration::ZERO);
//! assert!(limiter.try_acquire().is_ok());
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A fixed-window counter.
///
/// The window starts at the first admitted request. When the ceiling is
/// reached the caller is blocked until the window ends; once the window
/// elapses the count resets to zero and any pending block clears.
#[derive(Debug)]
pub struct FixedWindow {
    count: u32,
    limit: u32,
    window: Duration,
    window_start: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl FixedWindow {
    /// Create a fixed window admitting at most `limit` requests per `window`.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            count: 0,
            limit,
            window,
            window_start: None,
            blocked_until: None,
        }
    }

    /// Reset the counter if the window has elapsed.
    fn roll(&mut self, now: Instant) {
        if let Some(start) = self.window_start {
            if now.duration_since(start) >= self.window {
                self.count = 0;
                self.window_start = None;
                self.blocked_until = None;
            }
        }
    }

    /// Check admission without consuming a slot.
    ///
    /// Returns `Err(retry_after)` when the ceiling is reached for the current
    /// window.
    pub(crate) fn check(&mut self, now: Instant) -> Result<(), Duration> {
        self.roll(now);

        if let Some(until) = self.blocked_until {
            return Err(until.saturating_duration_since(now));
        }

        if self.count >= self.limit {
            let window_end = self.window_start.map_or(now + self.window, |start| start + self.window);
            self.blocked_until = Some(window_end);
            return Err(window_end.saturating_duration_since(now));
        }

        Ok(())
    }

    /// Consume a slot. Must follow a successful [`FixedWindow::check`] with no
    /// suspension point in between.
    pub(crate) fn commit(&mut self, now: Instant) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.count += 1;
    }

    /// Try to acquire a slot.
    ///
    /// Returns `Ok(())` if admitted, `Err(retry_after)` if throttled.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        self.check(now)?;
        self.commit(now);
        Ok(())
    }

    /// Number of slots left in the current window.
    pub fn remaining(&mut self) -> u32 {
        self.roll(Instant::now());
        self.limit.saturating_sub(self.count)
    }

    /// Check if this window has no admitted requests and no pending block.
    pub fn is_idle(&mut self) -> bool {
        self.roll(Instant::now());
        self.count == 0 && self.blocked_until.is_none()
    }
}

/// A limiter enforcing a per-second ceiling, a per-minute ceiling, and a
/// minimum spacing between admitted requests.
///
/// Admission is a single logical step: both windows are checked, then both are
/// committed and the spacing slot reserved, all before control returns. The
/// caller sleeps off the returned spacing delay after releasing its lock, so
/// two concurrent callers can never both observe "under ceiling" and together
/// exceed it.
#[derive(Debug)]
pub struct DualWindowLimiter {
    per_second: FixedWindow,
    per_minute: FixedWindow,
    min_interval: Duration,
    next_slot: Option<Instant>,
}

impl DualWindowLimiter {
    /// Create a limiter admitting `per_second_limit` requests per second and
    /// `per_minute_limit` per minute, spaced at least `min_interval` apart.
    pub fn new(per_second_limit: u32, per_minute_limit: u32, min_interval: Duration) -> Self {
        Self {
            per_second: FixedWindow::new(Duration::from_secs(1), per_second_limit),
            per_minute: FixedWindow::new(Duration::from_secs(60), per_minute_limit),
            min_interval,
            next_slot: None,
        }
    }

    /// Try to acquire admission for one request.
    ///
    /// On success returns the spacing delay the caller must wait before issuing
    /// the request (zero when enough time has already passed since the previous
    /// admission). On throttle returns `Err(retry_after)`, the longer of the
    /// two windows' waits.
    pub fn try_acquire(&mut self) -> Result<Duration, Duration> {
        let now = Instant::now();

        let second = self.per_second.check(now);
        let minute = self.per_minute.check(now);

        match (second, minute) {
            (Ok(()), Ok(())) => {
                self.per_second.commit(now);
                self.per_minute.commit(now);

                let spacing = self
                    .next_slot
                    .map_or(Duration::ZERO, |slot| slot.saturating_duration_since(now));
                self.next_slot = Some(now + spacing + self.min_interval);
                Ok(spacing)
            }
            (Err(a), Err(b)) => Err(a.max(b)),
            (Err(wait), Ok(())) | (Ok(()), Err(wait)) => Err(wait),
        }
    }

    /// Remaining slots as `(per_second, per_minute)`.
    pub fn remaining(&mut self) -> (u32, u32) {
        (self.per_second.remaining(), self.per_minute.remaining())
    }

    /// Check if both windows are idle and the spacing reservation has passed.
    pub fn is_idle(&mut self) -> bool {
        let spacing_clear = self
            .next_slot
            .is_none_or(|slot| slot <= Instant::now());
        self.per_second.is_idle() && self.per_minute.is_idle() && spacing_clear
    }
}

/// Per-key rate limiting: each key gets its own [`DualWindowLimiter`].
///
/// The REST client uses the single key `"global"` so every endpoint class
/// shares one upstream quota; the keyed form keeps the limiter testable in
/// isolation and leaves room for per-upstream keys.
#[derive(Debug)]
pub struct KeyedRateLimiter<K> {
    limiters: HashMap<K, DualWindowLimiter>,
    per_second_limit: u32,
    per_minute_limit: u32,
    min_interval: Duration,
}

impl<K> KeyedRateLimiter<K>
where
    K: Hash + Eq + Clone,
{
    /// Create a per-key limiter with the given window ceilings and spacing.
    pub fn new(per_second_limit: u32, per_minute_limit: u32, min_interval: Duration) -> Self {
        Self {
            limiters: HashMap::new(),
            per_second_limit,
            per_minute_limit,
            min_interval,
        }
    }

    /// Try to acquire admission for the given key.
    ///
    /// Same contract as [`DualWindowLimiter::try_acquire`].
    pub fn try_acquire(&mut self, key: K) -> Result<Duration, Duration> {
        let limiter = self.limiters.entry(key).or_insert_with(|| {
            DualWindowLimiter::new(self.per_second_limit, self.per_minute_limit, self.min_interval)
        });
        limiter.try_acquire()
    }

    /// Drop limiters whose windows are idle.
    pub fn cleanup(&mut self) {
        self.limiters.retain(|_, limiter| !limiter.is_idle());
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.limiters.len()
    }

    /// Remove all tracking state.
    pub fn clear(&mut self) {
        self.limiters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fixed_window_allows_within_limit() {
        let mut window = FixedWindow::new(Duration::from_secs(1), 3);

        assert!(window.try_acquire().is_ok());
        assert!(window.try_acquire().is_ok());
        assert!(window.try_acquire().is_ok());
        assert!(window.try_acquire().is_err());
    }

    #[test]
    fn test_fixed_window_retry_after_positive() {
        let mut window = FixedWindow::new(Duration::from_secs(60), 2);

        window.try_acquire().unwrap();
        window.try_acquire().unwrap();

        let retry_after = window.try_acquire().unwrap_err();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_window_resets_after_window() {
        let mut window = FixedWindow::new(Duration::from_millis(50), 2);

        assert!(window.try_acquire().is_ok());
        assert!(window.try_acquire().is_ok());
        assert!(window.try_acquire().is_err());

        thread::sleep(Duration::from_millis(60));

        assert!(window.try_acquire().is_ok());
    }

    #[test]
    fn test_fixed_window_remaining() {
        let mut window = FixedWindow::new(Duration::from_secs(1), 3);

        assert_eq!(window.remaining(), 3);
        window.try_acquire().ok();
        assert_eq!(window.remaining(), 2);
        window.try_acquire().ok();
        assert_eq!(window.remaining(), 1);
    }

    #[test]
    fn test_dual_limiter_per_second_ceiling() {
        let mut limiter = DualWindowLimiter::new(2, 100, Duration::ZERO);

        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        let retry_after = limiter.try_acquire().unwrap_err();
        assert!(retry_after > Duration::ZERO);
    }

    #[test]
    fn test_dual_limiter_per_minute_ceiling() {
        // Per-second window is wide open; the minute ceiling must still hold.
        let mut limiter = DualWindowLimiter::new(100, 3, Duration::ZERO);

        for _ in 0..3 {
            assert!(limiter.try_acquire().is_ok());
        }
        let retry_after = limiter.try_acquire().unwrap_err();
        assert!(retry_after > Duration::from_secs(50));
    }

    #[test]
    fn test_dual_limiter_spacing_reservation() {
        let mut limiter = DualWindowLimiter::new(100, 100, Duration::from_millis(100));

        assert_eq!(limiter.try_acquire().unwrap(), Duration::ZERO);

        let spacing = limiter.try_acquire().unwrap();
        assert!(spacing > Duration::from_millis(50));
        assert!(spacing <= Duration::from_millis(100));

        // Back-to-back admissions stack their reservations.
        let spacing = limiter.try_acquire().unwrap();
        assert!(spacing > Duration::from_millis(150));
    }

    #[test]
    fn test_dual_limiter_count_never_exceeds_ceiling() {
        let mut limiter = DualWindowLimiter::new(5, 100, Duration::ZERO);

        let mut admitted = 0;
        for _ in 0..20 {
            if limiter.try_acquire().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_keyed_limiter_independent_keys() {
        let mut limiter: KeyedRateLimiter<String> = KeyedRateLimiter::new(2, 100, Duration::ZERO);

        assert!(limiter.try_acquire("markets".to_string()).is_ok());
        assert!(limiter.try_acquire("markets".to_string()).is_ok());
        assert!(limiter.try_acquire("markets".to_string()).is_err());

        assert!(limiter.try_acquire("chart".to_string()).is_ok());
        assert!(limiter.try_acquire("chart".to_string()).is_ok());
        assert!(limiter.try_acquire("chart".to_string()).is_err());
    }

    #[test]
    fn test_keyed_limiter_cleanup_keeps_active_keys() {
        let mut limiter: KeyedRateLimiter<String> =
            KeyedRateLimiter::new(100, 100, Duration::ZERO);

        limiter.try_acquire("key1".to_string()).ok();
        limiter.try_acquire("key2".to_string()).ok();
        assert_eq!(limiter.tracked_keys(), 2);

        // Both keys sit inside live windows and must survive a cleanup.
        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.clear();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_dual_limiter_idle_after_windows_elapse() {
        let mut limiter = DualWindowLimiter::new(100, 100, Duration::ZERO);
        assert!(limiter.is_idle());

        limiter.try_acquire().unwrap();
        assert!(!limiter.is_idle());
    }
}
