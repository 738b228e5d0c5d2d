//! Response cache with per-entry time-to-live.
//!
//! Every upstream response is cached under a key deterministic in the request
//! parameters, with a TTL chosen per endpoint. Expired entries behave as misses
//! and are removed lazily on lookup; [`ResponseCache::purge_expired`] is the hook
//! for a periodic sweep.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use price_feed_client::cache::ResponseCache;
//!
//! let mut cache: ResponseCache<i64> = ResponseCache::new(Duration::from_secs(60));
//!
//! cache.insert("topCoins_10", 42, Duration::from_secs(300));
//! assert_eq!(cache.get("topCoins_10"), Some(42));
//!
//! cache.remove("topCoins_10");
//! assert_eq!(cache.get("topCoins_10"), None);
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A single cached value and its expiry deadline.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Hit/miss counters and the number of live keys, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live value.
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry.
    pub misses: u64,
    /// Number of unexpired entries currently stored.
    pub keys: usize,
}

/// A string-keyed cache whose entries each carry their own TTL.
///
/// Values are returned by clone at read time, never live-linked: flushing the
/// cache does not affect requests already holding a previously-read value.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new cache. `default_ttl` applies to [`ResponseCache::insert_default`].
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    /// Store `value` under `key`, expiring `ttl` from now.
    ///
    /// Overwrites any existing entry for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Store `value` under `key` with the cache-wide default TTL.
    pub fn insert_default(&mut self, key: impl Into<String>, value: V) {
        self.insert(key, value, self.default_ttl);
    }

    /// Return a copy of the value if the key exists and has not expired.
    ///
    /// An expired entry is removed and counted as a miss; stale data is never
    /// returned.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits += 1;
                tracing::debug!(key = %key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.misses += 1;
                tracing::debug!(key = %key, "cache miss (expired)");
                None
            }
            None => {
                self.misses += 1;
                tracing::debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Check if a key exists and has not expired, without touching the counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Remove an entry, returning the value if it existed and had not expired.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }

    /// Remove every entry and reset the hit/miss counters.
    pub fn flush_all(&mut self) {
        tracing::debug!("cache flush");
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Drop expired entries. Called periodically to free memory; correctness
    /// does not depend on it since `get` checks expiry itself.
    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries in the map, including any not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters and live-key count.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let keys = self
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count();
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            keys,
        }
    }

    /// The TTL used by [`ResponseCache::insert_default`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_insert_and_get() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        assert_eq!(cache.get("key1"), Some(100));
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_get_after_ttl_is_a_miss() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_millis(50));
        assert_eq!(cache.get("key1"), Some(100));

        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_key_isolation() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        cache.insert("key2", 200, Duration::from_secs(60));
        cache.insert("key1", 111, Duration::from_secs(60));

        assert_eq!(cache.get("key1"), Some(111));
        assert_eq!(cache.get("key2"), Some(200));
    }

    #[test]
    fn test_remove() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        assert_eq!(cache.remove("key1"), Some(100));
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_flush_all_resets_stats() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        cache.get("key1");
        cache.get("missing");
        cache.flush_all();

        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_purge_expired() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("short", 1, Duration::from_millis(40));
        cache.insert("long", 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);

        thread::sleep(Duration::from_millis(50));
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_stats_counts() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        cache.get("key1");
        cache.get("key1");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 1);
    }

    #[test]
    fn test_contains_does_not_count() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_secs(60));

        cache.insert("key1", 100, Duration::from_secs(60));
        assert!(cache.contains("key1"));
        assert!(!cache.contains("key2"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_insert_default_uses_default_ttl() {
        let mut cache: ResponseCache<i32> = ResponseCache::new(Duration::from_millis(40));

        cache.insert_default("key1", 100);
        assert_eq!(cache.get("key1"), Some(100));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("key1"), None);
    }
}
