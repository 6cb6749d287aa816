//! Capacity-bounded cache with per-read TTL and recency-based eviction.
//!
//! The TTL is passed on every read rather than fixed at construction, so the
//! same type backs both the short-lived raw response cache and the long-lived
//! resolved result cache.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use lru::LruCache;
use tokio::time::Instant;

use crate::clock::Clock;

/// A cached value with its recency bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// Last write or successful read.
    touched_at: Instant,
    /// Number of successful reads.
    access_count: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe bounded TTL cache.
///
/// Entries are kept in recency order: reads and writes move an entry to the
/// most-recent end, and inserting a new key at capacity evicts the entry at
/// the least-recent end.
pub struct BoundedTtlCache<K, V> {
    name: &'static str,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(name: &'static str, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    ///
    /// A poisoned cache can at worst serve a stale entry, which is better
    /// than failing the query.
    fn lock_entries(&self) -> MutexGuard<'_, LruCache<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    /// Insert or refresh a value.
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        if let Some(entry) = entries.get_mut(&key) {
            entry.value = value;
            entry.touched_at = now;
            return;
        }

        let evicted = entries.push(
            key,
            CacheEntry {
                value,
                touched_at: now,
                access_count: 0,
            },
        );
        if evicted.is_some() {
            debug!("Cache '{}': evicted least recently used entry", self.name);
        }
    }

    /// Look up a value that is at most `ttl` old.
    ///
    /// A hit refreshes the entry's timestamp and recency. An expired entry is
    /// removed and reported as a miss.
    pub fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        let expired = match entries.peek(key) {
            Some(entry) => now.saturating_duration_since(entry.touched_at) > ttl,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.touched_at = now;
        entry.access_count += 1;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// How many times an entry has been read, if present.
    pub fn access_count(&self, key: &K) -> Option<u64> {
        self.lock_entries().peek(key).map(|e| e.access_count)
    }

    /// Remove every entry older than `ttl`. Returns how many were removed.
    pub fn cleanup(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.touched_at) > ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            debug!(
                "Cache '{}': swept {} expired entries, {} remain",
                self.name,
                expired.len(),
                entries.len()
            );
        }
        expired.len()
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&self) {
        self.lock_entries().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(10);

    fn setup(capacity: usize) -> (Arc<ManualClock>, BoundedTtlCache<String, u32>) {
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        ));
        let cache = BoundedTtlCache::new("test", capacity, clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_get_within_ttl_hits() {
        let (clock, cache) = setup(4);
        cache.set("a".to_string(), 1);
        clock.advance(TTL);
        assert_eq!(cache.get(&"a".to_string(), TTL), Some(1));
        assert_eq!(cache.access_count(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_get_after_ttl_misses_and_removes() {
        let (clock, cache) = setup(4);
        cache.set("a".to_string(), 1);
        clock.advance(TTL + Duration::from_millis(1));
        assert_eq!(cache.get(&"a".to_string(), TTL), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_is_per_call() {
        let (clock, cache) = setup(4);
        cache.set("a".to_string(), 1);
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get(&"a".to_string(), Duration::from_secs(60)), Some(1));
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get(&"a".to_string(), Duration::from_secs(5)), None);
    }

    #[test]
    fn test_eviction_removes_least_recently_touched() {
        let (_clock, cache) = setup(3);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("c".to_string(), 3);
        cache.set("d".to_string(), 4);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"a".to_string(), TTL), None);
        assert_eq!(cache.get(&"b".to_string(), TTL), Some(2));
    }

    #[test]
    fn test_read_protects_from_eviction() {
        let (_clock, cache) = setup(3);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("c".to_string(), 3);
        assert_eq!(cache.get(&"a".to_string(), TTL), Some(1));

        cache.set("d".to_string(), 4);

        assert_eq!(cache.get(&"a".to_string(), TTL), Some(1));
        assert_eq!(cache.get(&"b".to_string(), TTL), None);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_refreshing_existing_key_does_not_evict() {
        let (_clock, cache) = setup(2);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("a".to_string(), 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string(), TTL), Some(10));
        assert_eq!(cache.get(&"b".to_string(), TTL), Some(2));
    }

    #[test]
    fn test_cleanup_sweeps_only_expired() {
        let (clock, cache) = setup(4);
        cache.set("old".to_string(), 1);
        clock.advance(Duration::from_secs(8));
        cache.set("new".to_string(), 2);
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.cleanup(TTL), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".to_string(), TTL), Some(2));
    }

    #[test]
    fn test_stats_and_clear() {
        let (_clock, cache) = setup(4);
        cache.set("a".to_string(), 1);
        cache.get(&"a".to_string(), TTL);
        cache.get(&"missing".to_string(), TTL);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats { capacity: 4, ..Default::default() });
    }

    proptest! {
        #[test]
        fn prop_get_hits_iff_age_within_ttl(ttl_ms in 1u64..10_000, age_ms in 0u64..20_000) {
            let (clock, cache) = setup(8);
            let ttl = Duration::from_millis(ttl_ms);
            cache.set("k".to_string(), 7);
            clock.advance(Duration::from_millis(age_ms));

            let hit = cache.get(&"k".to_string(), ttl);
            if age_ms <= ttl_ms {
                prop_assert_eq!(hit, Some(7));
            } else {
                prop_assert_eq!(hit, None);
                prop_assert!(cache.is_empty());
            }
        }
    }
}
