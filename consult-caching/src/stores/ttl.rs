//! Time-based TTL cache implementation

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::{
    cache::{CacheEntry, CacheKey, CacheValue},
    stats::{create_stats_collector, SharedStatsCollector},
    CacheStats,
};

/// TTL-based cache with lazy eviction.
///
/// Expired entries stay in the map until they are read, swept by
/// [`TtlCache::clear_expired`], or cleared.
pub struct TtlCache<K, V> {
    /// Default TTL for entries
    default_ttl: Duration,

    /// Store with entries
    store: RwLock<HashMap<K, CacheEntry<V>>>,

    /// Statistics collector
    stats: SharedStatsCollector,
}

impl<K: CacheKey + 'static, V: CacheValue + 'static> TtlCache<K, V> {
    /// Create a new TTL cache with default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            store: RwLock::new(HashMap::new()),
            stats: create_stats_collector(),
        }
    }

    /// TTL applied by [`TtlCache::put`]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a value, deleting it instead if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        let mut store = self.store.write();
        match store.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                self.stats.record_evictions(1);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                entry.record_access();
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Put a value with the default TTL
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Put a value that expires after `ttl`, replacing any previous entry
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut store = self.store.write();
        store.insert(key, CacheEntry::with_ttl(value, ttl));
        self.stats.record_put();
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut store = self.store.write();
        store
            .remove(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value)
    }

    /// Check if a live entry exists without touching statistics
    pub fn contains_key(&self, key: &K) -> bool {
        let store = self.store.read();
        store.get(key).is_some_and(|entry| !entry.is_expired())
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut store = self.store.write();
        let count = store.len();
        store.clear();
        self.stats.record_evictions(count);
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired_at(now));
        let count = before - store.len();

        if count > 0 {
            self.stats.record_evictions(count);
            log::debug!("Swept {} expired cache entries", count);
        }

        count
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let store = self.store.read();
        store
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    /// Check if cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let stored = self.store.read().len();
        self.stats.get_stats(stored)
    }

    /// Start a background task sweeping expired entries on `interval`.
    ///
    /// The task exits once the cache has been dropped.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.clear_expired();
                    }
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let cache = TtlCache::new(Duration::from_millis(100));

        cache.put("key1", "value1");
        assert_eq!(cache.get(&"key1"), Some("value1"));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"key1"), Some("value1"));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&"key1"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));

        cache.put_with_ttl("key1", "value1", Duration::from_millis(50));
        cache.put("key2", "value2");

        assert_eq!(cache.get(&"key1"), Some("value1"));
        assert_eq!(cache.get(&"key2"), Some("value2"));

        tokio::time::advance(Duration::from_millis(100)).await;

        assert_eq!(cache.get(&"key1"), None);
        assert_eq!(cache.get(&"key2"), Some("value2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_is_lazy() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.put(1, "one");

        tokio::time::advance(Duration::from_millis(20)).await;

        // Still stored, just not served
        assert_eq!(cache.stats().entry_count, 1);
        assert_eq!(cache.len(), 0);
        assert!(!cache.contains_key(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_expired() {
        let cache = TtlCache::new(Duration::from_millis(50));

        for i in 0..5 {
            cache.put(i, i * 10);
        }
        cache.put_with_ttl(99, 990, Duration::from_secs(60));
        assert_eq!(cache.len(), 6);

        tokio::time::advance(Duration::from_millis(100)).await;

        assert_eq!(cache.clear_expired(), 5);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&99), Some(990));
        assert_eq!(cache.clear_expired(), 0);
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("a", 1);
        cache.put("b", 2);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.remove(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_and_stops() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(10)));
        cache.put("k", "v");

        let handle = cache.start_cleanup_task(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.stats().entry_count, 0);

        drop(cache);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_finished());
    }
}
