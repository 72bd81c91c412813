//! Core cache traits and types

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Trait for types that can be used as cache keys
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync {}

/// Trait for types that can be cached
pub trait CacheValue: Clone + Debug + Send + Sync {}

// Blanket implementations
impl<T> CacheKey for T where T: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T> CacheValue for T where T: Clone + Debug + Send + Sync {}

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When the entry was created
    pub created_at: Instant,

    /// When the entry stops being served
    pub expires_at: Instant,

    /// Number of times accessed
    pub access_count: u64,
}

impl<V: CacheValue> CacheEntry<V> {
    /// Create a new cache entry living for `ttl`
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
        }
    }

    /// An entry is expired from the instant `expires_at` is reached
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against a caller-supplied clock reading
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Record an access
    pub fn record_access(&mut self) {
        self.access_count += 1;
    }

    /// Get age of the entry
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_boundary() {
        let entry = CacheEntry::with_ttl("value", Duration::from_millis(100));
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.age(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_immediately_expired() {
        let entry = CacheEntry::with_ttl(1u32, Duration::ZERO);
        assert!(entry.is_expired());
    }
}
