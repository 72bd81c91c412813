//! Response caching for the Consult API client
//!
//! A key to (value, expiry) map with lazy TTL eviction, plus the
//! structural cache key used to short-circuit repeat GET requests.

pub mod cache;
pub mod http_cache;
pub mod stats;
pub mod stores;

// Re-export main types
pub use cache::{CacheEntry, CacheKey, CacheValue};
pub use http_cache::{HttpCacheKey, ResponseCache};
pub use stats::CacheStats;
pub use stores::TtlCache;
