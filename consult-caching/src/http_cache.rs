//! HTTP response cache implementation

use consult_config::CacheConfig;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::{stores::TtlCache, CacheStats};

/// HTTP cache key.
///
/// Structural rather than hashed, so two requests share an entry only if
/// method, URL, every query pair and the request body all match.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct HttpCacheKey {
    /// HTTP method, upper-cased
    pub method: String,

    /// URL
    pub url: String,

    /// Query parameters (sorted for consistency)
    pub query_params: Vec<(String, String)>,

    /// Canonical JSON rendering of the request body, if any
    pub body: Option<String>,
}

impl HttpCacheKey {
    /// Create a new cache key
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Build a key from every request part that affects the response
    pub fn from_parts(
        method: impl Into<String>,
        url: impl Into<String>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Self {
        let mut key = Self::new(method, url).with_query_params(query.to_vec());
        if let Some(body) = body {
            key = key.with_body(body);
        }
        key
    }

    /// Add query parameters
    pub fn with_query_params(mut self, params: Vec<(String, String)>) -> Self {
        let mut params = params;
        params.sort();
        self.query_params = params;
        self
    }

    /// Add a JSON body; object keys are sorted so field order is irrelevant
    pub fn with_body(mut self, body: &Value) -> Self {
        self.body = Some(canonicalize(body).to_string());
        self
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Cache of decoded GET responses
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<TtlCache<HttpCacheKey, Arc<Value>>>,
    enabled: bool,
}

impl ResponseCache {
    /// Create an enabled cache with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(TtlCache::new(default_ttl)),
            enabled: true,
        }
    }

    /// Create a new response cache from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(TtlCache::new(config.default_ttl)),
            enabled: config.enabled,
        }
    }

    /// Whether lookups and stores do anything
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Default TTL for stored responses
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl()
    }

    /// Get a cached response
    pub fn get(&self, key: &HttpCacheKey) -> Option<Arc<Value>> {
        if !self.enabled {
            return None;
        }

        let hit = self.inner.get(key);
        if hit.is_some() {
            log::debug!("Response cache hit for {} {}", key.method, key.url);
        }
        hit
    }

    /// Store a response; `ttl` falls back to the configured default
    pub fn set(&self, key: HttpCacheKey, value: Value, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }

        let ttl = ttl.unwrap_or_else(|| self.inner.default_ttl());
        self.inner.put_with_ttl(key, Arc::new(value), ttl);
    }

    /// Drop a single entry
    pub fn invalidate(&self, key: &HttpCacheKey) {
        self.inner.remove(key);
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Remove expired entries
    pub fn clear_expired(&self) -> usize {
        self.inner.clear_expired()
    }

    /// Hit and miss counters
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    /// Sweep expired entries in the background
    pub fn start_cleanup_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        self.inner.start_cleanup_task(interval)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.enabled)
            .field("default_ttl", &self.inner.default_ttl())
            .field("entries", &self.inner.len())
            .finish()
    }
}
