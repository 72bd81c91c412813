//! Response cache configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether GET responses are cached at all
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// TTL applied when a call does not override it
    #[serde(
        rename = "default_ttl_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_ttl"
    )]
    pub default_ttl: Duration,

    /// Interval of the background sweep of expired entries
    #[serde(
        rename = "cleanup_interval_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_cleanup_interval"
    )]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: default_ttl(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl Validatable for CacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.default_ttl.as_millis(),
            "default_ttl_ms",
            self.domain_name(),
        )?;

        validate_positive(
            self.cleanup_interval.as_millis(),
            "cleanup_interval_ms",
            self.domain_name(),
        )?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}

fn default_ttl() -> Duration {
    Duration::from_millis(300_000) // 5 minutes
}

fn default_cleanup_interval() -> Duration {
    Duration::from_millis(60_000)
}
