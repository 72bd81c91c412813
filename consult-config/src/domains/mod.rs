//! Domain-specific configuration modules

pub mod auth;
pub mod cache;
pub mod http;
pub mod logging;
pub mod retry;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main client configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConsultConfig {
    /// Transport configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Retry and circuit breaker configuration
    #[serde(default)]
    pub retry: retry::RetryConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: cache::CacheConfig,

    /// Token handling configuration
    #[serde(default)]
    pub auth: auth::AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl ConsultConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        self.auth.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = ConsultConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
