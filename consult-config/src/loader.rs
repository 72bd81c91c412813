//! Configuration loading and environment variable handling

use crate::domains::ConsultConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "CONSULT".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<ConsultConfig> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: ConsultConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<ConsultConfig> {
        let mut config = ConsultConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<ConsultConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut ConsultConfig) -> ConfigResult<()> {
        self.apply_http_overrides(&mut config.http)?;
        self.apply_retry_overrides(&mut config.retry)?;
        self.apply_cache_overrides(&mut config.cache)?;
        self.apply_auth_overrides(&mut config.auth)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.base_url = base_url;
        }

        if let Some(timeout) = self.parse_env_millis("TIMEOUT_MS")? {
            config.timeout = timeout;
        }

        if let Some(timeout) = self.parse_env_millis("UPLOAD_TIMEOUT_MS")? {
            config.upload_timeout = timeout;
        }

        if let Ok(version) = self.get_env_var("APP_VERSION") {
            config.app_version = version;
        }

        Ok(())
    }

    fn apply_retry_overrides(
        &self,
        config: &mut crate::domains::retry::RetryConfig,
    ) -> ConfigResult<()> {
        if let Some(attempts) = self.parse_env::<u32>("RETRY_MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }

        if let Some(failures) = self.parse_env::<u32>("RETRY_MAX_FAILURES")? {
            config.max_failures = failures;
        }

        if let Some(delay) = self.parse_env_millis("RETRY_BASE_DELAY_MS")? {
            config.base_delay = delay;
        }

        if let Some(delay) = self.parse_env_millis("RETRY_MAX_DELAY_MS")? {
            config.max_delay = delay;
        }

        if let Some(timeout) = self.parse_env_millis("RETRY_RESET_TIMEOUT_MS")? {
            config.reset_timeout = timeout;
        }

        Ok(())
    }

    fn apply_cache_overrides(
        &self,
        config: &mut crate::domains::cache::CacheConfig,
    ) -> ConfigResult<()> {
        if let Some(enabled) = self.parse_env::<bool>("CACHE_ENABLED")? {
            config.enabled = enabled;
        }

        if let Some(ttl) = self.parse_env_millis("CACHE_TTL_MS")? {
            config.default_ttl = ttl;
        }

        Ok(())
    }

    fn apply_auth_overrides(
        &self,
        config: &mut crate::domains::auth::AuthConfig,
    ) -> ConfigResult<()> {
        if let Ok(path) = self.get_env_var("REFRESH_PATH") {
            config.refresh_path = path;
        }

        if let Ok(file) = self.get_env_var("TOKEN_FILE") {
            config.token_file = Some(PathBuf::from(file));
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn parse_env<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => {
                log::debug!("Applying {}_{} override", self.prefix, name);
                raw.trim()
                    .parse()
                    .map(Some)
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))
            }
            Err(_) => Ok(None),
        }
    }

    fn parse_env_millis(&self, name: &str) -> ConfigResult<Option<Duration>> {
        Ok(self.parse_env::<u64>(name)?.map(Duration::from_millis))
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
