//! Transport configuration for the backend API

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL every relative request path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for ordinary requests
    #[serde(
        rename = "timeout_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    /// Timeout for multipart uploads
    #[serde(
        rename = "upload_timeout_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_upload_timeout"
    )]
    pub upload_timeout: Duration,

    /// Timeout for raw downloads
    #[serde(
        rename = "download_timeout_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_download_timeout"
    )]
    pub download_timeout: Duration,

    /// Value sent as `X-App-Version`
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers attached to every request
    #[serde(default = "default_headers")]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            upload_timeout: default_upload_timeout(),
            download_timeout: default_download_timeout(),
            app_version: default_app_version(),
            user_agent: default_user_agent(),
            default_headers: default_headers(),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;

        validate_positive(self.timeout.as_millis(), "timeout_ms", self.domain_name())?;
        validate_positive(
            self.upload_timeout.as_millis(),
            "upload_timeout_ms",
            self.domain_name(),
        )?;
        validate_positive(
            self.download_timeout.as_millis(),
            "download_timeout_ms",
            self.domain_name(),
        )?;

        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;

        for name in self.default_headers.keys() {
            if name.trim().is_empty() {
                return Err(self.validation_error("default header names cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5173/api".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_upload_timeout() -> Duration {
    Duration::from_millis(120_000)
}

fn default_download_timeout() -> Duration {
    Duration::from_millis(60_000)
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_user_agent() -> String {
    format!("Consult/{}", env!("CARGO_PKG_VERSION"))
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.base_url, "http://localhost:5173/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(120));
        assert_eq!(config.download_timeout, Duration::from_secs(60));
        assert_eq!(
            config.default_headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_http_config_validation() {
        let mut config = HttpConfig::default();
        assert!(config.validate().is_ok());

        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config = HttpConfig::default();
        config.base_url = "localhost/api".to_string();
        assert!(config.validate().is_err());

        config = HttpConfig::default();
        config.user_agent = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_config_millisecond_fields() {
        let config: HttpConfig =
            serde_yaml::from_str("base_url: https://api.example.com\ntimeout_ms: 2500\n").unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.upload_timeout, Duration::from_secs(120));
    }
}
