//! HTTP client configuration

use crate::errors::{ApiError, ApiResult};
use consult_config::{AuthConfig, HttpConfig as ConfigHttpConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Settings the client session needs at request time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL relative paths are joined onto
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Timeout for multipart uploads
    pub upload_timeout: Duration,

    /// Timeout for raw downloads
    pub download_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Headers attached to every request, `X-App-Version` included
    pub default_headers: Vec<(String, String)>,

    /// Token refresh endpoint, relative to the base URL
    pub refresh_path: String,

    /// Lifetime given to tokens issued by login or refresh
    pub token_lifetime: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_parts(&ConfigHttpConfig::default(), &AuthConfig::default())
    }
}

impl From<&consult_config::ConsultConfig> for ClientConfig {
    fn from(config: &consult_config::ConsultConfig) -> Self {
        Self::from_parts(&config.http, &config.auth)
    }
}

impl ClientConfig {
    /// Build from the transport and auth configuration domains
    pub fn from_parts(http: &ConfigHttpConfig, auth: &AuthConfig) -> Self {
        let mut default_headers: Vec<(String, String)> = http
            .default_headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        default_headers.push(("X-App-Version".to_string(), http.app_version.clone()));

        Self {
            base_url: http.base_url.clone(),
            timeout: http.timeout,
            upload_timeout: http.upload_timeout,
            download_timeout: http.download_timeout,
            user_agent: http.user_agent.clone(),
            default_headers,
            refresh_path: auth.refresh_path.clone(),
            token_lifetime: auth.token_lifetime,
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)` URLs are used as given.
    pub fn resolve_url(&self, path: &str) -> ApiResult<Url> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };

        Url::parse(&joined)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid URL '{}': {}", joined, e)))
    }
}
