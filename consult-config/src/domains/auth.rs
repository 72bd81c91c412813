//! Authentication configuration

use crate::error::ConfigResult;
use crate::validation::{validate_path, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Token handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the token refresh endpoint, relative to the base URL
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Lifetime assumed for a freshly issued access token
    #[serde(
        rename = "token_lifetime_secs",
        with = "crate::domains::utils::serde_duration_secs",
        default = "default_token_lifetime"
    )]
    pub token_lifetime: Duration,

    /// File the session token is persisted to; in-memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            token_lifetime: default_token_lifetime(),
            token_file: None,
        }
    }
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_path(&self.refresh_path, "refresh_path", self.domain_name())?;
        validate_positive(
            self.token_lifetime.as_secs(),
            "token_lifetime_secs",
            self.domain_name(),
        )?;

        if let Some(ref path) = self.token_file {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error("token_file cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_token_lifetime() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
