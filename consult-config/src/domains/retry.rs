//! Retry and circuit breaker configuration

use crate::error::ConfigResult;
use crate::validation::{validate_ordered, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and circuit breaker tuning shared by every call of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt for idempotent calls
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Consecutive failed calls before the circuit opens
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Delay before the first retry
    #[serde(
        rename = "base_delay_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_base_delay"
    )]
    pub base_delay: Duration,

    /// Upper bound for any retry delay
    #[serde(
        rename = "max_delay_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_max_delay"
    )]
    pub max_delay: Duration,

    /// How long an open circuit rejects calls before admitting a trial
    #[serde(
        rename = "reset_timeout_ms",
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_reset_timeout"
    )]
    pub reset_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_failures: default_max_failures(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            reset_timeout: default_reset_timeout(),
        }
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_failures, "max_failures", self.domain_name())?;
        validate_positive(self.base_delay.as_millis(), "base_delay_ms", self.domain_name())?;
        validate_ordered(
            self.base_delay.as_millis(),
            self.max_delay.as_millis(),
            "base_delay_ms",
            "max_delay_ms",
            self.domain_name(),
        )?;
        validate_positive(
            self.reset_timeout.as_millis(),
            "reset_timeout_ms",
            self.domain_name(),
        )?;

        if self.max_attempts > 10 {
            return Err(self.validation_error(format!(
                "max_attempts must be at most 10, got {}",
                self.max_attempts
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_failures() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(5000)
}

fn default_reset_timeout() -> Duration {
    Duration::from_millis(30_000)
}
