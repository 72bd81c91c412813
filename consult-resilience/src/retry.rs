//! Retry policy and executor

use consult_config::RetryConfig;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::backoff::{BackoffCalculator, BackoffStrategy};
use crate::circuit_breaker::CircuitBreaker;

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any retry delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            backoff_strategy: BackoffStrategy::default(),
            jitter: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.base_delay,
            max_delay: config.max_delay,
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    /// Same policy, but the first failure is final
    pub fn without_retries(&self) -> Self {
        Self {
            max_attempts: 0,
            ..self.clone()
        }
    }

    /// Create a linear retry policy
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay.saturating_mul(max_attempts.max(1)),
            backoff_strategy: BackoffStrategy::Linear,
            jitter: false,
        }
    }

    /// Whether a failure on 0-indexed `attempt` may be retried
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let calculator = BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        );

        calculator.calculate_delay(attempt)
    }

    /// Delay after `error`, honouring a server hint but never past `max_delay`
    pub fn delay_for_error<E: Retryable>(&self, error: &E, attempt: u32) -> Duration {
        match error.retry_delay() {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for(attempt),
        }
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether this error is retryable
    fn is_retryable(&self) -> bool;

    /// Custom retry delay for this error type
    fn retry_delay(&self) -> Option<Duration> {
        None
    }
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Create with default policy
    pub fn with_default_policy() -> Self {
        Self::new(RetryPolicy::default())
    }

    /// Policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        self.execute_with_context(|_attempt| f()).await
    }

    /// Execute a function with retry logic and the 0-indexed attempt number
    pub async fn execute_with_context<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            debug!(
                "Executing attempt {} of {}",
                attempt + 1,
                self.policy.max_attempts + 1
            );

            match f(attempt).await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} attempts", attempt + 1);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!("Operation failed with non-retryable error: {}", error);
                        return Err(RetryError::NonRetryableError(error));
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!("Operation failed after {} attempts: {}", attempt + 1, error);
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt + 1,
                            last_error: error,
                        });
                    }

                    let delay = self.policy.delay_for_error(&error, attempt);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        error,
                        delay
                    );
                    sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }

    /// Execute behind a circuit breaker.
    ///
    /// The breaker sees one outcome per call, never per attempt: retries
    /// exhausted on a retryable error is a failure and only `Ok` is a
    /// success. A non-retryable error releases the permit untouched.
    pub async fn execute_with_circuit_breaker<F, Fut, T, E>(
        &self,
        f: F,
        circuit_breaker: &CircuitBreaker,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let permit = match circuit_breaker.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Circuit breaker rejected call");
                return Err(RetryError::CircuitBreakerOpen);
            }
        };

        let result = self.execute_with_context(f).await;
        match &result {
            Ok(_) => permit.record_success(),
            Err(RetryError::MaxAttemptsExceeded { .. }) => permit.record_failure(),
            Err(RetryError::NonRetryableError(_)) | Err(RetryError::CircuitBreakerOpen) => {
                drop(permit)
            }
        }

        result
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Non-retryable error encountered
    #[error("Non-retryable error: {0}")]
    NonRetryableError(E),

    /// Circuit breaker is open
    #[error("Circuit breaker is open")]
    CircuitBreakerOpen,
}

impl<E> RetryError<E> {
    /// Get the underlying error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => Some(last_error),
            RetryError::NonRetryableError(error) => Some(error),
            RetryError::CircuitBreakerOpen => None,
        }
    }

    /// Check if this represents a circuit breaker open error
    pub fn is_circuit_breaker_open(&self) -> bool {
        matches!(self, RetryError::CircuitBreakerOpen)
    }
}
