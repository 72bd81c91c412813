//! Resilience patterns for the Consult API client
//!
//! This crate provides the retry policy, backoff calculation and the
//! circuit breaker shared by every call of a client session.

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitMetrics,
    CircuitOpenError, CircuitState,
};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
