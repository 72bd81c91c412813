//! Circuit breaker pattern implementation

use consult_config::RetryConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests are blocked
    Open,
    /// Reset timeout elapsed, a single trial request is allowed through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failed calls before opening the circuit
    pub failure_threshold: u32,

    /// Time an open circuit rejects calls before admitting a trial
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for CircuitBreakerConfig {
    fn from(config: &RetryConfig) -> Self {
        Self {
            failure_threshold: config.max_failures,
            reset_timeout: config.reset_timeout,
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Clone, Default)]
pub struct CircuitMetrics {
    /// Number of calls recorded as successful
    pub total_successes: u64,
    /// Number of calls recorded as failed
    pub total_failures: u64,
    /// Number of calls rejected due to open circuit
    pub total_rejected: u64,
    /// Number of times the circuit has opened
    pub times_opened: u64,
    /// Current consecutive failures
    pub consecutive_failures: u32,
    /// Last failure time
    pub last_failure_time: Option<Instant>,
    /// Last state change time
    pub last_state_change: Option<Instant>,
}

/// Returned when the circuit refuses to admit a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker is open")]
pub struct CircuitOpenError {
    /// When the breaker will admit its next trial call, if known
    pub reopens_at: Option<Instant>,
}

/// Thread-safe circuit breaker shared by every call of a session
#[derive(Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

struct CircuitBreakerState {
    state: CircuitState,
    metrics: CircuitMetrics,
    reopens_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                metrics: CircuitMetrics::default(),
                reopens_at: None,
                trial_in_flight: false,
            })),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call issued now would be rejected
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        match state.state {
            CircuitState::Open => true,
            CircuitState::HalfOpen => state.trial_in_flight,
            CircuitState::Closed => false,
        }
    }

    /// Get the current state
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.update_state(&mut state);
        state.state
    }

    /// Consecutive failures counted so far
    pub fn failure_count(&self) -> u32 {
        self.state.lock().metrics.consecutive_failures
    }

    /// When an open circuit will admit its trial call
    pub fn reopens_at(&self) -> Option<Instant> {
        self.state.lock().reopens_at
    }

    /// Ask the breaker to admit a call.
    ///
    /// Closed admits everything. HalfOpen admits exactly one trial until
    /// that trial settles. Open rejects until `reopens_at`.
    pub fn try_acquire(&self) -> Result<CallPermit, CircuitOpenError> {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        match state.state {
            CircuitState::Closed => Ok(CallPermit::new(self.clone(), false)),
            CircuitState::HalfOpen if !state.trial_in_flight => {
                state.trial_in_flight = true;
                log::debug!("Circuit breaker admitting half-open trial call");
                Ok(CallPermit::new(self.clone(), true))
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                state.metrics.total_rejected += 1;
                Err(CircuitOpenError {
                    reopens_at: state.reopens_at,
                })
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        self.update_state(&mut state);
        self.apply_success(&mut state);
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        self.update_state(&mut state);
        self.apply_failure(&mut state);
    }

    /// Record a rejected request (due to open circuit)
    pub fn record_rejection(&self) {
        let mut state = self.state.lock();
        state.metrics.total_rejected += 1;
    }

    /// Get current metrics
    pub fn metrics(&self) -> CircuitMetrics {
        let state = self.state.lock();
        state.metrics.clone()
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.state = CircuitState::Closed;
        state.metrics = CircuitMetrics::default();
        state.reopens_at = None;
        state.trial_in_flight = false;
        state.metrics.last_state_change = Some(Instant::now());
    }

    // Internal methods

    fn update_state(&self, state: &mut CircuitBreakerState) {
        if state.state == CircuitState::Open {
            if let Some(reopens_at) = state.reopens_at {
                if Instant::now() >= reopens_at {
                    self.transition_to_half_open(state);
                }
            }
        }
    }

    fn apply_success(&self, state: &mut CircuitBreakerState) {
        state.metrics.total_successes += 1;
        state.metrics.consecutive_failures = 0;

        if state.state == CircuitState::HalfOpen {
            self.transition_to_closed(state);
        }
    }

    fn apply_failure(&self, state: &mut CircuitBreakerState) {
        let now = Instant::now();
        state.metrics.total_failures += 1;
        state.metrics.consecutive_failures = state.metrics.consecutive_failures.saturating_add(1);
        state.metrics.last_failure_time = Some(now);

        match state.state {
            CircuitState::Closed => {
                if state.metrics.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(state);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to_open(state);
            }
            CircuitState::Open => {}
        }
    }

    /// Settle a permit. Outcomes of calls admitted before the circuit
    /// opened only touch the counters, never the state.
    fn settle(&self, trial: bool, success: Option<bool>) {
        let mut state = self.state.lock();
        self.update_state(&mut state);

        if trial {
            state.trial_in_flight = false;
        }

        let Some(success) = success else {
            return;
        };

        if trial || state.state == CircuitState::Closed {
            if success {
                self.apply_success(&mut state);
            } else {
                self.apply_failure(&mut state);
            }
        } else if success {
            state.metrics.total_successes += 1;
        } else {
            state.metrics.total_failures += 1;
            state.metrics.last_failure_time = Some(Instant::now());
        }
    }

    fn transition_to_open(&self, state: &mut CircuitBreakerState) {
        let now = Instant::now();
        state.state = CircuitState::Open;
        state.reopens_at = Some(now + self.config.reset_timeout);
        state.trial_in_flight = false;
        state.metrics.times_opened += 1;
        state.metrics.last_state_change = Some(now);
        log::warn!(
            "Circuit breaker opened after {} consecutive failures; retrying in {:?}",
            state.metrics.consecutive_failures,
            self.config.reset_timeout
        );
    }

    fn transition_to_closed(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::Closed;
        state.metrics.consecutive_failures = 0;
        state.reopens_at = None;
        state.trial_in_flight = false;
        state.metrics.last_state_change = Some(Instant::now());
        log::info!("Circuit breaker closed after successful recovery");
    }

    fn transition_to_half_open(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::HalfOpen;
        state.trial_in_flight = false;
        state.metrics.last_state_change = Some(Instant::now());
        log::info!("Circuit breaker transitioned to half-open state");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("state", &state.state)
            .field("failure_count", &state.metrics.consecutive_failures)
            .field("reopens_at", &state.reopens_at)
            .finish()
    }
}

/// Admission ticket for one call.
///
/// Dropping a permit without recording an outcome (e.g. the call was
/// cancelled) leaves the counters untouched and frees the half-open trial
/// slot.
#[must_use = "a permit must be settled with record_success or record_failure"]
pub struct CallPermit {
    breaker: CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    fn new(breaker: CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this permit is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// The call succeeded
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle(self.trial, Some(true));
    }

    /// The call failed with an infrastructure failure
    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.settle(self.trial, Some(false));
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.trial, None);
        }
    }
}

/// Builder for circuit breaker configuration
pub struct CircuitBreakerBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
        }
    }

    /// Set failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set timeout before attempting recovery
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.config)
    }
}

impl Default for CircuitBreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
