//! Backoff strategies for retry policies

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Linear increase: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential increase: delay = initial_delay * base^attempt
    Exponential {
        /// Base for exponential calculation (e.g., 2.0 for doubling)
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { base: 2.0 }
    }
}

/// Backoff delay calculator
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    /// Create a new backoff calculator
    pub fn new(
        strategy: BackoffStrategy,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Calculate the delay before retry number `attempt` (0-indexed).
    ///
    /// The result never exceeds `max_delay`, jitter included.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped_delay = self.calculate_base_delay(attempt).min(self.max_delay);

        if self.jitter {
            self.add_jitter(capped_delay).min(self.max_delay)
        } else {
            capped_delay
        }
    }

    fn calculate_base_delay(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,

            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt.saturating_add(1)),

            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt.min(i32::MAX as u32) as i32);
                let nanos = self.initial_delay.as_nanos() as f64 * multiplier;
                if !nanos.is_finite() || nanos >= u64::MAX as f64 {
                    return self.max_delay;
                }
                Duration::from_nanos(nanos as u64)
            }
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();

        // ±20% jitter
        let jitter_factor = rng.gen_range(0.8..1.2);
        Duration::from_nanos((delay.as_nanos() as f64 * jitter_factor) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Fixed,
            Duration::from_millis(100),
            Duration::from_secs(1),
            false,
        );

        assert_eq!(calc.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(calc.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(calc.calculate_delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_backoff() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Linear,
            Duration::from_millis(100),
            Duration::from_secs(1),
            false,
        );

        assert_eq!(calc.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(calc.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(calc.calculate_delay(4), Duration::from_millis(500));
        assert_eq!(calc.calculate_delay(20), Duration::from_secs(1)); // Capped at max
    }

    #[test]
    fn test_exponential_backoff_starts_at_base() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            Duration::from_millis(1000),
            Duration::from_millis(5000),
            false,
        );

        assert_eq!(calc.calculate_delay(0), Duration::from_millis(1000));
        assert_eq!(calc.calculate_delay(1), Duration::from_millis(2000));
        assert_eq!(calc.calculate_delay(2), Duration::from_millis(4000));
        assert_eq!(calc.calculate_delay(3), Duration::from_millis(5000)); // Capped
        assert_eq!(calc.calculate_delay(40), Duration::from_millis(5000));
        assert_eq!(calc.calculate_delay(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Fixed,
            Duration::from_millis(1000),
            Duration::from_secs(10),
            true,
        );

        for _ in 0..50 {
            let delay = calc.calculate_delay(0);
            assert!(delay >= Duration::from_millis(800));
            assert!(delay <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            Duration::from_millis(1000),
            Duration::from_millis(5000),
            true,
        );

        for attempt in 0..10 {
            assert!(calc.calculate_delay(attempt) <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_strategy_serde_shape() {
        let strategy: BackoffStrategy =
            serde_json::from_str(r#"{"type":"exponential","base":1.5}"#).unwrap();
        assert_eq!(strategy, BackoffStrategy::Exponential { base: 1.5 });
        assert_eq!(BackoffStrategy::default(), BackoffStrategy::Exponential { base: 2.0 });
    }
}
