//! Retry policy for node execution
//!
//! A node that returns an error is retried in place, inside the same step,
//! before the step is declared failed. Delays grow exponentially and are
//! capped; with jitter enabled each delay is scaled by a random factor in
//! `0.5..=1.5`.
//!
//! ```rust
//! use flowstate_core::RetryPolicy;
//!
//! let policy = RetryPolicy::new(4)
//!     .with_initial_interval(0.1)
//!     .with_backoff_factor(2.0)
//!     .with_jitter(false);
//!
//! assert_eq!(policy.calculate_delay(0).as_millis(), 100);
//! assert_eq!(policy.calculate_delay(2).as_millis(), 400);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,

    /// Delay before the first retry, in seconds
    pub initial_interval: f64,

    pub backoff_factor: f64,

    /// Upper bound for a single delay, in seconds
    pub max_interval: f64,

    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(1)
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt + 1` (attempt is zero-based)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_interval).max(0.0);

        let final_delay = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
