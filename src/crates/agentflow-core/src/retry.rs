//! Retry backoff between task attempts
//!
//! The level executor re-invokes a failing task body up to its attempt
//! budget, sleeping between attempts with exponential backoff and optional
//! jitter. The budget itself comes from the task or the run configuration;
//! [`RetryPolicy`] only shapes the delays.
//!
//! Defaults: 100ms initial delay, doubling per attempt, capped at 5s, with
//! up to 25% jitter. Tune per workload with the fluent setters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration applied between failed attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum execution attempts (at least 1).
    pub max_attempts: usize,

    /// Delay before the second attempt, in milliseconds.
    pub initial_interval_ms: u64,

    /// Multiplier applied per additional attempt (typically 2.0).
    pub backoff_factor: f64,

    /// Upper bound on any single delay, in milliseconds.
    pub max_interval_ms: u64,

    /// Whether to add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_interval_ms: 100,
            backoff_factor: 2.0,
            max_interval_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Set the initial delay.
    pub fn with_initial_interval_ms(mut self, ms: u64) -> Self {
        self.initial_interval_ms = ms;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the delay cap.
    pub fn with_max_interval_ms(mut self, ms: u64) -> Self {
        self.max_interval_ms = ms;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether another attempt is allowed after `attempts` tries.
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_attempts
    }

    /// Delay to sleep before the attempt following attempt number `attempt`
    /// (1-indexed).
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial_interval_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = raw.min(self.max_interval_ms as f64);

        let delayed = if self.jitter {
            use rand::Rng;
            let jitter_factor = rand::thread_rng().gen_range(0.0..0.25);
            capped * (1.0 + jitter_factor)
        } else {
            capped
        };

        Duration::from_millis(delayed as u64)
    }
}
