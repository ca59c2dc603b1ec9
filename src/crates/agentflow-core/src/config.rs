//! Engine configuration
//!
//! [`WorkflowConfig`] carries the run-wide knobs recognized by every engine
//! variant. Builders start from [`WorkflowConfig::default`] and adjust fields
//! through the fluent setters, or merge a partial [`WorkflowConfigPatch`]
//! whose unset fields leave the current values untouched.

use serde::{Deserialize, Serialize};

/// Run-wide configuration shared by all engine variants.
///
/// # Fields
///
/// - `retry_attempts` - default maximum attempts for tasks that do not carry
///   their own retry bound. A per-task bound set via
///   [`Task::with_retries`](crate::Task::with_retries) overrides this value.
/// - `timeout_ms` - optional per-task deadline. When set, each attempt is
///   raced against the deadline and a timeout counts as a failed attempt.
/// - `max_dynamic_steps` - cap on strategy-loop iterations (default 50).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Default maximum execution attempts per task (at least 1).
    pub retry_attempts: usize,

    /// Optional per-task deadline in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Maximum number of dynamic strategy-loop steps.
    pub max_dynamic_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 1,
            timeout_ms: None,
            max_dynamic_steps: 50,
        }
    }
}

impl WorkflowConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default retry attempts (clamped to at least 1).
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Set the per-task deadline in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the dynamic step cap.
    pub fn with_max_dynamic_steps(mut self, steps: usize) -> Self {
        self.max_dynamic_steps = steps;
        self
    }

    /// Merge a partial update into this configuration. Unset patch fields
    /// keep their current values.
    pub fn merge(&mut self, patch: WorkflowConfigPatch) {
        if let Some(attempts) = patch.retry_attempts {
            self.retry_attempts = attempts.max(1);
        }
        if let Some(ms) = patch.timeout_ms {
            self.timeout_ms = Some(ms);
        }
        if let Some(steps) = patch.max_dynamic_steps {
            self.max_dynamic_steps = steps;
        }
    }

    /// Resolve the attempt budget for a task, honoring a per-task override.
    pub(crate) fn attempts_for(&self, task_retries: Option<usize>) -> usize {
        task_retries.unwrap_or(self.retry_attempts).max(1)
    }
}

/// Partial configuration update. Every field is optional; `None` means
/// "leave the current value alone" when merged via
/// [`WorkflowConfig::merge`] or
/// [`WorkflowBuilder::with_config`](crate::WorkflowBuilder::with_config).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfigPatch {
    /// New default retry attempts, if set.
    pub retry_attempts: Option<usize>,

    /// New per-task deadline in milliseconds, if set.
    pub timeout_ms: Option<u64>,

    /// New dynamic step cap, if set.
    pub max_dynamic_steps: Option<usize>,
}

impl WorkflowConfigPatch {
    /// Create an empty patch that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default retry attempts.
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Set the per-task deadline in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the dynamic step cap.
    pub fn with_max_dynamic_steps(mut self, steps: usize) -> Self {
        self.max_dynamic_steps = Some(steps);
        self
    }
}
