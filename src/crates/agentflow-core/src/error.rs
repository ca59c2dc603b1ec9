//! Error types for workflow construction and execution
//!
//! All errors implement `std::error::Error` via the `thiserror` crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! WorkflowError
//! ├── Cycle           - Dependency graph is not acyclic (or the run stalled)
//! ├── TaskExecution   - A task body failed after exhausting its attempts
//! ├── Timeout         - A task attempt exceeded the configured deadline
//! ├── MaxSteps        - The dynamic step cap was hit with runnable work left
//! ├── Strategy        - A dynamic strategy raised (recoverable, logged)
//! ├── Cancelled       - Execution was dropped before producing a result
//! ├── StreamClosed    - A stream consumer went away (recoverable)
//! ├── Configuration   - Invalid engine configuration
//! └── Serialization   - JSON conversion errors
//! ```
//!
//! Task bodies themselves return `Box<dyn std::error::Error + Send + Sync>`
//! (see [`BoxError`]); the engine wraps the final failure into
//! [`WorkflowError::TaskExecution`] after the retry budget is spent.

use thiserror::Error;

/// Boxed error type produced by task bodies and strategy generators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur while building or executing a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The task set contains a dependency cycle, or the run stalled with
    /// unprocessed tasks whose predecessors can never be satisfied.
    ///
    /// This is fatal: no further task executes and the run reports
    /// `success = false`.
    #[error("cycle detected in workflow: {0}")]
    Cycle(String),

    /// A task failed after exhausting its retry attempts.
    #[error("task '{task}' failed: {error}")]
    TaskExecution {
        /// Name of the task that failed
        task: String,
        /// Final error message from the last attempt
        error: String,
    },

    /// A task attempt exceeded the configured per-task deadline.
    #[error("task '{task}' timed out after {duration_ms}ms")]
    Timeout {
        /// Name of the task that timed out
        task: String,
        /// Deadline that was exceeded, in milliseconds
        duration_ms: u64,
    },

    /// The dynamic step cap was reached while tasks with satisfied
    /// dependencies were still waiting to run.
    ///
    /// This usually means a strategy keeps generating work every step;
    /// raise `max_dynamic_steps` or make the strategy converge.
    #[error("dynamic step cap reached after {steps} steps with unprocessed tasks")]
    MaxSteps {
        /// Number of steps that ran before the cap was hit
        steps: usize,
    },

    /// A dynamic strategy's generator raised an error.
    ///
    /// Strategy failures are logged and treated as non-firing for the step;
    /// they never abort the run. The variant exists so callers inspecting
    /// logs or strategy results have a typed error to match on.
    #[error("strategy '{strategy}' failed: {error}")]
    Strategy {
        /// Name of the strategy that failed
        strategy: String,
        /// Error message from the predicate or generator
        error: String,
    },

    /// Execution was cancelled: the run future backing a stream or result
    /// handle was dropped before it produced a result. In-flight tasks are
    /// cancelled with it and the run reports failure with this cause.
    #[error("workflow execution cancelled: {0}")]
    Cancelled(String),

    /// A streaming consumer closed its end of the channel; no further
    /// events can be delivered to it.
    ///
    /// Emission simply stops reaching anyone - the run itself continues, so
    /// this variant is recoverable.
    #[error("stream closed by consumer")]
    StreamClosed,

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Create a task execution error with context.
    pub fn task_execution(task: impl Into<String>, error: impl Into<String>) -> Self {
        Self::TaskExecution {
            task: task.into(),
            error: error.into(),
        }
    }

    /// Create a cycle error with a descriptive message.
    pub fn cycle(detail: impl Into<String>) -> Self {
        Self::Cycle(detail.into())
    }

    /// Create a strategy error with context.
    pub fn strategy(strategy: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            error: error.into(),
        }
    }

    /// Whether this error is fatal to the run.
    ///
    /// Strategy errors and closed stream consumers are recoverable;
    /// everything else ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Strategy { .. } | Self::StreamClosed)
    }
}
