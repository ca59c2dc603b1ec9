//! Execution results and per-task outcome records
//!
//! A run always produces a well-formed [`WorkflowResult`], whether it
//! succeeded or failed: a failed run carries the partial context snapshot and
//! every per-task outcome observed up to the failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;
use crate::task::TaskOutput;

/// Terminal status of a single task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The task ran to completion and its output was merged into context.
    Completed,

    /// The task failed after exhausting its attempts; its output (if any)
    /// was discarded.
    Failed,

    /// The task never ran: a predecessor was skipped, or a conditional
    /// branch excluded it.
    Skipped,
}

/// Outcome record for one task execution, appended to the run history.
///
/// `task_name` is the task's declared name even when the run contained
/// several tasks with that name; only the [`WorkflowResult::task_results`]
/// key is disambiguated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionResult {
    /// Declared task name (not disambiguated).
    pub task_name: String,

    /// Terminal status.
    pub status: TaskStatus,

    /// Output map for completed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,

    /// Final error message for failed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock execution time in milliseconds (0 for skipped tasks).
    pub duration_ms: u64,

    /// Unix timestamp (ms) at which the task reached its terminal state.
    pub timestamp_ms: i64,
}

impl TaskExecutionResult {
    /// Record a completed task.
    pub fn completed(task_name: impl Into<String>, output: TaskOutput, duration_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            status: TaskStatus::Completed,
            output: Some(output),
            error: None,
            duration_ms,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Record a failed task.
    pub fn failed(task_name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            status: TaskStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Record a skipped task.
    pub fn skipped(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            status: TaskStatus::Skipped,
            output: None,
            error: None,
            duration_ms: 0,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Final result of a workflow run.
///
/// `task_results` maps a unique key per task instance to its outcome. The key
/// is the task name, suffixed `_1`, `_2`, … on collision, so two tasks named
/// `"audit"` surface as `"audit"` and `"audit_1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Whether the run completed without an unrecoverable error.
    pub success: bool,

    /// Final context snapshot (partial on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Message of the fatal error, when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Total wall-clock run time in milliseconds.
    pub execution_time_ms: u64,

    /// Per-task outcomes keyed by disambiguated task name.
    pub task_results: HashMap<String, TaskExecutionResult>,

    /// Number of tasks contributed by dynamic strategies (strategy engine
    /// only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_tasks_generated: Option<usize>,

    /// Number of strategy-loop steps executed (strategy engine only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<usize>,
}

impl WorkflowResult {
    /// Look up a task outcome by its (disambiguated) result key.
    pub fn task(&self, key: &str) -> Option<&TaskExecutionResult> {
        self.task_results.get(key)
    }

    /// Count of tasks that reached the given status.
    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.task_results
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    /// Serialize the whole result to a JSON value.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
