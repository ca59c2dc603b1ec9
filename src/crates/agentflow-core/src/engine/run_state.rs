//! Per-run bookkeeping shared by both engines

use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

use crate::context::Context;
use crate::result::{TaskExecutionResult, WorkflowResult};
use crate::task::{TaskOutput, TaskRef};

/// Mutable state of one workflow run: the shared context, per-task terminal
/// statuses, and the disambiguated result map.
pub(crate) struct RunState {
    pub context: Context,
    completed: HashSet<Uuid>,
    failed: HashSet<Uuid>,
    skipped: HashSet<Uuid>,
    task_results: HashMap<String, TaskExecutionResult>,
    name_counts: HashMap<String, usize>,
    pub dynamic_tasks_generated: usize,
    started: Instant,
}

impl RunState {
    pub fn new(input: serde_json::Value) -> Self {
        Self {
            context: Context::seeded(input),
            completed: HashSet::new(),
            failed: HashSet::new(),
            skipped: HashSet::new(),
            task_results: HashMap::new(),
            name_counts: HashMap::new(),
            dynamic_tasks_generated: 0,
            started: Instant::now(),
        }
    }

    /// Whether the task reached any terminal state.
    pub fn is_processed(&self, uid: Uuid) -> bool {
        self.completed.contains(&uid) || self.failed.contains(&uid) || self.skipped.contains(&uid)
    }

    pub fn is_skipped(&self, uid: Uuid) -> bool {
        self.skipped.contains(&uid)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Record a completed task: merge its output into context under both
    /// namespaces, then append history and the disambiguated result entry.
    pub fn record_completed(&mut self, task: &TaskRef, output: TaskOutput, duration_ms: u64) {
        self.completed.insert(task.uid());
        self.context.merge_output(&task.name, &output);

        let entry = TaskExecutionResult::completed(&task.name, output, duration_ms);
        self.push_entry(&task.name, entry);

        tracing::debug!(task = %task.name, duration_ms, "task completed");
    }

    /// Record a failed task. Its output, if any, is not applied to context.
    pub fn record_failed(&mut self, task: &TaskRef, error: &str, duration_ms: u64) {
        self.failed.insert(task.uid());

        let entry = TaskExecutionResult::failed(&task.name, error, duration_ms);
        self.push_entry(&task.name, entry);

        tracing::warn!(task = %task.name, error, "task failed");
    }

    /// Record a skipped task (branch exclusion or skipped predecessor).
    pub fn record_skipped(&mut self, task: &TaskRef) {
        self.skipped.insert(task.uid());

        let entry = TaskExecutionResult::skipped(&task.name);
        self.push_entry(&task.name, entry);

        tracing::debug!(task = %task.name, "task skipped");
    }

    fn push_entry(&mut self, name: &str, entry: TaskExecutionResult) {
        self.context.append_history(entry.clone());
        let key = self.result_key(name);
        self.task_results.insert(key, entry);
    }

    /// Unique result-map key for a task name: the name itself, then
    /// `name_1`, `name_2`, … on collision.
    fn result_key(&mut self, name: &str) -> String {
        let count = self.name_counts.entry(name.to_string()).or_insert(0);
        let key = if *count == 0 {
            name.to_string()
        } else {
            format!("{}_{}", name, count)
        };
        *count += 1;
        key
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Assemble the terminal [`WorkflowResult`].
    pub fn finish(
        self,
        success: bool,
        error: Option<String>,
        dynamic_tasks_generated: Option<usize>,
        total_steps: Option<usize>,
    ) -> WorkflowResult {
        let execution_time_ms = self.elapsed_ms();
        WorkflowResult {
            success,
            data: Some(serde_json::Value::Object(self.context.get_all())),
            error,
            execution_time_ms,
            task_results: self.task_results,
            dynamic_tasks_generated,
            total_steps,
        }
    }
}
