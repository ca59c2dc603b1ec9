//! Shared execution context
//!
//! One [`Context`] instance lives for the duration of a workflow run. Every
//! task reads the whole store through a snapshot and writes a patch back
//! through the engine; the engine also appends one history entry per task
//! that reaches a terminal state.
//!
//! # Dual namespace
//!
//! When a task completes, its output map is merged twice:
//!
//! - under the task's name, as the whole output object; and
//! - entry by entry, each output key becoming a top-level context key.
//!
//! Downstream tasks can therefore address output either by producer name
//! (`ctx["scan"]["issues"]`) or by field name (`ctx["issues"]`). Two tasks
//! producing the same output key overwrite each other: last writer wins.
//! Namespace deliberately if that matters.
//!
//! # Snapshots
//!
//! [`Context::get_all`] returns an owned copy of the store. Mutating the
//! returned map does **not** affect the store.
//!
//! # Concurrency
//!
//! Tasks at one level run concurrently, but the engine serializes merges in
//! completion order, so readers never observe a value mid-write. The lock is
//! never held across an await point.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::result::{TaskExecutionResult, TaskStatus};
use crate::task::{ContextSnapshot, TaskOutput};

#[derive(Debug, Default)]
struct ContextInner {
    values: ContextSnapshot,
    history: Vec<TaskExecutionResult>,
}

/// Keyed mutable store plus append-only execution history, shared by all
/// tasks in one run.
///
/// Cloning a `Context` is cheap and yields a handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<RwLock<ContextInner>>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from an initial input value.
    ///
    /// An object merges its entries as top-level keys; `null` seeds nothing;
    /// any other value is stored under the `"input"` key.
    pub fn seeded(input: Value) -> Self {
        let ctx = Self::new();
        match input {
            Value::Object(map) => {
                for (key, value) in map {
                    ctx.set(key, value);
                }
            }
            Value::Null => {}
            other => ctx.set("input", other),
        }
        ctx
    }

    /// Get a value by key (cloned).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().values.get(key).cloned()
    }

    /// Set a value, overwriting any previous value for the key.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().values.insert(key.into(), value);
    }

    /// Owned snapshot of the whole store, in insertion order.
    pub fn get_all(&self) -> ContextSnapshot {
        self.inner.read().values.clone()
    }

    /// Keys currently present, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().values.keys().cloned().collect()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.read().values.is_empty()
    }

    /// Remove all values and history.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.values.clear();
        inner.history.clear();
    }

    /// Append a task outcome to the execution history.
    pub fn append_history(&self, entry: TaskExecutionResult) {
        self.inner.write().history.push(entry);
    }

    /// The execution history so far, in completion order (cloned).
    pub fn history(&self) -> Vec<TaskExecutionResult> {
        self.inner.read().history.clone()
    }

    /// Output of the most recently completed task, if any.
    pub fn last_output(&self) -> Option<TaskOutput> {
        self.inner
            .read()
            .history
            .iter()
            .rev()
            .find(|entry| entry.status == TaskStatus::Completed)
            .and_then(|entry| entry.output.clone())
    }

    /// Merge a completed task's output under both namespaces.
    pub(crate) fn merge_output(&self, task_name: &str, output: &TaskOutput) {
        let mut inner = self.inner.write();
        inner
            .values
            .insert(task_name.to_string(), Value::Object(output.clone()));
        for (key, value) in output {
            inner.values.insert(key.clone(), value.clone());
        }
    }
}
