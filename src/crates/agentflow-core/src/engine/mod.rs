//! Execution engines
//!
//! Two engine variants share one execution core:
//!
//! - [`StaticEngine`] - analyzes the task set once and runs it level by
//!   level; the first task failure ends the run after its level drains.
//! - [`DynamicEngine`] - runs the strategy step loop, re-deriving the ready
//!   set every round and growing the task set from firing strategies; task
//!   failures are recorded and peers continue.
//!
//! Both accept an optional [`RunObserver`], the seam the streaming adapters
//! plug into: every lifecycle transition of the run is reported through it
//! in real time.

mod branching;
mod dynamic_run;
mod level;
mod run_state;
mod static_run;

pub use dynamic_run::DynamicEngine;
pub use static_run::StaticEngine;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::result::WorkflowResult;
use crate::stream::StreamChunk;
use crate::task::{LlmDelta, Task, TaskOutput};

/// Receiver for run lifecycle events.
///
/// All methods default to no-ops; implement only what you need. Methods are
/// async because observers typically forward into bounded channels and must
/// be able to exert backpressure on the engine.
#[async_trait]
pub trait RunObserver: Send + Sync {
    /// The run is starting with `total_tasks` tasks currently known.
    async fn on_run_start(&self, total_tasks: usize) {
        let _ = total_tasks;
    }

    /// A task is about to execute its first attempt.
    async fn on_task_start(&self, task: &Task) {
        let _ = task;
    }

    /// An event-streaming task yielded a chunk.
    async fn on_task_chunk(&self, chunk: StreamChunk) {
        let _ = chunk;
    }

    /// An LLM-streaming task yielded a text delta.
    async fn on_llm_delta(&self, task: &Task, delta: &LlmDelta) {
        let _ = (task, delta);
    }

    /// A task completed; `completed` of `total` tasks are now done.
    async fn on_task_completed(
        &self,
        task: &Task,
        output: &TaskOutput,
        completed: usize,
        total: usize,
    ) {
        let _ = (task, output, completed, total);
    }

    /// A task failed after exhausting its attempts.
    async fn on_task_failed(&self, task: &Task, error: &str) {
        let _ = (task, error);
    }

    /// A task was skipped (branch exclusion or skipped predecessor).
    async fn on_task_skipped(&self, task: &Task) {
        let _ = task;
    }

    /// The strategy engine is beginning step `step` (1-indexed).
    async fn on_dynamic_step(&self, step: usize) {
        let _ = step;
    }

    /// The run reached its terminal state.
    async fn on_run_end(&self, result: &WorkflowResult) {
        let _ = result;
    }
}

/// Shared observer handle threaded through the engines.
pub type ObserverRef = Arc<dyn RunObserver>;

/// An executable workflow: static when no strategies were registered,
/// dynamic otherwise. Built by
/// [`WorkflowBuilder::build`](crate::WorkflowBuilder::build).
#[derive(Debug)]
pub enum WorkflowEngine {
    /// Fixed task set, level-ordered execution.
    Static(StaticEngine),

    /// Strategy-driven execution with dynamic task generation.
    Dynamic(DynamicEngine),
}

impl WorkflowEngine {
    /// Execute the workflow to completion.
    ///
    /// `input` seeds the run context: an object merges its entries as
    /// top-level keys, any other non-null value lands under `"input"`.
    /// Always returns a well-formed [`WorkflowResult`]; failures are
    /// reported through `success`/`error`, not a `Result`.
    pub async fn execute(&self, input: Value) -> WorkflowResult {
        self.execute_observed(input, None).await
    }

    /// Execute with an observer receiving live lifecycle events.
    pub async fn execute_observed(
        &self,
        input: Value,
        observer: Option<ObserverRef>,
    ) -> WorkflowResult {
        match self {
            Self::Static(engine) => engine.execute_observed(input, observer).await,
            Self::Dynamic(engine) => engine.execute_observed(input, observer).await,
        }
    }

    /// Whether this engine runs the dynamic strategy loop.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}
