//! # agentflow-core - Dynamic DAG Workflow Engine
//!
//! Compose units of work into a directed acyclic graph, execute them with
//! maximal parallelism under dependency and conditional-branch constraints,
//! and let the graph **grow during execution** in response to prior task
//! outputs, context state, or strategy predicates. A second layer exposes
//! execution as a stream of typed progress/data/error events and as an
//! LLM-style text/event stream suitable for server-sent-event responses.
//!
//! ## Overview
//!
//! - **Level-parallel scheduling** - Kahn-style layering; independent tasks
//!   run concurrently, cycles fail the run before anything executes
//! - **Conditional branches** - the first matching predicate selects a path;
//!   successors on non-selected paths are skipped, transitively
//! - **Dynamic strategies** - rules evaluated between rounds that append new
//!   tasks to the running graph, bounded by a step cap
//! - **Shared context** - every task reads a snapshot of the run context and
//!   writes a patch back, exposed both under the task's name and flattened
//! - **Streaming execution** - live [`StreamChunk`] sequences, or LLM-style
//!   text/event streams with SSE and byte-stream constructors
//! - **Retries with backoff** - per-task attempt budgets, exponential
//!   backoff with jitter, per-attempt error hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use agentflow_core::{Task, WorkflowBuilder, task_output};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetch = Task::new("fetch", |_ctx| async move {
//!         Ok(task_output! { "records" => json!(42) })
//!     })
//!     .into_ref();
//!
//!     let report = Task::new("report", |ctx| async move {
//!         let records = ctx.get("records").cloned().unwrap_or(json!(0));
//!         Ok(task_output! { "summary" => json!(format!("{} records", records)) })
//!     })
//!     .with_dep(&fetch)
//!     .into_ref();
//!
//!     let workflow = WorkflowBuilder::new()
//!         .add_task(&fetch)
//!         .add_task(&report)
//!         .build();
//!
//!     let result = workflow.execute(json!({})).await;
//!     assert!(result.success);
//! }
//! ```
//!
//! ## Growing the graph at runtime
//!
//! Strategies are evaluated between execution rounds; the engine re-layers
//! the graph every step, so generated tasks schedule as soon as their
//! dependencies allow:
//!
//! ```rust
//! use agentflow_core::{Task, WorkflowBuilder, task_output};
//! use serde_json::json;
//!
//! # async fn example() {
//! let scan = Task::new("scan", |_ctx| async move {
//!     Ok(task_output! { "issues" => json!(["sec", "perf"]) })
//! })
//! .into_ref();
//!
//! let result = WorkflowBuilder::new()
//!     .add_task(&scan)
//!     .on_task_complete("scan", |output, _ctx| {
//!         output.get("issues")
//!             .and_then(|v| v.as_array())
//!             .map(|issues| {
//!                 issues.iter()
//!                     .filter_map(|i| i.as_str())
//!                     .map(|issue| {
//!                         Task::new(format!("fix_{}", issue), |_| async {
//!                             Ok(task_output! {})
//!                         })
//!                         .into_ref()
//!                     })
//!                     .collect()
//!             })
//!             .unwrap_or_default()
//!     })
//!     .build()
//!     .execute(json!({}))
//!     .await;
//!
//! assert_eq!(result.dynamic_tasks_generated, Some(2));
//! # }
//! ```
//!
//! ## Streaming
//!
//! [`WorkflowBuilder::build_streaming`] yields chunk streams;
//! [`WorkflowBuilder::build_llm_streaming`] yields text/event streams plus
//! [`SseResponse`] and byte-stream constructors. Streams are single-shot and
//! share their run with [`ResultHandle`], so observing progress never
//! double-executes.
//!
//! ## Semantics worth knowing
//!
//! - Tasks are identified by reference; names are labels. Result keys are
//!   disambiguated on collision (`audit`, `audit_1`, …).
//! - Branch skipping is shallow: a successor named on a non-selected branch
//!   is skipped outright, even if another path could reach it.
//! - Context merging is last-writer-wins across tasks that produce the same
//!   output key; namespace deliberately if that matters.

pub mod analyzer;
pub mod builder;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod llm_stream;
pub mod result;
pub mod retry;
pub mod strategy;
pub mod stream;
pub mod streaming;
pub mod task;

pub use analyzer::{analyze, ExecutionPlan};
pub use builder::WorkflowBuilder;
pub use config::{WorkflowConfig, WorkflowConfigPatch};
pub use context::Context;
pub use engine::{DynamicEngine, RunObserver, StaticEngine, WorkflowEngine};
pub use error::{BoxError, Result, WorkflowError};
pub use llm_stream::{
    ByteStream, LlmEventStream, LlmExecution, LlmStreamingWorkflow, LlmWorkflowEvent, SseResponse,
    TextStream,
};
pub use result::{TaskExecutionResult, TaskStatus, WorkflowResult};
pub use retry::RetryPolicy;
pub use strategy::DynamicStrategy;
pub use stream::{ChunkKind, StreamChunk, WORKFLOW_TASK};
pub use streaming::{ChunkStream, ResultHandle, StreamingExecution, StreamingWorkflow};
pub use task::{
    ContextSnapshot, LlmDelta, LlmDeltaStream, Task, TaskEventStream, TaskKind, TaskOutput,
    TaskRef, TaskStreamItem,
};
