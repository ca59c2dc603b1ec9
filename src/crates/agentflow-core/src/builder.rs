//! Fluent workflow builder
//!
//! [`WorkflowBuilder`] collects tasks, configuration, and dynamic strategies,
//! then picks the right engine variant at build time: [`build`] returns a
//! static engine when no strategies were registered and a strategy engine
//! otherwise; [`build_streaming`] and [`build_llm_streaming`] wrap the same
//! choice in a streaming adapter.
//!
//! The build methods consume the builder, so one builder produces one
//! workflow.
//!
//! [`build`]: WorkflowBuilder::build
//! [`build_streaming`]: WorkflowBuilder::build_streaming
//! [`build_llm_streaming`]: WorkflowBuilder::build_llm_streaming
//!
//! # Examples
//!
//! ```rust
//! use agentflow_core::{Task, WorkflowBuilder, task_output};
//! use serde_json::json;
//!
//! # async fn example() {
//! let scan = Task::new("scan", |_ctx| async move {
//!     Ok(task_output! { "issues" => json!(["sec"]) })
//! })
//! .into_ref();
//!
//! let workflow = WorkflowBuilder::new()
//!     .add_task(&scan)
//!     .on_task_complete("scan", |output, _ctx| {
//!         let mut fixes = Vec::new();
//!         if output.get("issues").is_some() {
//!             fixes.push(Task::new("fix", |_| async { Ok(task_output! {}) }).into_ref());
//!         }
//!         fixes
//!     })
//!     .build();
//!
//! let result = workflow.execute(json!({})).await;
//! assert!(result.success);
//! # }
//! ```

use serde_json::Value;

use crate::config::{WorkflowConfig, WorkflowConfigPatch};
use crate::context::Context;
use crate::engine::{DynamicEngine, StaticEngine, WorkflowEngine};
use crate::llm_stream::LlmStreamingWorkflow;
use crate::result::TaskStatus;
use crate::strategy::DynamicStrategy;
use crate::streaming::StreamingWorkflow;
use crate::task::{TaskOutput, TaskRef};

/// Fluent collector of tasks, configuration, and strategies.
#[derive(Default)]
pub struct WorkflowBuilder {
    tasks: Vec<TaskRef>,
    strategies: Vec<DynamicStrategy>,
    config: WorkflowConfig,
    auto_strategy_counter: usize,
}

impl WorkflowBuilder {
    /// Create an empty builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the static task set.
    pub fn add_task(mut self, task: &TaskRef) -> Self {
        self.tasks.push(TaskRef::clone(task));
        self
    }

    /// Append several tasks to the static task set.
    pub fn add_tasks<'a>(mut self, tasks: impl IntoIterator<Item = &'a TaskRef>) -> Self {
        self.tasks.extend(tasks.into_iter().map(TaskRef::clone));
        self
    }

    /// Merge a partial configuration. Fields the patch leaves unset keep
    /// their current values, so earlier setters survive a later
    /// `with_config` call.
    pub fn with_config(mut self, patch: WorkflowConfigPatch) -> Self {
        self.config.merge(patch);
        self
    }

    /// Set the default retry attempts.
    pub fn with_retry(mut self, attempts: usize) -> Self {
        self.config.retry_attempts = attempts.max(1);
        self
    }

    /// Set the per-task deadline in milliseconds.
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.config.timeout_ms = Some(ms);
        self
    }

    /// Set the dynamic step cap.
    pub fn with_max_dynamic_steps(mut self, steps: usize) -> Self {
        self.config.max_dynamic_steps = steps;
        self
    }

    /// Register a dynamic strategy.
    pub fn add_dynamic_strategy(mut self, strategy: DynamicStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Register an auto-named once-strategy firing when `condition` holds
    /// and at least one task has completed.
    pub fn when_condition<C, G>(mut self, condition: C, generator: G) -> Self
    where
        C: Fn(&Context) -> bool + Send + Sync + 'static,
        G: Fn(&Context) -> Vec<TaskRef> + Send + Sync + 'static,
    {
        self.auto_strategy_counter += 1;
        let name = format!("when_condition_{}", self.auto_strategy_counter);

        let strategy = DynamicStrategy::new(
            name,
            move |ctx, _last| {
                let any_completed = ctx
                    .history()
                    .iter()
                    .any(|entry| entry.status == TaskStatus::Completed);
                any_completed && condition(ctx)
            },
            move |ctx| {
                let tasks = generator(ctx);
                Box::pin(async move { Ok(tasks) })
            },
        )
        .once();

        self.strategies.push(strategy);
        self
    }

    /// Register a once-strategy firing when a task named `task_name` has
    /// completed; the generator receives that task's output and the context.
    pub fn on_task_complete<G>(mut self, task_name: impl Into<String>, generator: G) -> Self
    where
        G: Fn(&TaskOutput, &Context) -> Vec<TaskRef> + Send + Sync + 'static,
    {
        let task_name = task_name.into();
        let predicate_name = task_name.clone();
        let generator_name = task_name.clone();

        let strategy = DynamicStrategy::new(
            format!("on_task_complete:{}", task_name),
            move |ctx, _last| {
                ctx.history().iter().any(|entry| {
                    entry.task_name == predicate_name && entry.status == TaskStatus::Completed
                })
            },
            move |ctx| {
                let output = ctx
                    .history()
                    .iter()
                    .rev()
                    .find(|entry| {
                        entry.task_name == generator_name
                            && entry.status == TaskStatus::Completed
                    })
                    .and_then(|entry| entry.output.clone())
                    .unwrap_or_default();
                let tasks = generator(&output, ctx);
                Box::pin(async move { Ok(tasks) })
            },
        )
        .once();

        self.strategies.push(strategy);
        self
    }

    /// Register a once-strategy firing when the context key `key` has been
    /// set; the generator receives the value and the context.
    pub fn on_context_change<G>(mut self, key: impl Into<String>, generator: G) -> Self
    where
        G: Fn(&Value, &Context) -> Vec<TaskRef> + Send + Sync + 'static,
    {
        let key = key.into();
        let predicate_key = key.clone();
        let generator_key = key.clone();

        let strategy = DynamicStrategy::new(
            format!("on_context_change:{}", key),
            move |ctx, _last| ctx.get(&predicate_key).is_some(),
            move |ctx| {
                let value = ctx.get(&generator_key).unwrap_or(Value::Null);
                let tasks = generator(&value, ctx);
                Box::pin(async move { Ok(tasks) })
            },
        )
        .once();

        self.strategies.push(strategy);
        self
    }

    /// Build the engine: static when no strategies were registered, dynamic
    /// otherwise.
    pub fn build(self) -> WorkflowEngine {
        if self.strategies.is_empty() {
            WorkflowEngine::Static(StaticEngine::new(self.tasks, self.config))
        } else {
            WorkflowEngine::Dynamic(DynamicEngine::new(self.tasks, self.strategies, self.config))
        }
    }

    /// Build an event-mode streaming workflow.
    pub fn build_streaming(self) -> StreamingWorkflow {
        StreamingWorkflow::new(self.build())
    }

    /// Build an LLM-mode streaming workflow.
    pub fn build_llm_streaming(self) -> LlmStreamingWorkflow {
        LlmStreamingWorkflow::new(self.build())
    }
}
