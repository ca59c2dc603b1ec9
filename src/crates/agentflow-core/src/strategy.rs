//! Dynamic strategies: rules that grow the graph between execution rounds
//!
//! A [`DynamicStrategy`] pairs a cheap, synchronous predicate over the run
//! [`Context`] with an async generator that contributes new tasks when the
//! predicate fires. The strategy engine evaluates registered strategies after
//! every execution round, highest [`priority`](DynamicStrategy::priority)
//! first; a strategy marked [`once`](DynamicStrategy::once) generates at most
//! one time per run.
//!
//! Generator failures are logged and treated as non-firing for the step -
//! they never abort the run.
//!
//! # Examples
//!
//! ```rust
//! use agentflow_core::{DynamicStrategy, Task, TaskOutput};
//!
//! let remediate = DynamicStrategy::new(
//!     "remediate_findings",
//!     |ctx, _last| ctx.get("issues").is_some(),
//!     |ctx| {
//!         let issues = ctx.get("issues");
//!         Box::pin(async move {
//!             let mut tasks = Vec::new();
//!             if issues.is_some() {
//!                 tasks.push(
//!                     Task::new("fix", |_| async { Ok(TaskOutput::new()) }).into_ref(),
//!                 );
//!             }
//!             Ok(tasks)
//!         })
//!     },
//! )
//! .with_priority(10)
//! .once();
//! # let _ = remediate;
//! ```

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;
use crate::task::{TaskOutput, TaskRef};

/// Predicate deciding whether a strategy fires this step.
///
/// Receives the run context and the most recently completed task's output.
/// Expected to be cheap and side-effect-free.
pub type StrategyPredicate = Arc<dyn Fn(&Context, Option<&TaskOutput>) -> bool + Send + Sync>;

/// Generator producing the tasks a firing strategy contributes.
pub type StrategyGenerator = Arc<
    dyn Fn(&Context) -> BoxFuture<'static, std::result::Result<Vec<TaskRef>, BoxError>>
        + Send
        + Sync,
>;

/// A rule that may append tasks to a run between execution rounds.
#[derive(Clone)]
pub struct DynamicStrategy {
    /// Name used in logs and error reports.
    pub name: String,

    pub(crate) predicate: StrategyPredicate,
    pub(crate) generator: StrategyGenerator,

    /// Evaluation order: higher priority strategies are evaluated first.
    pub priority: i32,

    /// Whether the strategy is retired after its first successful generation.
    pub once: bool,
}

impl DynamicStrategy {
    /// Create a strategy from a predicate and a generator.
    pub fn new<P, G>(name: impl Into<String>, predicate: P, generator: G) -> Self
    where
        P: Fn(&Context, Option<&TaskOutput>) -> bool + Send + Sync + 'static,
        G: Fn(&Context) -> BoxFuture<'static, std::result::Result<Vec<TaskRef>, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            generator: Arc::new(generator),
            priority: 0,
            once: false,
        }
    }

    /// Set the evaluation priority (default 0; higher runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Retire this strategy after one successful generation.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub(crate) fn fires(&self, context: &Context, last_output: Option<&TaskOutput>) -> bool {
        (self.predicate)(context, last_output)
    }

    pub(crate) async fn generate(
        &self,
        context: &Context,
    ) -> std::result::Result<Vec<TaskRef>, BoxError> {
        (self.generator)(context).await
    }
}

impl fmt::Debug for DynamicStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicStrategy")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .finish()
    }
}
