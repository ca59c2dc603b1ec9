//! Task contract: the unit of work scheduled by the engine
//!
//! A [`Task`] couples a name, its direct predecessors, optional conditional
//! branches, a retry bound, and a body. Bodies come in three variants
//! (a sum type, not an inheritance chain):
//!
//! - **plain** - an async function from a context snapshot to an output map;
//! - **event-streaming** - a lazy sequence of [`StreamChunk`]s terminating
//!   with the output map;
//! - **LLM-streaming** - a lazy sequence of [`LlmDelta`]s; the engine
//!   accumulates the text and records `{"text": <full>}` as the output.
//!
//! Tasks are identified by **reference**, not by name: every constructed task
//! carries a unique id, and two tasks sharing a name are two distinct nodes
//! whose result keys get disambiguated (`audit`, `audit_1`, …). Tasks are
//! handed to the engine as [`TaskRef`]s (`Arc<Task>`), which is also how
//! dependency and branch edges are expressed.
//!
//! # Examples
//!
//! ```rust
//! use agentflow_core::{Task, TaskOutput};
//! use serde_json::json;
//!
//! let fetch = Task::new("fetch", |_ctx| async move {
//!     let mut out = TaskOutput::new();
//!     out.insert("status".to_string(), json!("ok"));
//!     Ok(out)
//! })
//! .into_ref();
//!
//! let parse = Task::new("parse", |ctx| async move {
//!     let status = ctx.get("status").cloned().unwrap_or_default();
//!     let mut out = TaskOutput::new();
//!     out.insert("parsed".to_string(), status);
//!     Ok(out)
//! })
//! .with_dep(&fetch)
//! .into_ref();
//! # let _ = parse;
//! ```

use futures::future::BoxFuture;
use futures::stream::Stream;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BoxError;
use crate::stream::StreamChunk;

/// Snapshot of the context store passed into task bodies and predicates.
pub type ContextSnapshot = serde_json::Map<String, Value>;

/// Output map produced by a task.
pub type TaskOutput = serde_json::Map<String, Value>;

/// Shared handle to a task; edges are expressed with these.
pub type TaskRef = Arc<Task>;

/// Async body of a plain task.
pub type TaskExecuteFn = Arc<
    dyn Fn(ContextSnapshot) -> BoxFuture<'static, std::result::Result<TaskOutput, BoxError>>
        + Send
        + Sync,
>;

/// Predicate over a context snapshot, used by conditional branches.
pub type BranchPredicate = Arc<dyn Fn(&ContextSnapshot) -> bool + Send + Sync>;

/// Hook invoked once per failed attempt with the attempt number (1-based)
/// and the attempt's error.
pub type OnErrorHook = Arc<dyn Fn(usize, &BoxError) + Send + Sync>;

/// Item yielded by an event-streaming task body.
#[derive(Debug)]
pub enum TaskStreamItem {
    /// An incremental chunk, forwarded verbatim to stream consumers.
    Chunk(StreamChunk),

    /// The terminal output map. Items after the first `Output` are ignored.
    Output(TaskOutput),
}

/// Lazy sequence produced by an event-streaming task.
pub type TaskEventStream = Pin<Box<dyn Stream<Item = TaskStreamItem> + Send>>;

/// Producer for event-streaming task bodies.
pub type EventStreamFn = Arc<dyn Fn(ContextSnapshot) -> TaskEventStream + Send + Sync>;

/// One text delta from an LLM-streaming task.
#[derive(Debug, Clone)]
pub struct LlmDelta {
    /// Text fragment (token or larger span).
    pub text: String,

    /// Optional provider metadata (model, finish reason, usage, …).
    pub metadata: Option<Value>,
}

impl LlmDelta {
    /// Create a plain text delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Lazy sequence produced by an LLM-streaming task.
pub type LlmDeltaStream = Pin<Box<dyn Stream<Item = LlmDelta> + Send>>;

/// Producer for LLM-streaming task bodies.
pub type LlmStreamFn = Arc<dyn Fn(ContextSnapshot) -> LlmDeltaStream + Send + Sync>;

/// Body variant of a task. The engine dispatches on this discriminator when
/// scheduling; a task declares exactly one variant.
#[derive(Clone)]
pub enum TaskKind {
    /// Plain async execution.
    Plain(TaskExecuteFn),

    /// Event-streaming execution (chunks + terminal output).
    EventStream(EventStreamFn),

    /// LLM-streaming execution (text deltas; output is the accumulated text).
    LlmStream(LlmStreamFn),
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Plain(_) => f.write_str("Plain"),
            TaskKind::EventStream(_) => f.write_str("EventStream"),
            TaskKind::LlmStream(_) => f.write_str("LlmStream"),
        }
    }
}

/// A conditional branch out of a task: a predicate over context plus the
/// successor set taken when the predicate is the first to hold.
#[derive(Clone)]
pub struct Branch {
    pub(crate) predicate: BranchPredicate,
    pub(crate) successors: Vec<TaskRef>,
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("predicate", &"<function>")
            .field(
                "successors",
                &self
                    .successors
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A named unit of work with dependency edges, optional conditional
/// branches, a retry bound, and one body variant.
#[derive(Clone)]
pub struct Task {
    pub(crate) uid: Uuid,

    /// Stable display name. Not required to be unique within a run.
    pub name: String,

    pub(crate) deps: Vec<TaskRef>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) default_successors: Vec<TaskRef>,
    pub(crate) retry_count: Option<usize>,
    pub(crate) on_error: Option<OnErrorHook>,
    pub(crate) kind: TaskKind,
}

impl Task {
    /// Create a plain task from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(ContextSnapshot) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<TaskOutput, BoxError>>
            + Send
            + 'static,
    {
        Self::with_kind(
            name,
            TaskKind::Plain(Arc::new(move |ctx| Box::pin(execute(ctx)))),
        )
    }

    /// Create an event-streaming task from a stream producer.
    pub fn event_streaming<F>(name: impl Into<String>, produce: F) -> Self
    where
        F: Fn(ContextSnapshot) -> TaskEventStream + Send + Sync + 'static,
    {
        Self::with_kind(name, TaskKind::EventStream(Arc::new(produce)))
    }

    /// Create an LLM-streaming task from a delta-stream producer.
    pub fn llm_streaming<F>(name: impl Into<String>, produce: F) -> Self
    where
        F: Fn(ContextSnapshot) -> LlmDeltaStream + Send + Sync + 'static,
    {
        Self::with_kind(name, TaskKind::LlmStream(Arc::new(produce)))
    }

    fn with_kind(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            deps: Vec::new(),
            branches: Vec::new(),
            default_successors: Vec::new(),
            retry_count: None,
            on_error: None,
            kind,
        }
    }

    /// Declare a direct predecessor.
    pub fn with_dep(mut self, dep: &TaskRef) -> Self {
        self.deps.push(Arc::clone(dep));
        self
    }

    /// Declare several direct predecessors.
    pub fn with_deps<'a>(mut self, deps: impl IntoIterator<Item = &'a TaskRef>) -> Self {
        self.deps.extend(deps.into_iter().map(Arc::clone));
        self
    }

    /// Append a conditional branch. Branches are evaluated in declaration
    /// order after this task completes; the first matching predicate selects
    /// its successors and every successor named by a non-selected branch is
    /// skipped outright.
    pub fn with_branch<P>(mut self, predicate: P, successors: Vec<TaskRef>) -> Self
    where
        P: Fn(&ContextSnapshot) -> bool + Send + Sync + 'static,
    {
        self.branches.push(Branch {
            predicate: Arc::new(predicate),
            successors,
        });
        self
    }

    /// Successors taken when no branch predicate holds.
    pub fn with_default_successors(mut self, successors: Vec<TaskRef>) -> Self {
        self.default_successors = successors;
        self
    }

    /// Per-task attempt bound, overriding the configured default.
    pub fn with_retries(mut self, attempts: usize) -> Self {
        self.retry_count = Some(attempts);
        self
    }

    /// Hook invoked once per failed attempt.
    pub fn on_error<H>(mut self, hook: H) -> Self
    where
        H: Fn(usize, &BoxError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Wrap into the shared handle the engine works with.
    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }

    /// Unique per-instance id (reference identity made explicit).
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// Direct predecessors.
    pub fn deps(&self) -> &[TaskRef] {
        &self.deps
    }

    /// Whether this task declares conditional branches or default successors.
    pub fn has_branches(&self) -> bool {
        !self.branches.is_empty() || !self.default_successors.is_empty()
    }

    /// Whether the body is the LLM-streaming variant.
    pub fn is_llm_streaming(&self) -> bool {
        matches!(self.kind, TaskKind::LlmStream(_))
    }

    /// Whether the body is the event-streaming variant.
    pub fn is_event_streaming(&self) -> bool {
        matches!(self.kind, TaskKind::EventStream(_))
    }

    /// Every task referenced by a branch or by the default successor set.
    pub(crate) fn branch_successors(&self) -> impl Iterator<Item = &TaskRef> {
        self.branches
            .iter()
            .flat_map(|b| b.successors.iter())
            .chain(self.default_successors.iter())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field(
                "deps",
                &self.deps.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            )
            .field("branches", &self.branches.len())
            .field("retry_count", &self.retry_count)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Build a [`TaskOutput`] from key/value pairs.
///
/// ```rust
/// use agentflow_core::task_output;
/// use serde_json::json;
///
/// let out = task_output! { "x" => json!(1), "ok" => json!(true) };
/// assert_eq!(out.get("x"), Some(&json!(1)));
/// ```
#[macro_export]
macro_rules! task_output {
    () => { $crate::TaskOutput::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut out = $crate::TaskOutput::new();
        $( out.insert($key.to_string(), $value); )+
        out
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(name: &str) -> Task {
        Task::new(name, |_ctx| async move { Ok(TaskOutput::new()) })
    }

    #[test]
    fn test_uids_are_unique_per_instance() {
        let a = noop("same");
        let b = noop("same");
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn test_dep_wiring() {
        let a = noop("a").into_ref();
        let b = noop("b").with_dep(&a).into_ref();
        assert_eq!(b.deps().len(), 1);
        assert_eq!(b.deps()[0].uid(), a.uid());
    }

    #[test]
    fn test_branch_successor_iteration() {
        let p = noop("p").into_ref();
        let q = noop("q").into_ref();
        let d = noop("d").into_ref();
        let t = noop("t")
            .with_branch(|ctx| ctx.contains_key("go"), vec![Arc::clone(&p)])
            .with_branch(|_| true, vec![Arc::clone(&q)])
            .with_default_successors(vec![Arc::clone(&d)]);

        let names: Vec<_> = t.branch_successors().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["p", "q", "d"]);
        assert!(t.has_branches());
    }

    #[test]
    fn test_kind_discriminators() {
        let plain = noop("plain");
        assert!(!plain.is_event_streaming());
        assert!(!plain.is_llm_streaming());

        let ev = Task::event_streaming("ev", |_ctx| {
            Box::pin(futures::stream::empty()) as TaskEventStream
        });
        assert!(ev.is_event_streaming());

        let llm = Task::llm_streaming("llm", |_ctx| {
            Box::pin(futures::stream::empty()) as LlmDeltaStream
        });
        assert!(llm.is_llm_streaming());
    }

    #[test]
    fn test_task_output_macro() {
        let out = task_output! { "a" => json!(1) };
        assert_eq!(out.get("a"), Some(&json!(1)));
        assert!(task_output! {}.is_empty());
    }
}
