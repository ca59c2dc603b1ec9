//! Typed chunks emitted by the event-mode streaming adapter
//!
//! A [`StreamChunk`] is the unit of emission from
//! [`StreamingWorkflow::execute_stream`](crate::StreamingWorkflow::execute_stream):
//! a tagged event carrying the producing task's name, optional content and
//! progress, a timestamp, and free-form metadata.
//!
//! Run-level chunks use the reserved task name [`WORKFLOW_TASK`]. Ordering
//! within one task is the order the task yielded; across tasks, chunks
//! interleave by real-time completion rather than logical level order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved task name used by run-level chunks.
pub const WORKFLOW_TASK: &str = "workflow";

/// Discriminator for [`StreamChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Progress update (0..=100).
    Progress,

    /// Incremental payload produced by an event-streaming task.
    Data,

    /// A task or the run failed.
    Error,

    /// A task or the run finished.
    Complete,
}

/// One event in the live execution stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Kind of event.
    pub kind: ChunkKind,

    /// Name of the producing task, or [`WORKFLOW_TASK`] for run-level events.
    pub task_name: String,

    /// Optional textual payload (data content or error message).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Optional completion percentage, clamped to 0..=100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    /// Unix timestamp (ms) at emission.
    pub timestamp_ms: i64,

    /// Free-form metadata attached by the producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl StreamChunk {
    fn new(kind: ChunkKind, task_name: impl Into<String>) -> Self {
        Self {
            kind,
            task_name: task_name.into(),
            content: None,
            progress: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            metadata: None,
        }
    }

    /// Create a progress chunk.
    pub fn progress(task_name: impl Into<String>, progress: u8) -> Self {
        Self::new(ChunkKind::Progress, task_name).with_progress(progress)
    }

    /// Create a data chunk with content.
    pub fn data(task_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(ChunkKind::Data, task_name).with_content(content)
    }

    /// Create an error chunk with a message.
    pub fn error(task_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ChunkKind::Error, task_name).with_content(message)
    }

    /// Create a completion chunk.
    pub fn complete(task_name: impl Into<String>) -> Self {
        Self::new(ChunkKind::Complete, task_name)
    }

    /// Set the textual payload.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the progress percentage (clamped to 0..=100).
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this is a run-level chunk.
    pub fn is_workflow_level(&self) -> bool {
        self.task_name == WORKFLOW_TASK
    }
}
