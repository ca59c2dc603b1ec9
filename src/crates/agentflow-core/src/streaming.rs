//! Event-mode streaming adapter
//!
//! Wraps either engine variant and exposes execution as a live sequence of
//! [`StreamChunk`]s plus a [`ResultHandle`] resolving to the final
//! [`WorkflowResult`]. One call to
//! [`execute_stream`](StreamingWorkflow::execute_stream) is one run: the
//! stream is single-shot, and the result handle shares that same run, so
//! consuming both never double-executes.
//!
//! # Chunk protocol
//!
//! 1. one run-level `progress` chunk at 0%;
//! 2. per task: a `progress` chunk at task start; for event-streaming tasks
//!    every yielded chunk verbatim; for LLM-streaming tasks each delta as a
//!    `data` chunk; for plain tasks nothing until completion;
//! 3. a task-level `complete` chunk per completed task (or an `error` chunk
//!    on failure), followed by a run-level `progress` chunk with the rounded
//!    completed/total percentage;
//! 4. a terminal run-level `complete` chunk (preceded by a run-level `error`
//!    chunk when the run failed).
//!
//! # Backpressure
//!
//! Chunks flow through a bounded channel: a slow consumer slows the engine
//! rather than growing a buffer, and a dropped stream stops emission while
//! the run itself finishes and resolves the result handle. Awaiting the
//! result without either draining or dropping the stream can deadlock once
//! the buffer fills - consume the chunks or let them go.

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::engine::{RunObserver, WorkflowEngine};
use crate::error::{Result, WorkflowError};
use crate::result::WorkflowResult;
use crate::stream::{StreamChunk, WORKFLOW_TASK};
use crate::task::{LlmDelta, Task, TaskOutput};

/// Buffer size of the chunk channel; consumers further behind than this
/// stall the engine.
const CHUNK_BUFFER: usize = 64;

/// Lazy sequence of stream chunks from one run.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Resolves to the final [`WorkflowResult`] of an in-flight run.
///
/// Usable alongside stream consumption: both views share one execution.
pub struct ResultHandle {
    rx: oneshot::Receiver<WorkflowResult>,
}

impl ResultHandle {
    pub(crate) fn new(rx: oneshot::Receiver<WorkflowResult>) -> Self {
        Self { rx }
    }

    /// Wait for the run to finish and return its result.
    pub async fn result(self) -> Result<WorkflowResult> {
        self.rx.await.map_err(|_| {
            WorkflowError::Cancelled("execution dropped before completion".to_string())
        })
    }
}

/// A single in-flight streaming run: the chunk stream plus the shared
/// result handle.
pub struct StreamingExecution {
    /// Live chunk sequence (single-shot).
    pub stream: ChunkStream,

    /// Handle resolving to the final result of the same run.
    pub result: ResultHandle,
}

/// Event-mode streaming wrapper around a workflow engine.
pub struct StreamingWorkflow {
    engine: Arc<WorkflowEngine>,
}

impl StreamingWorkflow {
    /// Wrap an engine for streaming execution.
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Start one run and return its chunk stream and result handle.
    ///
    /// The run executes on a background task immediately; the returned
    /// stream paces it through the bounded channel.
    pub fn execute_stream(&self, input: Value) -> StreamingExecution {
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_BUFFER);
        let (result_tx, result_rx) = oneshot::channel();

        let observer: Arc<dyn RunObserver> = Arc::new(ChunkObserver { tx: chunk_tx });
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            let result = engine.execute_observed(input, Some(observer)).await;
            let _ = result_tx.send(result);
        });

        StreamingExecution {
            stream: Box::pin(ReceiverStream::new(chunk_rx)),
            result: ResultHandle::new(result_rx),
        }
    }
}

/// Observer translating run lifecycle events into the chunk protocol.
struct ChunkObserver {
    tx: mpsc::Sender<StreamChunk>,
}

impl ChunkObserver {
    /// Send a chunk. A closed channel (abandoned consumer) surfaces as
    /// [`WorkflowError::StreamClosed`]; callers discard it, so production
    /// simply stops reaching anyone while the run continues.
    async fn emit(&self, chunk: StreamChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| WorkflowError::StreamClosed)
    }

    fn percent(completed: usize, total: usize) -> u8 {
        if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        }
    }
}

#[async_trait]
impl RunObserver for ChunkObserver {
    async fn on_run_start(&self, _total_tasks: usize) {
        let _ = self.emit(StreamChunk::progress(WORKFLOW_TASK, 0)).await;
    }

    async fn on_task_start(&self, task: &Task) {
        let _ = self.emit(StreamChunk::progress(&task.name, 0)).await;
    }

    async fn on_task_chunk(&self, chunk: StreamChunk) {
        let _ = self.emit(chunk).await;
    }

    async fn on_llm_delta(&self, task: &Task, delta: &LlmDelta) {
        let mut chunk = StreamChunk::data(&task.name, &delta.text);
        if let Some(metadata) = &delta.metadata {
            chunk = chunk.with_metadata(metadata.clone());
        }
        let _ = self.emit(chunk).await;
    }

    async fn on_task_completed(
        &self,
        task: &Task,
        _output: &TaskOutput,
        completed: usize,
        total: usize,
    ) {
        let _ = self.emit(StreamChunk::complete(&task.name)).await;
        let _ = self
            .emit(StreamChunk::progress(
                WORKFLOW_TASK,
                Self::percent(completed, total),
            ))
            .await;
    }

    async fn on_task_failed(&self, task: &Task, error: &str) {
        let _ = self.emit(StreamChunk::error(&task.name, error)).await;
    }

    async fn on_run_end(&self, result: &WorkflowResult) {
        if !result.success {
            let message = result.error.clone().unwrap_or_else(|| "unknown".to_string());
            let _ = self.emit(StreamChunk::error(WORKFLOW_TASK, message)).await;
        }
        let _ = self.emit(StreamChunk::complete(WORKFLOW_TASK)).await;
    }
}
