//! LLM-mode streaming adapter
//!
//! Wraps either engine variant and exposes execution the way LLM client
//! integrations expect: a plain text stream, a structured event stream, and
//! constructors turning those into an HTTP server-sent-events response or a
//! raw byte stream.
//!
//! - [`LlmExecution::text_stream`] forwards every delta from LLM-streaming
//!   tasks; each non-LLM task contributes a single synthetic status line
//!   `"[name] Task completed\n"` when it finishes.
//! - [`LlmExecution::full_stream`] carries [`LlmWorkflowEvent`]s: run
//!   start/end, per-task start/complete/error, every AI chunk, and a marker
//!   per dynamic step when the strategy engine drives the run.
//! - [`LlmExecution::into_http_response`] frames the full stream as SSE
//!   (`data: <json>\n\n` per event) with the standard
//!   `text/event-stream` / `no-cache` / `keep-alive` headers.
//! - [`LlmExecution::into_byte_stream`] UTF-8-encodes the text stream with
//!   no framing.
//!
//! Each stream is single-shot and all views share one execution; pick the
//! handles you need and drop the rest. With the `axum` feature enabled,
//! [`SseResponse`] implements `IntoResponse` and can be returned straight
//! from a handler.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::engine::{RunObserver, WorkflowEngine};
use crate::error::{Result, WorkflowError};
use crate::result::WorkflowResult;
use crate::streaming::ResultHandle;
use crate::task::{LlmDelta, Task, TaskOutput};

const EVENT_BUFFER: usize = 64;

/// Lazy sequence of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Lazy sequence of structured workflow events.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = LlmWorkflowEvent> + Send>>;

/// Lazy sequence of raw bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Structured event emitted on the full stream of an LLM-mode run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmWorkflowEvent {
    /// The run started with `total_tasks` tasks currently known.
    WorkflowStart {
        /// Number of tasks known at run start
        total_tasks: usize,
    },

    /// A task began executing.
    TaskStart {
        /// Task name
        task: String,
    },

    /// An LLM-streaming task produced a text chunk.
    AiChunk {
        /// Producing task name
        task: String,
        /// Text fragment
        content: String,
        /// Provider metadata, if the task attached any
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    /// A task completed.
    TaskComplete {
        /// Task name
        task: String,
    },

    /// A task failed after exhausting its attempts.
    TaskError {
        /// Task name
        task: String,
        /// Final error message
        error: String,
    },

    /// The strategy engine began a dynamic step (1-indexed).
    DynamicStep {
        /// Step number
        step: usize,
    },

    /// The run finished successfully.
    WorkflowComplete {
        /// Total wall-clock time in milliseconds
        execution_time_ms: u64,
        /// Tasks contributed by strategies, when the dynamic engine ran
        #[serde(skip_serializing_if = "Option::is_none")]
        dynamic_tasks_generated: Option<usize>,
    },

    /// The run failed with an unrecoverable error.
    WorkflowError {
        /// Fatal error message
        error: String,
    },
}

/// SSE-style HTTP response value: status, fixed headers, framed body.
///
/// Transport-agnostic - serve the parts with any HTTP stack, or enable the
/// `axum` feature and return it from a handler directly.
pub struct SseResponse {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: ByteStream,
}

impl SseResponse {
    fn new(body: ByteStream) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("content-type", "text/event-stream"),
                ("cache-control", "no-cache"),
                ("connection", "keep-alive"),
            ],
            body,
        }
    }

    /// HTTP status code (always 200; errors travel inside the stream).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &[(&'static str, &'static str)] {
        &self.headers
    }

    /// Consume the response, yielding the framed body.
    pub fn into_body(self) -> ByteStream {
        self.body
    }
}

impl std::fmt::Debug for SseResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let mut builder = axum::http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(*name, *value);
        }
        let body = axum::body::Body::from_stream(
            self.body.map(Ok::<_, std::convert::Infallible>),
        );
        builder.body(body).unwrap_or_else(|_| {
            axum::response::IntoResponse::into_response(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            )
        })
    }
}

/// One in-flight LLM-mode run: four co-produced views over a single
/// execution.
pub struct LlmExecution {
    /// Text fragments: LLM deltas plus synthetic status lines.
    pub text_stream: TextStream,

    /// Structured event sequence.
    pub full_stream: LlmEventStream,

    /// Handle resolving to the final result of the same run.
    pub result: ResultHandle,
}

impl LlmExecution {
    /// Frame the full stream as an SSE response. The text stream is dropped.
    pub fn into_http_response(self) -> SseResponse {
        let mut events = self.full_stream;
        let frames: ByteStream = Box::pin(async_stream::stream! {
            while let Some(event) = events.next().await {
                match serde_json::to_string(&event) {
                    Ok(json) => yield format!("data: {}\n\n", json).into_bytes(),
                    Err(error) => {
                        tracing::warn!(%error, "dropping unserializable stream event");
                    }
                }
            }
        });
        SseResponse::new(frames)
    }

    /// UTF-8-encode the text stream, no framing. The full stream is dropped.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(self.text_stream.map(String::into_bytes))
    }
}

/// LLM-mode streaming wrapper around a workflow engine.
pub struct LlmStreamingWorkflow {
    engine: Arc<WorkflowEngine>,
}

impl LlmStreamingWorkflow {
    /// Wrap an engine for LLM-mode streaming execution.
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Start one run and return its co-produced stream handles.
    pub fn execute_stream_llm(&self, input: Value) -> LlmExecution {
        let (text_tx, text_rx) = mpsc::channel(EVENT_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (result_tx, result_rx) = oneshot::channel();

        let observer: Arc<dyn RunObserver> = Arc::new(LlmObserver { text_tx, event_tx });
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            let result = engine.execute_observed(input, Some(observer)).await;
            let _ = result_tx.send(result);
        });

        LlmExecution {
            text_stream: Box::pin(ReceiverStream::new(text_rx)),
            full_stream: Box::pin(ReceiverStream::new(event_rx)),
            result: ResultHandle::new(result_rx),
        }
    }
}

/// Observer translating run lifecycle events into the text and event
/// streams.
struct LlmObserver {
    text_tx: mpsc::Sender<String>,
    event_tx: mpsc::Sender<LlmWorkflowEvent>,
}

impl LlmObserver {
    /// Send a text fragment. A closed consumer surfaces as
    /// [`WorkflowError::StreamClosed`]; callers discard it and the run
    /// continues.
    async fn text(&self, fragment: String) -> Result<()> {
        self.text_tx
            .send(fragment)
            .await
            .map_err(|_| WorkflowError::StreamClosed)
    }

    /// Send a structured event, with the same closed-consumer semantics as
    /// [`text`](Self::text).
    async fn event(&self, event: LlmWorkflowEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| WorkflowError::StreamClosed)
    }
}

#[async_trait]
impl RunObserver for LlmObserver {
    async fn on_run_start(&self, total_tasks: usize) {
        let _ = self
            .event(LlmWorkflowEvent::WorkflowStart { total_tasks })
            .await;
    }

    async fn on_task_start(&self, task: &Task) {
        let _ = self
            .event(LlmWorkflowEvent::TaskStart {
                task: task.name.clone(),
            })
            .await;
    }

    async fn on_llm_delta(&self, task: &Task, delta: &LlmDelta) {
        let _ = self.text(delta.text.clone()).await;
        let _ = self
            .event(LlmWorkflowEvent::AiChunk {
                task: task.name.clone(),
                content: delta.text.clone(),
                metadata: delta.metadata.clone(),
            })
            .await;
    }

    async fn on_task_completed(
        &self,
        task: &Task,
        _output: &TaskOutput,
        _completed: usize,
        _total: usize,
    ) {
        if !task.is_llm_streaming() {
            let _ = self.text(format!("[{}] Task completed\n", task.name)).await;
        }
        let _ = self
            .event(LlmWorkflowEvent::TaskComplete {
                task: task.name.clone(),
            })
            .await;
    }

    async fn on_task_failed(&self, task: &Task, error: &str) {
        let _ = self
            .event(LlmWorkflowEvent::TaskError {
                task: task.name.clone(),
                error: error.to_string(),
            })
            .await;
    }

    async fn on_dynamic_step(&self, step: usize) {
        let _ = self.event(LlmWorkflowEvent::DynamicStep { step }).await;
    }

    async fn on_run_end(&self, result: &WorkflowResult) {
        if result.success {
            let _ = self
                .event(LlmWorkflowEvent::WorkflowComplete {
                    execution_time_ms: result.execution_time_ms,
                    dynamic_tasks_generated: result.dynamic_tasks_generated,
                })
                .await;
        } else {
            let _ = self
                .event(LlmWorkflowEvent::WorkflowError {
                    error: result.error.clone().unwrap_or_else(|| "unknown".to_string()),
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LlmWorkflowEvent::AiChunk {
            task: "writer".to_string(),
            content: "hello".to_string(),
            metadata: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ai_chunk");
        assert_eq!(value["task"], "writer");
        assert_eq!(value["content"], "hello");
        assert!(value.get("metadata").is_none());
    }

    #[tokio::test]
    async fn test_sse_framing() {
        let events = vec![
            LlmWorkflowEvent::WorkflowStart { total_tasks: 1 },
            LlmWorkflowEvent::WorkflowComplete {
                execution_time_ms: 5,
                dynamic_tasks_generated: None,
            },
        ];
        let execution = LlmExecution {
            text_stream: Box::pin(futures::stream::empty()),
            full_stream: Box::pin(futures::stream::iter(events)),
            result: ResultHandle::new(tokio::sync::oneshot::channel().1),
        };

        let response = execution.into_http_response();
        assert_eq!(response.status(), 200);
        assert!(response
            .headers()
            .contains(&("content-type", "text/event-stream")));

        let frames: Vec<Vec<u8>> = response.into_body().collect().await;
        let first = String::from_utf8(frames[0].clone()).unwrap();
        assert!(first.starts_with("data: {"));
        assert!(first.ends_with("\n\n"));
        assert!(first.contains("workflow_start"));
    }

    #[tokio::test]
    async fn test_byte_stream_is_utf8_text() {
        let execution = LlmExecution {
            text_stream: Box::pin(futures::stream::iter(vec![
                "Hello ".to_string(),
                "world".to_string(),
            ])),
            full_stream: Box::pin(futures::stream::empty()),
            result: ResultHandle::new(tokio::sync::oneshot::channel().1),
        };

        let bytes: Vec<Vec<u8>> = execution.into_byte_stream().collect().await;
        let joined: Vec<u8> = bytes.concat();
        assert_eq!(String::from_utf8(joined).unwrap(), "Hello world");
    }
}
