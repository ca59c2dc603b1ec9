//! Streaming contract tests
//!
//! Verifies the event-mode chunk protocol, pass-through of event-streaming
//! task chunks, LLM-mode text/event streams, SSE framing, and the shared
//! result handle.

use agentflow_core::{
    ChunkKind, LlmDelta, LlmWorkflowEvent, StreamChunk, Task, TaskOutput, TaskRef, TaskStreamItem,
    WorkflowBuilder, task_output, WORKFLOW_TASK,
};
use futures::StreamExt;
use serde_json::json;

fn chunky(name: &str, chunks: usize) -> TaskRef {
    let name_owned = name.to_string();
    Task::event_streaming(name, move |_ctx| {
        let name = name_owned.clone();
        Box::pin(async_stream::stream! {
            for i in 0..chunks {
                yield TaskStreamItem::Chunk(StreamChunk::data(
                    &name,
                    format!("{}-chunk-{}", name, i),
                ));
            }
            yield TaskStreamItem::Output(task_output! { "chunks" => json!(chunks) });
        })
    })
    .into_ref()
}

/// S6 - two event-streaming tasks, three data chunks each.
#[tokio::test]
async fn test_event_stream_contract() {
    let first = chunky("first", 3);
    let second = chunky("second", 3);

    let streaming = WorkflowBuilder::new()
        .add_tasks([&first, &second])
        .build_streaming();

    let execution = streaming.execute_stream(json!({}));
    let chunks: Vec<StreamChunk> = execution.stream.collect().await;

    // Starts with a run-level progress chunk at 0%.
    assert_eq!(chunks[0].kind, ChunkKind::Progress);
    assert_eq!(chunks[0].task_name, WORKFLOW_TASK);
    assert_eq!(chunks[0].progress, Some(0));

    // All six data chunks arrive, in per-task order.
    for name in ["first", "second"] {
        let data: Vec<&StreamChunk> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Data && c.task_name == name)
            .collect();
        assert_eq!(data.len(), 3);
        for (i, chunk) in data.iter().enumerate() {
            assert_eq!(
                chunk.content.as_deref(),
                Some(format!("{}-chunk-{}", name, i).as_str())
            );
        }
    }

    // One task-level complete chunk per task.
    let task_completes = chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Complete && c.task_name != WORKFLOW_TASK)
        .count();
    assert_eq!(task_completes, 2);

    // Run-level progress rises monotonically to 100.
    let progress: Vec<u8> = chunks
        .iter()
        .filter(|c| c.is_workflow_level() && c.kind == ChunkKind::Progress)
        .filter_map(|c| c.progress)
        .collect();
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    // Ends with a run-level complete chunk.
    let last = chunks.last().unwrap();
    assert_eq!(last.kind, ChunkKind::Complete);
    assert_eq!(last.task_name, WORKFLOW_TASK);

    // The shared handle resolves to the same run's result.
    let result = execution.result.result().await.unwrap();
    assert!(result.success);
    assert_eq!(result.task_results.len(), 2);
}

/// Plain tasks emit no data chunks, only start/complete markers.
#[tokio::test]
async fn test_plain_task_output_suppressed() {
    let quiet = Task::new("quiet", |_| async {
        Ok(task_output! { "hidden" => json!(true) })
    })
    .into_ref();

    let execution = WorkflowBuilder::new()
        .add_task(&quiet)
        .build_streaming()
        .execute_stream(json!({}));

    let chunks: Vec<StreamChunk> = execution.stream.collect().await;

    assert!(chunks.iter().all(|c| c.kind != ChunkKind::Data));
    let completes = chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Complete && c.task_name == "quiet")
        .count();
    assert_eq!(completes, 1);
}

/// A failing task surfaces an error chunk and the stream still terminates
/// with a run-level complete chunk.
#[tokio::test]
async fn test_error_chunks_on_failure() {
    let bad = Task::new("bad", |_| async { Err("exploded".into()) }).into_ref();

    let execution = WorkflowBuilder::new()
        .add_task(&bad)
        .build_streaming()
        .execute_stream(json!({}));

    let chunks: Vec<StreamChunk> = execution.stream.collect().await;

    let task_error = chunks
        .iter()
        .find(|c| c.kind == ChunkKind::Error && c.task_name == "bad")
        .expect("task error chunk");
    assert_eq!(task_error.content.as_deref(), Some("exploded"));

    // Run-level error chunk, then the terminal complete chunk.
    assert!(chunks
        .iter()
        .any(|c| c.kind == ChunkKind::Error && c.is_workflow_level()));
    let last = chunks.last().unwrap();
    assert_eq!(last.kind, ChunkKind::Complete);
    assert!(last.is_workflow_level());

    let result = execution.result.result().await.unwrap();
    assert!(!result.success);
}

/// An abandoned consumer stops emission without killing the run.
#[tokio::test]
async fn test_abandoned_stream_still_completes() {
    let a = Task::new("a", |_| async { Ok(task_output! { "x" => json!(1) }) }).into_ref();
    let b = Task::new("b", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&a)
        .into_ref();

    let execution = WorkflowBuilder::new()
        .add_tasks([&a, &b])
        .build_streaming()
        .execute_stream(json!({}));

    let mut stream = execution.stream;
    let first = stream.next().await;
    assert!(first.is_some());
    drop(stream);

    let result = execution.result.result().await.unwrap();
    assert!(result.success);
    assert_eq!(result.task_results.len(), 2);
}

/// Streaming works over the strategy engine too, covering generated tasks.
#[tokio::test]
async fn test_streaming_with_dynamic_tasks() {
    let seed = Task::new("seed", |_| async {
        Ok(task_output! { "go" => json!(true) })
    })
    .into_ref();

    let execution = WorkflowBuilder::new()
        .add_task(&seed)
        .on_context_change("go", |_value, _ctx| {
            vec![Task::new("follow_up", |_| async { Ok(TaskOutput::new()) }).into_ref()]
        })
        .build_streaming()
        .execute_stream(json!({}));

    let chunks: Vec<StreamChunk> = execution.stream.collect().await;
    assert!(chunks
        .iter()
        .any(|c| c.task_name == "follow_up" && c.kind == ChunkKind::Complete));

    let result = execution.result.result().await.unwrap();
    assert!(result.success);
    assert_eq!(result.dynamic_tasks_generated, Some(1));
}

/// LLM mode: deltas feed the text stream, other tasks contribute status
/// lines, and the full stream carries the structured protocol.
#[tokio::test]
async fn test_llm_mode_streams() {
    let writer = Task::llm_streaming("writer", |_ctx| {
        Box::pin(futures::stream::iter(vec![
            LlmDelta::text("Hello"),
            LlmDelta::text(" world").with_metadata(json!({"model": "demo"})),
        ]))
    })
    .into_ref();

    let summarize = Task::new("summarize", |ctx| {
        let text = ctx.get("text").cloned().unwrap_or_default();
        async move { Ok(task_output! { "summary" => text }) }
    })
    .with_dep(&writer)
    .into_ref();

    let execution = WorkflowBuilder::new()
        .add_tasks([&writer, &summarize])
        .build_llm_streaming()
        .execute_stream_llm(json!({}));

    let text: Vec<String> = execution.text_stream.collect().await;
    assert_eq!(
        text,
        vec![
            "Hello".to_string(),
            " world".to_string(),
            "[summarize] Task completed\n".to_string(),
        ]
    );

    let events: Vec<LlmWorkflowEvent> = execution.full_stream.collect().await;
    assert!(matches!(
        events.first(),
        Some(LlmWorkflowEvent::WorkflowStart { total_tasks: 2 })
    ));
    let ai_chunks: Vec<&LlmWorkflowEvent> = events
        .iter()
        .filter(|e| matches!(e, LlmWorkflowEvent::AiChunk { .. }))
        .collect();
    assert_eq!(ai_chunks.len(), 2);
    assert!(matches!(
        ai_chunks[1],
        LlmWorkflowEvent::AiChunk {
            metadata: Some(_),
            ..
        }
    ));
    assert!(matches!(
        events.last(),
        Some(LlmWorkflowEvent::WorkflowComplete { .. })
    ));

    // The accumulated LLM text was merged into context for downstream tasks.
    let result = execution.result.result().await.unwrap();
    assert!(result.success);
    assert_eq!(result.data.unwrap()["summary"], json!("Hello world"));
}

/// LLM mode over the strategy engine emits dynamic step markers.
#[tokio::test]
async fn test_llm_mode_dynamic_step_markers() {
    let seed = Task::new("seed", |_| async { Ok(task_output! { "k" => json!(1) }) }).into_ref();

    let execution = WorkflowBuilder::new()
        .add_task(&seed)
        .on_context_change("k", |_, _| {
            vec![Task::new("next", |_| async { Ok(TaskOutput::new()) }).into_ref()]
        })
        .build_llm_streaming()
        .execute_stream_llm(json!({}));

    let events: Vec<LlmWorkflowEvent> = execution.full_stream.collect().await;
    let steps: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            LlmWorkflowEvent::DynamicStep { step } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(steps, vec![1, 2]);
}

/// SSE framing carries every full-stream event as a `data:` line.
#[tokio::test]
async fn test_sse_response_framing() {
    let only = Task::new("only", |_| async { Ok(TaskOutput::new()) }).into_ref();

    let response = WorkflowBuilder::new()
        .add_task(&only)
        .build_llm_streaming()
        .execute_stream_llm(json!({}))
        .into_http_response();

    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .contains(&("content-type", "text/event-stream")));
    assert!(response.headers().contains(&("cache-control", "no-cache")));
    assert!(response.headers().contains(&("connection", "keep-alive")));

    let frames: Vec<Vec<u8>> = response.into_body().collect().await;
    assert!(!frames.is_empty());
    for frame in &frames {
        let text = String::from_utf8(frame.clone()).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));
        let payload: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert!(payload["type"].is_string());
    }

    let last = String::from_utf8(frames.last().unwrap().clone()).unwrap();
    assert!(last.contains("workflow_complete"));
}

/// Byte stream is the UTF-8 text stream with no framing.
#[tokio::test]
async fn test_byte_stream() {
    let speaker = Task::llm_streaming("speaker", |_ctx| {
        Box::pin(futures::stream::iter(vec![
            LlmDelta::text("abc"),
            LlmDelta::text("def"),
        ]))
    })
    .into_ref();

    let bytes: Vec<Vec<u8>> = WorkflowBuilder::new()
        .add_task(&speaker)
        .build_llm_streaming()
        .execute_stream_llm(json!({}))
        .into_byte_stream()
        .collect()
        .await;

    let joined = String::from_utf8(bytes.concat()).unwrap();
    assert_eq!(joined, "abcdef");
}
