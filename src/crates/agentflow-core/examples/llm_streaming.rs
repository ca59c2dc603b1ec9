//! LLM-mode streaming example
//!
//! Simulates a token-streaming model call and prints the text stream as it
//! arrives, then the final result. A real integration would yield deltas
//! from an LLM client's stream instead of a canned list.
//!
//! Run with: cargo run --example llm_streaming

use agentflow_core::{LlmDelta, Task, WorkflowBuilder};
use futures::StreamExt;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let draft = Task::llm_streaming("draft", |_ctx| {
        let tokens = ["Once", " upon", " a", " time", "."];
        Box::pin(futures::stream::iter(
            tokens.into_iter().map(LlmDelta::text).collect::<Vec<_>>(),
        ))
    })
    .into_ref();

    let execution = WorkflowBuilder::new()
        .add_task(&draft)
        .build_llm_streaming()
        .execute_stream_llm(json!({}));

    let mut text = execution.text_stream;
    while let Some(fragment) = text.next().await {
        print!("{}", fragment);
    }
    println!();

    let result = execution.result.result().await?;
    println!("success: {}", result.success);
    Ok(())
}
