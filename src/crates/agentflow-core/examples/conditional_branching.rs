//! Conditional branching example
//!
//! A triage task inspects its input and routes to exactly one of two
//! remediation paths; the other path (and everything depending on it) is
//! skipped.
//!
//! Run with: cargo run --example conditional_branching

use agentflow_core::{Task, TaskOutput, WorkflowBuilder, task_output};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let assess = Task::new("assess", |ctx| {
        let severity = ctx
            .get("severity")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        async move { Ok(task_output! { "score" => json!(severity * 10) }) }
    })
    .into_ref();

    let escalate = Task::new("escalate", |_ctx| async move {
        println!("escalating to on-call");
        Ok(task_output! { "handled_by" => json!("on-call") })
    })
    .into_ref();

    let auto_resolve = Task::new("auto_resolve", |_ctx| async move {
        println!("auto-resolving");
        Ok(task_output! { "handled_by" => json!("bot") })
    })
    .into_ref();

    let notify = Task::new("notify", |ctx| {
        let handler = ctx.get("handled_by").cloned().unwrap_or_default();
        async move {
            println!("notifying reporter, handled by {}", handler);
            Ok(TaskOutput::new())
        }
    })
    .with_dep(&escalate)
    .into_ref();

    let triage = Task::new("triage", |_ctx| async move { Ok(TaskOutput::new()) })
        .with_dep(&assess)
        .with_branch(
            |ctx| ctx.get("score").and_then(|v| v.as_i64()).unwrap_or(0) >= 50,
            vec![Arc::clone(&escalate)],
        )
        .with_default_successors(vec![Arc::clone(&auto_resolve)])
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&assess, &triage, &escalate, &auto_resolve, &notify])
        .build()
        .execute(json!({"severity": 7}))
        .await;

    println!("success: {}", result.success);
    for (key, outcome) in &result.task_results {
        println!("  {:<14} {:?}", key, outcome.status);
    }
}
