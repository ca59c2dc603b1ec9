//! Dynamic task generation example
//!
//! A scan task reports issues; a strategy registered with
//! `on_task_complete` turns each issue into a remediation task after the
//! scan finishes. The graph grows mid-run and the new tasks are scheduled
//! by the next strategy step.
//!
//! Run with: cargo run --example dynamic_strategies

use agentflow_core::{Task, TaskOutput, WorkflowBuilder, task_output};
use serde_json::json;

#[tokio::main]
async fn main() {
    let scan = Task::new("scan", |_ctx| async move {
        println!("scanning...");
        Ok(task_output! { "issues" => json!(["sql_injection", "slow_query"]) })
    })
    .into_ref();

    let result = WorkflowBuilder::new()
        .add_task(&scan)
        .on_task_complete("scan", |output, _ctx| {
            let issues = output
                .get("issues")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();

            issues
                .iter()
                .filter_map(|issue| issue.as_str())
                .map(|issue| {
                    let label = issue.to_string();
                    Task::new(format!("fix_{}", issue), move |_ctx| {
                        let label = label.clone();
                        async move {
                            println!("fixing {}", label);
                            Ok(TaskOutput::new())
                        }
                    })
                    .into_ref()
                })
                .collect()
        })
        .build()
        .execute(json!({}))
        .await;

    println!(
        "generated {} tasks over {} steps",
        result.dynamic_tasks_generated.unwrap_or(0),
        result.total_steps.unwrap_or(0)
    );
}
