//! Integration tests for complete workflow runs
//!
//! These exercise the engines end to end: linear chains, diamonds,
//! conditional branches, dynamic generation, cycle detection, retries, and
//! the boundary behaviors of the step cap.

use agentflow_core::{
    DynamicStrategy, Task, TaskOutput, TaskRef, TaskStatus, WorkflowBuilder, task_output,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn outputting(name: &str, key: &str, value: serde_json::Value) -> TaskRef {
    let key = key.to_string();
    Task::new(name, move |_ctx| {
        let key = key.clone();
        let value = value.clone();
        async move { Ok(task_output! { key => value }) }
    })
    .into_ref()
}

fn noop(name: &str) -> TaskRef {
    Task::new(name, |_ctx| async move { Ok(TaskOutput::new()) }).into_ref()
}

/// S1 - linear chain a -> b -> c, each overwriting `x`.
#[tokio::test]
async fn test_linear_chain() {
    let a = outputting("a", "x", json!(1));
    let b = Task::new("b", |_| async { Ok(task_output! { "x" => json!(2) }) })
        .with_dep(&a)
        .into_ref();
    let c = Task::new("c", |_| async { Ok(task_output! { "x" => json!(3) }) })
        .with_dep(&b)
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&a, &b, &c])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task_results.len(), 3);

    let data = result.data.unwrap();
    assert_eq!(data["a"], json!({"x": 1}));
    assert_eq!(data["b"], json!({"x": 2}));
    assert_eq!(data["c"], json!({"x": 3}));
    // Top-level key reflects the last writer.
    assert_eq!(data["x"], json!(3));
}

/// S2 - diamond a -> {b, c} -> d.
#[tokio::test]
async fn test_diamond() {
    let a = outputting("a", "a", json!("done"));
    let b = Task::new("b", |_| async { Ok(task_output! { "b" => json!("done") }) })
        .with_dep(&a)
        .into_ref();
    let c = Task::new("c", |_| async { Ok(task_output! { "c" => json!("done") }) })
        .with_dep(&a)
        .into_ref();
    let d = Task::new("d", |_| async { Ok(task_output! { "d" => json!("done") }) })
        .with_deps([&b, &c])
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&a, &b, &c, &d])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task_results.len(), 4);
    assert_eq!(result.count_with_status(TaskStatus::Completed), 4);
    for name in ["a", "b", "c", "d"] {
        assert_eq!(result.task(name).unwrap().status, TaskStatus::Completed);
    }
}

/// S3 - conditional branch selects `p`, skips `q`.
#[tokio::test]
async fn test_branch_selection_and_skip() {
    let a = outputting("a", "v", json!(10));
    let p = noop("p");
    let q = noop("q");
    let t = Task::new("t", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&a)
        .with_branch(
            |ctx| ctx.get("v").and_then(|v| v.as_i64()).unwrap_or(0) > 5,
            vec![Arc::clone(&p)],
        )
        .with_branch(
            |ctx| ctx.get("v").and_then(|v| v.as_i64()).unwrap_or(0) <= 5,
            vec![Arc::clone(&q)],
        )
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&a, &t, &p, &q])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task("p").unwrap().status, TaskStatus::Completed);
    assert_eq!(result.task("q").unwrap().status, TaskStatus::Skipped);
}

/// Skip propagation: a task depending on a skipped task is itself skipped.
#[tokio::test]
async fn test_skip_propagates_to_dependents() {
    let p = noop("p");
    let q = noop("q");
    let r = Task::new("r", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&q)
        .into_ref();
    let t = Task::new("t", |_| async { Ok(TaskOutput::new()) })
        .with_branch(|_| true, vec![Arc::clone(&p)])
        .with_branch(|_| false, vec![Arc::clone(&q)])
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&t, &p, &q, &r])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task("q").unwrap().status, TaskStatus::Skipped);
    assert_eq!(result.task("r").unwrap().status, TaskStatus::Skipped);
    assert_eq!(result.task("p").unwrap().status, TaskStatus::Completed);
}

/// S4 - dynamic generation from a completed task's output.
#[tokio::test]
async fn test_dynamic_generation_from_output() {
    let scan = Task::new("scan", |_| async {
        Ok(task_output! { "issues" => json!(["sec", "perf"]) })
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
                    Task::new(format!("{}_fix", issue), |_| async {
                        Ok(TaskOutput::new())
                    })
                    .into_ref()
                })
                .collect()
        })
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.dynamic_tasks_generated, Some(2));
    assert_eq!(result.task("sec_fix").unwrap().status, TaskStatus::Completed);
    assert_eq!(
        result.task("perf_fix").unwrap().status,
        TaskStatus::Completed
    );
}

/// S5 - cycle detection: no task executes, error mentions the cycle.
#[tokio::test]
async fn test_cycle_detection() {
    let x = noop("x");
    let y = Task::new("y", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&x)
        .with_branch(|_| true, vec![Arc::clone(&x)])
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&x, &y])
        .build()
        .execute(json!({}))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("cycle"));
    assert!(result.task_results.is_empty());
}

/// Cycle detection also holds under the strategy engine (stall check).
#[tokio::test]
async fn test_cycle_detection_dynamic() {
    let x = noop("x");
    let y = Task::new("y", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&x)
        .with_branch(|_| true, vec![Arc::clone(&x)])
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&x, &y])
        .add_dynamic_strategy(DynamicStrategy::new(
            "inert",
            |_, _| false,
            |_| Box::pin(async { Ok(Vec::new()) }),
        ))
        .build()
        .execute(json!({}))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("cycle"));
    assert!(result.task_results.is_empty());
}

/// Empty task set runs successfully and instantly.
#[tokio::test]
async fn test_empty_task_set() {
    let result = WorkflowBuilder::new().build().execute(json!({})).await;
    assert!(result.success);
    assert!(result.task_results.is_empty());
}

/// A failing task is retried per its bound and the on-error hook fires once
/// per failed attempt.
#[tokio::test]
async fn test_retries_and_error_hook() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::new(AtomicUsize::new(0));

    let hook_counter = Arc::clone(&hook_calls);
    let attempt_counter = Arc::clone(&attempts);

    let flaky = Task::new("flaky", move |_ctx| {
        let attempts = Arc::clone(&attempt_counter);
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("simulated failure".into())
        }
    })
    .with_retries(3)
    .on_error(move |_attempt, _error| {
        hook_counter.fetch_add(1, Ordering::SeqCst);
    })
    .into_ref();

    let result = WorkflowBuilder::new()
        .add_task(&flaky)
        .build()
        .execute(json!({}))
        .await;

    assert!(!result.success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.task("flaky").unwrap().status, TaskStatus::Failed);
    assert!(result.error.unwrap().contains("flaky"));
}

/// A task that fails twice then succeeds within its attempt budget
/// completes.
#[tokio::test]
async fn test_success_after_retry() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let eventually = Task::new("eventually", move |_ctx| {
        let attempts = Arc::clone(&counter);
        async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not yet".into())
            } else {
                Ok(task_output! { "ok" => json!(true) })
            }
        }
    })
    .with_retries(3)
    .into_ref();

    let result = WorkflowBuilder::new()
        .add_task(&eventually)
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        result.task("eventually").unwrap().status,
        TaskStatus::Completed
    );
}

/// The configured deadline bounds each attempt.
#[tokio::test]
async fn test_task_timeout() {
    let slow = Task::new("slow", |_ctx| async move {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        Ok(TaskOutput::new())
    })
    .into_ref();

    let result = WorkflowBuilder::new()
        .add_task(&slow)
        .with_timeout(50)
        .build()
        .execute(json!({}))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
}

/// An always-firing strategy that returns no tasks leaves outcomes
/// unchanged.
#[tokio::test]
async fn test_inert_strategy_changes_nothing() {
    let a = outputting("a", "x", json!(1));
    let b = Task::new("b", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&a)
        .into_ref();

    let plain = WorkflowBuilder::new()
        .add_tasks([&a, &b])
        .build()
        .execute(json!({}))
        .await;

    let with_strategy = WorkflowBuilder::new()
        .add_tasks([&a, &b])
        .add_dynamic_strategy(DynamicStrategy::new(
            "inert",
            |_, _| true,
            |_| Box::pin(async { Ok(Vec::new()) }),
        ))
        .build()
        .execute(json!({}))
        .await;

    assert!(plain.success);
    assert!(with_strategy.success);
    assert_eq!(with_strategy.dynamic_tasks_generated, Some(0));
    for key in plain.task_results.keys() {
        assert_eq!(
            plain.task_results[key].status,
            with_strategy.task_results[key].status
        );
    }
}

/// when_condition fires exactly once and counts its generated tasks.
#[tokio::test]
async fn test_when_condition_once() {
    let seed = noop("seed");

    let result = WorkflowBuilder::new()
        .add_task(&seed)
        .when_condition(
            |_ctx| true,
            |_ctx| vec![noop("extra_1"), noop("extra_2")],
        )
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.dynamic_tasks_generated, Some(2));
    assert_eq!(result.task("extra_1").unwrap().status, TaskStatus::Completed);
    assert_eq!(result.task("extra_2").unwrap().status, TaskStatus::Completed);
}

/// on_context_change fires when the key appears.
#[tokio::test]
async fn test_on_context_change() {
    let producer = outputting("producer", "signal", json!("ready"));

    let result = WorkflowBuilder::new()
        .add_task(&producer)
        .on_context_change("signal", |value, _ctx| {
            assert_eq!(value, &json!("ready"));
            vec![noop("reactor")]
        })
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task("reactor").unwrap().status, TaskStatus::Completed);
}

/// Step cap: an always-generating strategy runs exactly N steps.
#[tokio::test]
async fn test_step_cap() {
    let counter = Arc::new(AtomicUsize::new(0));
    let generator_counter = Arc::clone(&counter);

    let seed = noop("seed");

    let result = WorkflowBuilder::new()
        .add_task(&seed)
        .with_max_dynamic_steps(3)
        .add_dynamic_strategy(DynamicStrategy::new(
            "greedy",
            |_, _| true,
            move |_| {
                let n = generator_counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok(vec![noop(&format!("gen_{}", n))]) })
            },
        ))
        .build()
        .execute(json!({}))
        .await;

    assert_eq!(result.total_steps, Some(3));
    // The final step's generated task never ran, so the cap is an error.
    assert!(!result.success);
    assert!(result.error.unwrap().contains("step cap"));
}

/// Strategy generator errors are logged, not fatal.
#[tokio::test]
async fn test_strategy_error_is_recoverable() {
    let seed = noop("seed");

    let result = WorkflowBuilder::new()
        .add_task(&seed)
        .add_dynamic_strategy(DynamicStrategy::new(
            "broken",
            |_, _| true,
            |_| Box::pin(async { Err("generator exploded".into()) }),
        ))
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task("seed").unwrap().status, TaskStatus::Completed);
    assert_eq!(result.dynamic_tasks_generated, Some(0));
}

/// Name collisions keep history names but disambiguate result keys.
#[tokio::test]
async fn test_name_collision_disambiguation() {
    let first = noop("audit");
    let second = Task::new("audit", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&first)
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&first, &second])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.task_results.len(), 2);
    assert!(result.task("audit").is_some());
    assert!(result.task("audit_1").is_some());
    assert_eq!(result.task("audit_1").unwrap().task_name, "audit");
}

/// Re-executing the same engine yields the same outcomes for deterministic
/// tasks.
#[tokio::test]
async fn test_execution_is_repeatable() {
    let a = outputting("a", "x", json!(1));
    let b = Task::new("b", |_| async { Ok(task_output! { "y" => json!(2) }) })
        .with_dep(&a)
        .into_ref();

    let engine = WorkflowBuilder::new().add_tasks([&a, &b]).build();

    let first = engine.execute(json!({})).await;
    let second = engine.execute(json!({})).await;

    assert_eq!(first.task_results.len(), second.task_results.len());
    for (key, entry) in &first.task_results {
        assert_eq!(entry.status, second.task_results[key].status);
    }
}

/// Predecessor completion timestamps never exceed their dependents'.
#[tokio::test]
async fn test_completion_timestamps_are_ordered() {
    let a = outputting("a", "x", json!(1));
    let b = Task::new("b", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&a)
        .into_ref();
    let c = Task::new("c", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&b)
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&a, &b, &c])
        .build()
        .execute(json!({}))
        .await;

    assert!(result.success);
    let ts = |name: &str| result.task(name).unwrap().timestamp_ms;
    assert!(ts("a") <= ts("b"));
    assert!(ts("b") <= ts("c"));
}

/// In the dynamic engine, a task failure does not stop unrelated work.
#[tokio::test]
async fn test_dynamic_engine_continues_past_failures() {
    let bad = Task::new("bad", |_| async { Err("broken".into()) }).into_ref();
    let good = noop("good");
    let downstream = Task::new("downstream", |_| async { Ok(TaskOutput::new()) })
        .with_dep(&good)
        .into_ref();

    let result = WorkflowBuilder::new()
        .add_tasks([&bad, &good, &downstream])
        .add_dynamic_strategy(DynamicStrategy::new(
            "inert",
            |_, _| false,
            |_| Box::pin(async { Ok(Vec::new()) }),
        ))
        .build()
        .execute(json!({}))
        .await;

    // The failure is recorded but unrelated tasks still ran.
    assert_eq!(result.task("bad").unwrap().status, TaskStatus::Failed);
    assert_eq!(result.task("good").unwrap().status, TaskStatus::Completed);
    assert_eq!(
        result.task("downstream").unwrap().status,
        TaskStatus::Completed
    );
}

/// Context writes from failed tasks are not applied.
#[tokio::test]
async fn test_failed_task_writes_discarded() {
    let bad = Task::new("bad", |_| async {
        // Output is produced then the task fails; nothing may leak.
        Err("late failure".into())
    })
    .into_ref();
    let good = outputting("good", "kept", json!(true));

    let result = WorkflowBuilder::new()
        .add_tasks([&bad, &good])
        .add_dynamic_strategy(DynamicStrategy::new(
            "inert",
            |_, _| false,
            |_| Box::pin(async { Ok(Vec::new()) }),
        ))
        .build()
        .execute(json!({}))
        .await;

    let data = result.data.unwrap();
    assert_eq!(data.get("bad"), None);
    assert_eq!(data["kept"], json!(true));
}

/// Input seeds the context and is visible to the first task.
#[tokio::test]
async fn test_input_seeds_context() {
    let echo = Task::new("echo", |ctx| {
        let seed = ctx.get("seed").cloned().unwrap_or_default();
        async move { Ok(task_output! { "echoed" => seed }) }
    })
    .into_ref();

    let result = WorkflowBuilder::new()
        .add_task(&echo)
        .build()
        .execute(json!({"seed": "hello"}))
        .await;

    assert!(result.success);
    assert_eq!(result.data.unwrap()["echoed"], json!("hello"));
}
