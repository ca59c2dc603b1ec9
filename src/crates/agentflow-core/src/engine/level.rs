//! Concurrent execution of one level / ready set
//!
//! All runnable tasks of a round are spawned together and merged back in
//! completion order: history entries, context merges, and branch resolution
//! happen serially as each task finishes, so a task's writes are visible to
//! branch predicates and to everything scheduled later, while peers of the
//! same round never observe each other's writes.
//!
//! Failures never abort peers - the whole round is awaited and the last
//! failure is surfaced to the caller afterwards.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analyzer::EdgeIndex;
use crate::config::WorkflowConfig;
use crate::error::{BoxError, WorkflowError};
use crate::retry::RetryPolicy;
use crate::task::{ContextSnapshot, TaskKind, TaskOutput, TaskRef, TaskStreamItem};

use super::branching::resolve_branches;
use super::run_state::RunState;
use super::ObserverRef;

struct TaskRun {
    outcome: Result<TaskOutput, String>,
    duration_ms: u64,
}

/// Execute every runnable task of `ready` concurrently and merge outcomes in
/// completion order. Returns the last failure observed, if any.
pub(crate) async fn run_ready(
    ready: &[TaskRef],
    edges: &EdgeIndex,
    total: usize,
    config: &WorkflowConfig,
    state: &mut RunState,
    observer: Option<&ObserverRef>,
) -> Option<WorkflowError> {
    let snapshot = state.context.get_all();
    let mut pending = FuturesUnordered::new();

    for task in ready {
        if state.is_processed(task.uid()) {
            continue;
        }

        // A task with any skipped predecessor is itself skipped; this is how
        // skips propagate transitively through the graph.
        let pred_skipped = edges
            .predecessors
            .get(&task.uid())
            .map(|preds| preds.iter().any(|p| state.is_skipped(*p)))
            .unwrap_or(false);
        if pred_skipped {
            state.record_skipped(task);
            if let Some(obs) = observer {
                obs.on_task_skipped(task).await;
            }
            continue;
        }

        let attempts = config.attempts_for(task.retry_count);
        let handle = tokio::spawn(execute_task(
            TaskRef::clone(task),
            snapshot.clone(),
            attempts,
            config.timeout_ms,
            observer.map(Arc::clone),
        ));
        let task = TaskRef::clone(task);
        pending.push(async move { (task, handle.await) });
    }

    let mut last_failure = None;

    while let Some((task, joined)) = pending.next().await {
        let run = match joined {
            Ok(run) => run,
            Err(err) => TaskRun {
                outcome: Err(format!("task panicked: {err}")),
                duration_ms: 0,
            },
        };

        match run.outcome {
            Ok(output) => {
                state.record_completed(&task, output.clone(), run.duration_ms);
                if let Some(obs) = observer {
                    obs.on_task_completed(&task, &output, state.completed_count(), total)
                        .await;
                }
                resolve_branches(&task, state, observer).await;
            }
            Err(message) => {
                state.record_failed(&task, &message, run.duration_ms);
                if let Some(obs) = observer {
                    obs.on_task_failed(&task, &message).await;
                }
                last_failure = Some(WorkflowError::task_execution(&task.name, &message));
            }
        }
    }

    last_failure
}

/// Run one task to its terminal outcome: the retry loop for plain bodies,
/// a full drain for streaming bodies.
async fn execute_task(
    task: TaskRef,
    snapshot: ContextSnapshot,
    attempts: usize,
    timeout_ms: Option<u64>,
    observer: Option<ObserverRef>,
) -> TaskRun {
    let started = Instant::now();

    if let Some(obs) = &observer {
        obs.on_task_start(&task).await;
    }

    let outcome = match task.kind.clone() {
        TaskKind::Plain(execute) => {
            run_with_retries(&task, &execute, snapshot, attempts, timeout_ms).await
        }
        TaskKind::EventStream(produce) => {
            let mut stream = produce(snapshot);
            let mut output = TaskOutput::new();
            while let Some(item) = stream.next().await {
                match item {
                    TaskStreamItem::Chunk(chunk) => {
                        if let Some(obs) = &observer {
                            obs.on_task_chunk(chunk).await;
                        }
                    }
                    TaskStreamItem::Output(map) => {
                        output = map;
                        break;
                    }
                }
            }
            Ok(output)
        }
        TaskKind::LlmStream(produce) => {
            let mut stream = produce(snapshot);
            let mut text = String::new();
            while let Some(delta) = stream.next().await {
                if let Some(obs) = &observer {
                    obs.on_llm_delta(&task, &delta).await;
                }
                text.push_str(&delta.text);
            }
            let mut output = TaskOutput::new();
            output.insert("text".to_string(), serde_json::Value::String(text));
            Ok(output)
        }
    };

    TaskRun {
        outcome,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn run_with_retries(
    task: &TaskRef,
    execute: &crate::task::TaskExecuteFn,
    snapshot: ContextSnapshot,
    attempts: usize,
    timeout_ms: Option<u64>,
) -> Result<TaskOutput, String> {
    let policy = RetryPolicy::new(attempts);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        tracing::debug!(task = %task.name, attempt, attempts, "executing task");

        let result = match timeout_ms {
            Some(ms) => match tokio::time::timeout(
                Duration::from_millis(ms),
                execute(snapshot.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Box::new(WorkflowError::Timeout {
                    task: task.name.clone(),
                    duration_ms: ms,
                }) as BoxError),
            },
            None => execute(snapshot.clone()).await,
        };

        match result {
            Ok(output) => {
                if attempt > 1 {
                    tracing::info!(task = %task.name, attempt, "task succeeded after retry");
                }
                return Ok(output);
            }
            Err(error) => {
                if let Some(hook) = &task.on_error {
                    hook(attempt, &error);
                }
                last_error = error.to_string();

                if attempt < attempts {
                    let delay = policy.backoff_delay(attempt);
                    tracing::warn!(
                        task = %task.name,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %last_error,
                        "task attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    tracing::error!(
                        task = %task.name,
                        attempts,
                        error = %last_error,
                        "task failed after all attempts"
                    );
                }
            }
        }
    }

    Err(last_error)
}
