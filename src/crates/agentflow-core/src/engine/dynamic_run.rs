//! Dynamic engine: the strategy step loop
//!
//! Each step re-derives the ready set from scratch (dynamically added tasks
//! can change the layering arbitrarily, so nothing is memoized), executes it
//! concurrently, then evaluates registered strategies in descending priority
//! order. Firing strategies append their generated tasks to the working set;
//! the loop continues until quiescence or the configured step cap.
//!
//! Task failures are recorded and do not stop the loop - later steps still
//! run tasks whose own predecessors succeeded. The run only fails on a
//! structural error: a stall with unprocessed tasks (cycle) or the step cap
//! with runnable work remaining.

use std::collections::HashSet;
use uuid::Uuid;

use serde_json::Value;

use crate::analyzer::{collect_closure, edge_index};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::result::WorkflowResult;
use crate::strategy::DynamicStrategy;
use crate::task::TaskRef;

use super::level::run_ready;
use super::run_state::RunState;
use super::ObserverRef;

/// Engine for workflows with registered dynamic strategies.
#[derive(Debug)]
pub struct DynamicEngine {
    tasks: Vec<TaskRef>,
    strategies: Vec<DynamicStrategy>,
    config: WorkflowConfig,
}

impl DynamicEngine {
    /// Create an engine over the given tasks and strategies.
    pub fn new(
        tasks: Vec<TaskRef>,
        strategies: Vec<DynamicStrategy>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            tasks: collect_closure(&tasks),
            strategies,
            config,
        }
    }

    /// Number of statically registered tasks (before any generation).
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of registered strategies.
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Execute the workflow to completion.
    pub async fn execute(&self, input: Value) -> WorkflowResult {
        self.execute_observed(input, None).await
    }

    /// Execute with an observer receiving live lifecycle events.
    #[tracing::instrument(
        skip(self, input, observer),
        fields(tasks = self.tasks.len(), strategies = self.strategies.len())
    )]
    pub async fn execute_observed(
        &self,
        input: Value,
        observer: Option<ObserverRef>,
    ) -> WorkflowResult {
        tracing::info!("starting dynamic workflow execution");

        let mut tasks: Vec<TaskRef> = self.tasks.clone();
        let mut state = RunState::new(input);

        if self.config.max_dynamic_steps == 0 {
            let err = WorkflowError::Configuration(
                "max_dynamic_steps must be at least 1".to_string(),
            );
            let result = state.finish(false, Some(err.to_string()), Some(0), Some(0));
            if let Some(obs) = &observer {
                obs.on_run_end(&result).await;
            }
            return result;
        }
        let mut used_strategies: HashSet<usize> = HashSet::new();
        let mut steps = 0usize;

        if let Some(obs) = &observer {
            obs.on_run_start(tasks.len()).await;
        }

        loop {
            let edges = edge_index(&tasks);

            let ready: Vec<TaskRef> = tasks
                .iter()
                .filter(|task| {
                    !state.is_processed(task.uid())
                        && edges
                            .predecessors
                            .get(&task.uid())
                            .map(|preds| preds.iter().all(|p| state.is_processed(*p)))
                            .unwrap_or(true)
                })
                .map(TaskRef::clone)
                .collect();

            if ready.is_empty() {
                break;
            }

            if let Some(obs) = &observer {
                obs.on_dynamic_step(steps + 1).await;
            }
            tracing::debug!(step = steps + 1, ready = ready.len(), "executing step");

            // Failures within a step are recorded but never stop the loop.
            let _ = run_ready(
                &ready,
                &edges,
                tasks.len(),
                &self.config,
                &mut state,
                observer.as_ref(),
            )
            .await;

            self.evaluate_strategies(&mut tasks, &mut state, &mut used_strategies)
                .await;

            steps += 1;
            if steps >= self.config.max_dynamic_steps {
                tracing::warn!(steps, "dynamic step cap reached");
                break;
            }
        }

        let fatal = self.check_remaining(&tasks, &state, steps);
        let success = fatal.is_none();
        let dynamic_tasks_generated = state.dynamic_tasks_generated;
        let result = state.finish(
            success,
            fatal.map(|e| e.to_string()),
            Some(dynamic_tasks_generated),
            Some(steps),
        );

        if success {
            tracing::info!(
                steps,
                dynamic_tasks_generated,
                execution_time_ms = result.execution_time_ms,
                "workflow completed"
            );
        } else {
            tracing::error!(error = ?result.error, "workflow failed");
        }

        if let Some(obs) = &observer {
            obs.on_run_end(&result).await;
        }
        result
    }

    /// Evaluate strategies in descending priority order; firing strategies
    /// append their generated tasks (closed over edges) to the working set.
    async fn evaluate_strategies(
        &self,
        tasks: &mut Vec<TaskRef>,
        state: &mut RunState,
        used: &mut HashSet<usize>,
    ) {
        let mut order: Vec<usize> = (0..self.strategies.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.strategies[i].priority));

        let last_output = state.context.last_output();

        for index in order {
            let strategy = &self.strategies[index];

            if strategy.once && used.contains(&index) {
                continue;
            }
            if !strategy.fires(&state.context, last_output.as_ref()) {
                continue;
            }

            match strategy.generate(&state.context).await {
                Ok(generated) => {
                    let count = generated.len();
                    state.dynamic_tasks_generated += count;
                    if strategy.once {
                        used.insert(index);
                    }
                    extend_task_set(tasks, generated);
                    tracing::info!(
                        strategy = %strategy.name,
                        generated = count,
                        "strategy generated tasks"
                    );
                }
                Err(error) => {
                    // Non-fatal: the strategy is treated as non-firing.
                    let err = WorkflowError::strategy(&strategy.name, error.to_string());
                    tracing::warn!(strategy = %strategy.name, error = %err, "strategy failed");
                }
            }
        }
    }

    /// Classify leftover tasks after loop exit: runnable leftovers at the
    /// step cap are a strategy bug (`MaxSteps`), anything else is a cycle.
    fn check_remaining(
        &self,
        tasks: &[TaskRef],
        state: &RunState,
        steps: usize,
    ) -> Option<WorkflowError> {
        let unprocessed: Vec<&TaskRef> = tasks
            .iter()
            .filter(|t| !state.is_processed(t.uid()))
            .collect();
        if unprocessed.is_empty() {
            return None;
        }

        let edges = edge_index(tasks);
        let any_runnable = unprocessed.iter().any(|t| {
            edges
                .predecessors
                .get(&t.uid())
                .map(|preds| preds.iter().all(|p| state.is_processed(*p)))
                .unwrap_or(true)
        });

        if steps >= self.config.max_dynamic_steps && any_runnable {
            Some(WorkflowError::MaxSteps { steps })
        } else {
            let names: Vec<&str> = unprocessed.iter().map(|t| t.name.as_str()).collect();
            Some(WorkflowError::cycle(format!(
                "run stalled with {} unprocessed tasks ({})",
                names.len(),
                names.join(", ")
            )))
        }
    }
}

/// Append newly generated tasks (and everything they reference) to the
/// working set, deduplicated by task identity.
fn extend_task_set(tasks: &mut Vec<TaskRef>, generated: Vec<TaskRef>) {
    let mut known: HashSet<Uuid> = tasks.iter().map(|t| t.uid()).collect();
    for task in collect_closure(&generated) {
        if known.insert(task.uid()) {
            tasks.push(task);
        }
    }
}
