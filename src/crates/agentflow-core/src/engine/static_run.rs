//! Static engine: fixed task set, level-ordered execution

use serde_json::Value;

use crate::analyzer::{analyze, collect_closure, edge_index};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::result::WorkflowResult;
use crate::task::TaskRef;

use super::level::run_ready;
use super::run_state::RunState;
use super::ObserverRef;

/// Engine for workflows without dynamic strategies.
///
/// The dependency DAG is layered once up front; levels execute in order with
/// all tasks of a level running concurrently. A cycle fails the run before
/// any task executes. The first failing level ends the run once its peers
/// have drained.
#[derive(Debug)]
pub struct StaticEngine {
    tasks: Vec<TaskRef>,
    config: WorkflowConfig,
}

impl StaticEngine {
    /// Create an engine over the given tasks. The set is expanded to its
    /// closure over dependencies and branch successors.
    pub fn new(tasks: Vec<TaskRef>, config: WorkflowConfig) -> Self {
        Self {
            tasks: collect_closure(&tasks),
            config,
        }
    }

    /// Number of tasks in the (closed) task set.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Execute the workflow to completion.
    pub async fn execute(&self, input: Value) -> WorkflowResult {
        self.execute_observed(input, None).await
    }

    /// Execute with an observer receiving live lifecycle events.
    #[tracing::instrument(skip(self, input, observer), fields(tasks = self.tasks.len()))]
    pub async fn execute_observed(
        &self,
        input: Value,
        observer: Option<ObserverRef>,
    ) -> WorkflowResult {
        tracing::info!("starting static workflow execution");

        let mut state = RunState::new(input);
        let total = self.tasks.len();

        if let Some(obs) = &observer {
            obs.on_run_start(total).await;
        }

        let plan = match analyze(&self.tasks) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!(error = %err, "analysis failed");
                let result = state.finish(false, Some(err.to_string()), None, None);
                if let Some(obs) = &observer {
                    obs.on_run_end(&result).await;
                }
                return result;
            }
        };

        let edges = edge_index(&self.tasks);
        let mut fatal: Option<WorkflowError> = None;

        for (depth, level) in plan.levels.iter().enumerate() {
            tracing::debug!(depth, width = level.len(), "executing level");

            let failure = run_ready(
                level,
                &edges,
                total,
                &self.config,
                &mut state,
                observer.as_ref(),
            )
            .await;

            if let Some(err) = failure {
                fatal = Some(err);
                break;
            }
        }

        let success = fatal.is_none();
        let result = state.finish(success, fatal.map(|e| e.to_string()), None, None);

        if success {
            tracing::info!(
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
}
