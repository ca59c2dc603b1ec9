//! Conditional branch resolution
//!
//! Runs immediately after a branching task completes, before anything else is
//! scheduled. The first branch whose predicate holds (declaration order)
//! selects its successor set; with no match the default successors are
//! selected; the union of every other declared successor is skipped.
//!
//! Skipping is shallow: only the directly named successors enter the skip
//! set. A task that is excluded here is skipped even when it is
//! reachable through a different, non-excluded predecessor path - callers
//! who want a task to survive branch exclusion must not name it on a
//! non-selected path. Transitive skipping falls out of the level executor's
//! predecessor check.

use std::collections::HashSet;
use uuid::Uuid;

use crate::task::TaskRef;

use super::run_state::RunState;
use super::ObserverRef;

/// Evaluate `task`'s branches against the current context and mark every
/// non-selected successor as skipped.
pub(crate) async fn resolve_branches(
    task: &TaskRef,
    state: &mut RunState,
    observer: Option<&ObserverRef>,
) {
    if !task.has_branches() {
        return;
    }

    let snapshot = state.context.get_all();

    let selected: &[TaskRef] = task
        .branches
        .iter()
        .find(|branch| (branch.predicate)(&snapshot))
        .map(|branch| branch.successors.as_slice())
        .unwrap_or(task.default_successors.as_slice());

    let selected_uids: HashSet<Uuid> = selected.iter().map(|t| t.uid()).collect();

    tracing::debug!(
        task = %task.name,
        selected = ?selected.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "branch resolved"
    );

    for successor in task.branch_successors() {
        if selected_uids.contains(&successor.uid()) || state.is_processed(successor.uid()) {
            continue;
        }
        state.record_skipped(successor);
        if let Some(obs) = observer {
            obs.on_task_skipped(successor).await;
        }
    }
}
