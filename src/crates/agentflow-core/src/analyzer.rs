//! DAG analysis: Kahn-style topological layering
//!
//! Given the current task set, [`analyze`] produces an [`ExecutionPlan`]
//! whose levels can each run concurrently, or reports a cycle. Edges come
//! from three places:
//!
//! - a task's direct predecessor list;
//! - every branch declaration referencing a task as a successor; and
//! - every default-successor declaration referencing it.
//!
//! Each declaration contributes one indegree to the successor, so a task
//! named by two branches of the same predecessor has indegree 2 from it.
//!
//! The strategy engine re-runs analysis every step - dynamically added tasks
//! can change the layering arbitrarily, so the decomposition is never
//! memoized across steps.
//!
//! Complexity is O(V + E).

use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::task::TaskRef;

/// Level-ordered execution plan. Tasks within a level share no path and may
/// run in parallel.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Levels in execution order; each level is a set of independent tasks.
    pub levels: Vec<Vec<TaskRef>>,
}

impl ExecutionPlan {
    /// Number of levels (the height of the dependency DAG).
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Total number of tasks across all levels.
    pub fn total_tasks(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Whether the plan contains no tasks.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Width of the given level, if it exists.
    pub fn width(&self, level: usize) -> Option<usize> {
        self.levels.get(level).map(Vec::len)
    }
}

/// Dependency edges of a task set, indexed by task uid.
///
/// `predecessors` and `successors` retain declaration multiplicity: a task
/// referenced by two branch declarations of the same source appears twice.
#[derive(Debug, Default)]
pub(crate) struct EdgeIndex {
    pub predecessors: HashMap<Uuid, Vec<Uuid>>,
    pub successors: HashMap<Uuid, Vec<Uuid>>,
}

/// Build the edge index over `tasks`, ignoring edges whose endpoint is not
/// part of the set.
pub(crate) fn edge_index(tasks: &[TaskRef]) -> EdgeIndex {
    let known: HashMap<Uuid, ()> = tasks.iter().map(|t| (t.uid(), ())).collect();
    let mut index = EdgeIndex::default();

    for task in tasks {
        index.predecessors.entry(task.uid()).or_default();
        index.successors.entry(task.uid()).or_default();
    }

    for task in tasks {
        for dep in task.deps() {
            if known.contains_key(&dep.uid()) {
                index
                    .predecessors
                    .entry(task.uid())
                    .or_default()
                    .push(dep.uid());
                index
                    .successors
                    .entry(dep.uid())
                    .or_default()
                    .push(task.uid());
            }
        }
        for successor in task.branch_successors() {
            if known.contains_key(&successor.uid()) {
                index
                    .predecessors
                    .entry(successor.uid())
                    .or_default()
                    .push(task.uid());
                index
                    .successors
                    .entry(task.uid())
                    .or_default()
                    .push(successor.uid());
            }
        }
    }

    index
}

/// Layer the task set into levels, or report a cycle.
pub fn analyze(tasks: &[TaskRef]) -> Result<ExecutionPlan> {
    if tasks.is_empty() {
        return Ok(ExecutionPlan::default());
    }

    let index = edge_index(tasks);
    let by_uid: HashMap<Uuid, &TaskRef> = tasks.iter().map(|t| (t.uid(), t)).collect();

    let mut indegree: HashMap<Uuid, usize> = tasks
        .iter()
        .map(|t| {
            let degree = index.predecessors.get(&t.uid()).map_or(0, Vec::len);
            (t.uid(), degree)
        })
        .collect();

    // Seed with indegree-0 tasks, preserving insertion order within a level.
    let mut queue: VecDeque<Uuid> = tasks
        .iter()
        .filter(|t| indegree[&t.uid()] == 0)
        .map(|t| t.uid())
        .collect();

    let mut levels: Vec<Vec<TaskRef>> = Vec::new();
    let mut emitted = 0usize;

    while !queue.is_empty() {
        let mut level = Vec::with_capacity(queue.len());
        let mut next: VecDeque<Uuid> = VecDeque::new();

        while let Some(uid) = queue.pop_front() {
            level.push(TaskRef::clone(by_uid[&uid]));
            emitted += 1;

            if let Some(successors) = index.successors.get(&uid) {
                for succ in successors {
                    let degree = indegree
                        .get_mut(succ)
                        .ok_or_else(|| WorkflowError::cycle("successor missing from indegree map"))?;
                    *degree -= 1;
                    if *degree == 0 {
                        next.push_back(*succ);
                    }
                }
            }
        }

        levels.push(level);
        queue = next;
    }

    if emitted < tasks.len() {
        let stuck: Vec<&str> = tasks
            .iter()
            .filter(|t| indegree[&t.uid()] > 0)
            .map(|t| t.name.as_str())
            .collect();
        tracing::error!(unprocessed = ?stuck, "dependency cycle detected");
        return Err(WorkflowError::cycle(format!(
            "{} of {} tasks are unreachable (involved: {})",
            stuck.len(),
            tasks.len(),
            stuck.join(", ")
        )));
    }

    tracing::debug!(
        levels = levels.len(),
        tasks = emitted,
        "execution plan computed"
    );

    Ok(ExecutionPlan { levels })
}

/// Expand a task set to its closure over direct dependencies and branch
/// successors, deduplicated by uid, preserving first-seen order.
///
/// Authors typically add only root tasks and let edges pull in the rest;
/// a referenced-but-unlisted task would otherwise stall the run.
pub(crate) fn collect_closure(tasks: &[TaskRef]) -> Vec<TaskRef> {
    let mut seen: HashMap<Uuid, ()> = HashMap::new();
    let mut ordered: Vec<TaskRef> = Vec::new();
    let mut pending: VecDeque<TaskRef> = tasks.iter().map(TaskRef::clone).collect();

    while let Some(task) = pending.pop_front() {
        if seen.insert(task.uid(), ()).is_some() {
            continue;
        }
        for dep in task.deps() {
            pending.push_back(TaskRef::clone(dep));
        }
        for successor in task.branch_successors() {
            pending.push_back(TaskRef::clone(successor));
        }
        ordered.push(task);
    }

    ordered
}
