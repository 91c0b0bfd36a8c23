//! Mutation primitives for the task graph: creation, insertion, and the
//! state-machine transitions (spec §4.3.1, §4.3.3, §4.3.4).
//!
//! Every mutator here is value-returning: it takes a `&TaskGraph` and
//! returns a new one, never mutating its argument in place. This is the
//! "fully value-returning" policy spec §9 asks implementations to commit
//! to (the source's alternative -- mutate-in-place row saves -- is
//! explicitly flagged as inconsistent and not followed here).

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::errors::ValidationError;
use super::limits::GraphLimits;
use super::task::{CreateTaskInput, Task, TaskStatus, TaskType};

/// A session's task graph: tasks keyed by id. Root membership is derived
/// (`parent_id.is_none()`), never stored separately (spec §3.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    tasks: HashMap<Uuid, Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from tasks that already passed validation once
    /// (a persistence-layer reload, never a fresh insert). Skips the
    /// `add_task` checks entirely.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut graph = Self::default();
        for task in tasks {
            graph.insert_unchecked(task);
        }
        graph
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn children_of(&self, parent: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks
            .values()
            .filter(move |t| t.parent_id == Some(parent))
    }

    fn child_count(&self, parent: Uuid) -> usize {
        self.children_of(parent).count()
    }

    /// Depth of a task already in the graph (root = 0).
    pub fn depth_of(&self, id: Uuid) -> u32 {
        let mut depth = 0;
        let mut cur = id;
        while let Some(task) = self.tasks.get(&cur) {
            match task.parent_id {
                Some(p) => {
                    depth += 1;
                    cur = p;
                }
                None => break,
            }
        }
        depth
    }

    fn insert_unchecked(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }
}

/// Mint a task from [`CreateTaskInput`], assigning a fresh id when absent
/// and setting `status = pending` (spec §4.3.1).
pub fn create_task(input: CreateTaskInput, now: i64) -> Task {
    Task {
        id: input.id.unwrap_or_else(Uuid::new_v4),
        parent_id: input.parent_id,
        task_type: input.task_type.unwrap_or(TaskType::Code),
        title: input.title,
        description: input.description,
        dependencies: input.dependencies,
        status: TaskStatus::Pending,
        result: None,
        error: None,
        assigned_to: None,
        created_at: now,
        started_at: None,
        completed_at: None,
        metadata: input.metadata,
    }
}

/// Insert `task` into `graph`, running every check in spec §4.3.1's
/// table before mutating anything. On failure the graph is returned
/// unchanged to the caller (as an `Err`, not a mutated value).
pub fn add_task(
    graph: &TaskGraph,
    task: Task,
    limits: GraphLimits,
) -> Result<TaskGraph, ValidationError> {
    if graph.tasks.contains_key(&task.id) {
        return Err(ValidationError::DuplicateId(task.id));
    }

    if let Some(parent_id) = task.parent_id
        && !graph.tasks.contains_key(&parent_id)
    {
        return Err(ValidationError::MissingParent(parent_id));
    }

    for dep in &task.dependencies {
        if !graph.tasks.contains_key(dep) {
            return Err(ValidationError::MissingDependency(*dep));
        }
    }

    if graph.tasks.len() >= limits.max_total {
        return Err(ValidationError::MaxTotalExceeded {
            max: limits.max_total,
        });
    }

    let depth = match task.parent_id {
        Some(parent_id) => graph.depth_of(parent_id) + 1,
        None => 0,
    };
    if depth > limits.max_depth {
        return Err(ValidationError::MaxDepthExceeded {
            depth,
            max: limits.max_depth,
        });
    }

    if let Some(parent_id) = task.parent_id
        && graph.child_count(parent_id) >= limits.max_subtasks
    {
        return Err(ValidationError::MaxSubtasksExceeded {
            parent: parent_id,
            max: limits.max_subtasks,
        });
    }

    let ancestors = ancestor_chain(graph, task.parent_id);
    for ancestor in &ancestors {
        for dep in &task.dependencies {
            if depends_on_transitively(&graph.tasks, *dep, *ancestor) {
                return Err(ValidationError::CycleDetected {
                    dependency: *dep,
                    ancestor: *ancestor,
                });
            }
        }
    }

    let mut next = graph.clone();
    next.insert_unchecked(task);
    Ok(next)
}

/// Parent chain of `parent_id`, nearest ancestor first, including
/// `parent_id` itself.
fn ancestor_chain(graph: &TaskGraph, parent_id: Option<Uuid>) -> Vec<Uuid> {
    let mut chain = Vec::new();
    let mut cur = parent_id;
    while let Some(id) = cur {
        chain.push(id);
        cur = graph.tasks.get(&id).and_then(|t| t.parent_id);
    }
    chain
}

/// Depth-first search: does following the dependency relation from
/// `start` ever reach `target` (spec §4.3.2)? Visited set is scoped to
/// this single call, per spec.
fn depends_on_transitively(tasks: &HashMap<Uuid, Task>, start: Uuid, target: Uuid) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(cur) = stack.pop() {
        if cur == target {
            return true;
        }
        if !visited.insert(cur) {
            continue;
        }
        if let Some(task) = tasks.get(&cur) {
            stack.extend(task.dependencies.iter().copied());
        }
    }
    false
}

// ---------------------------------------------------------------------
// State machine transitions (spec §4.3.3)
// ---------------------------------------------------------------------

fn are_deps_satisfied(graph: &TaskGraph, task: &Task) -> bool {
    task.dependencies
        .iter()
        .all(|d| matches!(graph.get(*d), Some(t) if t.status == TaskStatus::Complete))
}

/// `pending -> in_progress`. Returns `None` if the task is missing, not
/// `pending`, or its dependencies are not all `complete` -- the "null
/// result" no-op signal spec §4.3.3 requires.
pub fn start(graph: &TaskGraph, id: Uuid, worker: Option<String>, now: i64) -> Option<TaskGraph> {
    let task = graph.get(id)?;
    if task.status != TaskStatus::Pending || !are_deps_satisfied(graph, task) {
        return None;
    }
    let mut next = graph.clone();
    let task = next.tasks.get_mut(&id)?;
    task.status = TaskStatus::InProgress;
    task.started_at = Some(now);
    task.assigned_to = worker;
    Some(next)
}

/// `in_progress -> complete`, then propagation (spec §4.3.4).
pub fn complete(graph: &TaskGraph, id: Uuid, result: Option<String>, now: i64) -> Option<TaskGraph> {
    let task = graph.get(id)?;
    if task.status != TaskStatus::InProgress {
        return None;
    }
    let mut next = graph.clone();
    let task = next.tasks.get_mut(&id)?;
    task.status = TaskStatus::Complete;
    task.result = result;
    task.completed_at = Some(now);
    Some(update_blocked_tasks(&next))
}

/// `in_progress -> failed`, then propagation.
pub fn fail(graph: &TaskGraph, id: Uuid, err: String, now: i64) -> Option<TaskGraph> {
    let task = graph.get(id)?;
    if task.status != TaskStatus::InProgress {
        return None;
    }
    let mut next = graph.clone();
    let task = next.tasks.get_mut(&id)?;
    task.status = TaskStatus::Failed;
    task.error = Some(err);
    task.completed_at = Some(now);
    Some(update_blocked_tasks(&next))
}

/// `{pending, in_progress, blocked} -> cancelled`, then propagation.
pub fn cancel(graph: &TaskGraph, id: Uuid, now: i64) -> Option<TaskGraph> {
    let task = graph.get(id)?;
    if task.status.is_terminal() {
        return None;
    }
    let mut next = graph.clone();
    let task = next.tasks.get_mut(&id)?;
    task.status = TaskStatus::Cancelled;
    task.completed_at = Some(now);
    Some(update_blocked_tasks(&next))
}

/// `pending -> blocked`, manual trigger.
pub fn block(graph: &TaskGraph, id: Uuid) -> Option<TaskGraph> {
    let task = graph.get(id)?;
    if task.status != TaskStatus::Pending {
        return None;
    }
    let mut next = graph.clone();
    next.tasks.get_mut(&id)?.status = TaskStatus::Blocked;
    Some(next)
}

/// Re-derive `blocked`/`pending` status for every task until no further
/// change occurs (spec §4.3.4). Idempotent and terminating: each pass
/// either blocks a pending task with a failed/cancelled dependency or
/// unblocks a blocked task whose dependencies are now all complete, and
/// there are finitely many tasks to flip either way.
pub fn update_blocked_tasks(graph: &TaskGraph) -> TaskGraph {
    let mut next = graph.clone();
    loop {
        let mut changed = false;
        let ids: Vec<Uuid> = next.tasks.keys().copied().collect();
        for id in ids {
            let task = match next.tasks.get(&id) {
                Some(t) => t.clone(),
                None => continue,
            };
            match task.status {
                TaskStatus::Pending => {
                    let blocked_dep = task.dependencies.iter().any(|d| {
                        matches!(
                            next.get(*d).map(|t| t.status),
                            Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled)
                        )
                    });
                    if blocked_dep {
                        next.tasks.get_mut(&id).unwrap().status = TaskStatus::Blocked;
                        changed = true;
                    }
                }
                TaskStatus::Blocked => {
                    if are_deps_satisfied(&next, &task) {
                        next.tasks.get_mut(&id).unwrap().status = TaskStatus::Pending;
                        changed = true;
                    }
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }
    next
}
