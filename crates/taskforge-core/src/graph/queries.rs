//! Read-only views over a [`TaskGraph`] (spec §4.3, §6.3). Nothing here
//! mutates; everything borrows.

use uuid::Uuid;

use super::ops::TaskGraph;
use super::task::{Task, TaskStatus};

/// `true` iff every dependency of `task` exists in `graph` and is
/// `complete`.
pub fn are_dependencies_satisfied(graph: &TaskGraph, task: &Task) -> bool {
    task.dependencies
        .iter()
        .all(|d| matches!(graph.get(*d), Some(t) if t.status == TaskStatus::Complete))
}

/// Tasks eligible for [`super::ops::start`] right now: `pending` with
/// every dependency `complete`, ordered by `created_at` then `id` so the
/// result is deterministic across calls with identical input.
pub fn get_ready_tasks(graph: &TaskGraph) -> Vec<&Task> {
    let mut ready: Vec<&Task> = graph
        .iter()
        .filter(|t| t.status == TaskStatus::Pending && are_dependencies_satisfied(graph, t))
        .collect();
    ready.sort_by_key(|t| (t.created_at, t.id));
    ready
}

/// Tasks currently `in_progress`, ordered by `started_at` then `id`.
pub fn get_active_tasks(graph: &TaskGraph) -> Vec<&Task> {
    let mut active: Vec<&Task> = graph
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .collect();
    active.sort_by_key(|t| (t.started_at, t.id));
    active
}

/// Tasks currently `blocked`, ordered by `created_at` then `id`.
pub fn get_blocked_tasks(graph: &TaskGraph) -> Vec<&Task> {
    let mut blocked: Vec<&Task> = graph
        .iter()
        .filter(|t| t.status == TaskStatus::Blocked)
        .collect();
    blocked.sort_by_key(|t| (t.created_at, t.id));
    blocked
}

/// A task together with its subtree, for rendering the graph as a tree
/// (spec §6.3's `GET /sessions/:id/tasks/tree`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub task: Task,
    pub children: Vec<TaskNode>,
    pub depth: u32,
}

fn build_node(graph: &TaskGraph, task: &Task, depth: u32) -> TaskNode {
    let mut children: Vec<&Task> = graph.children_of(task.id).collect();
    children.sort_by_key(|t| (t.created_at, t.id));
    TaskNode {
        task: task.clone(),
        children: children
            .into_iter()
            .map(|c| build_node(graph, c, depth + 1))
            .collect(),
        depth,
    }
}

/// The forest of root tasks (`parent_id.is_none()`), each expanded
/// recursively, ordered by `created_at` then `id`.
pub fn get_task_tree(graph: &TaskGraph) -> Vec<TaskNode> {
    let mut roots: Vec<&Task> = graph.iter().filter(|t| t.is_root()).collect();
    roots.sort_by_key(|t| (t.created_at, t.id));
    roots.into_iter().map(|r| build_node(graph, r, 0)).collect()
}

/// All descendants of `id` (not including `id` itself), breadth-first.
pub fn get_descendants(graph: &TaskGraph, id: Uuid) -> Vec<Uuid> {
    let mut out = Vec::new();
    let mut frontier = vec![id];
    while let Some(cur) = frontier.pop() {
        let mut children: Vec<&Task> = graph.children_of(cur).collect();
        children.sort_by_key(|t| (t.created_at, t.id));
        for child in children {
            out.push(child.id);
            frontier.push(child.id);
        }
    }
    out
}

/// Ancestors of `id`, nearest first, not including `id` itself.
pub fn get_ancestors(graph: &TaskGraph, id: Uuid) -> Vec<Uuid> {
    let mut out = Vec::new();
    let mut cur = graph.get(id).and_then(|t| t.parent_id);
    while let Some(pid) = cur {
        out.push(pid);
        cur = graph.get(pid).and_then(|t| t.parent_id);
    }
    out
}

/// Status-bucketed counts for a subtree (or the whole graph when
/// `root` is `None`), plus a rounded completion percentage (spec
/// §6.3's progress summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub complete: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub percent_complete: u32,
}

pub fn get_progress(graph: &TaskGraph, root: Option<Uuid>) -> Progress {
    let ids: Vec<Uuid> = match root {
        Some(id) => {
            let mut v = vec![id];
            v.extend(get_descendants(graph, id));
            v
        }
        None => graph.iter().map(|t| t.id).collect(),
    };

    let mut progress = Progress::default();
    for id in &ids {
        let Some(task) = graph.get(*id) else { continue };
        progress.total += 1;
        match task.status {
            TaskStatus::Pending => progress.pending += 1,
            TaskStatus::InProgress => progress.in_progress += 1,
            TaskStatus::Blocked => progress.blocked += 1,
            TaskStatus::Complete => progress.complete += 1,
            TaskStatus::Failed => progress.failed += 1,
            TaskStatus::Cancelled => progress.cancelled += 1,
        }
    }
    progress.percent_complete = if progress.total == 0 {
        0
    } else {
        ((progress.complete as f64 / progress.total as f64) * 100.0).round() as u32
    };
    progress
}
