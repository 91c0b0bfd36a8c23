//! The task graph engine (spec §4.3, "L3"): a pure, value-semantics DAG
//! with no persistence or I/O of its own. [`crate`]'s DB layer maps
//! [`Task`] to and from storage; this module never touches a database.

pub mod errors;
pub mod limits;
pub mod ops;
pub mod queries;
pub mod task;

pub use errors::ValidationError;
pub use limits::GraphLimits;
pub use ops::{add_task, cancel, complete, create_task, fail, start, block, update_blocked_tasks, TaskGraph};
pub use queries::{
    are_dependencies_satisfied, get_active_tasks, get_ancestors, get_blocked_tasks,
    get_descendants, get_progress, get_ready_tasks, get_task_tree, Progress, TaskNode,
};
pub use task::{CreateTaskInput, Task, TaskStatus, TaskType};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn input(title: &str, parent: Option<uuid::Uuid>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            parent_id: parent,
            ..Default::default()
        }
    }

    #[test]
    fn add_root_task() {
        let graph = TaskGraph::new();
        let task = create_task(input("root", None), 1000);
        let graph = add_task(&graph, task.clone(), GraphLimits::default()).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(task.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn duplicate_id_rejected() {
        let graph = TaskGraph::new();
        let task = create_task(input("root", None), 1000);
        let graph = add_task(&graph, task.clone(), GraphLimits::default()).unwrap();
        let err = add_task(&graph, task, GraphLimits::default()).unwrap_err();
        assert_eq!(err.kind(), "duplicate_id");
    }

    #[test]
    fn missing_parent_rejected() {
        let graph = TaskGraph::new();
        let task = create_task(input("orphan", Some(uuid::Uuid::new_v4())), 1000);
        let err = add_task(&graph, task, GraphLimits::default()).unwrap_err();
        assert_eq!(err.kind(), "missing_parent");
    }

    #[test]
    fn depth_limit_enforced() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits {
            max_depth: 1,
            ..GraphLimits::default()
        };
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();
        let child = create_task(input("child", Some(root_id)), 1001);
        let child_id = child.id;
        graph = add_task(&graph, child, limits).unwrap();

        let grandchild = create_task(input("grandchild", Some(child_id)), 1002);
        let err = add_task(&graph, grandchild, limits).unwrap_err();
        assert_eq!(err.kind(), "max_depth_exceeded");
    }

    #[test]
    fn subtask_limit_enforced() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits {
            max_subtasks: 1,
            ..GraphLimits::default()
        };
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();
        let first = create_task(input("first", Some(root_id)), 1001);
        graph = add_task(&graph, first, limits).unwrap();

        let second = create_task(input("second", Some(root_id)), 1002);
        let err = add_task(&graph, second, limits).unwrap_err();
        assert_eq!(err.kind(), "max_subtasks_exceeded");
    }

    #[test]
    fn cycle_through_ancestor_rejected() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits::default();
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();

        let child = create_task(input("child", Some(root_id)), 1001);
        let child_id = child.id;
        graph = add_task(&graph, child, limits).unwrap();

        // A new task under `child` that depends on `root`, its own
        // ancestor, must be rejected.
        let mut grandchild_input = input("grandchild", Some(child_id));
        let mut grandchild_deps = BTreeSet::new();
        grandchild_deps.insert(root_id);
        grandchild_input.dependencies = grandchild_deps;
        let grandchild = create_task(grandchild_input, 1002);
        let err = add_task(&graph, grandchild, limits).unwrap_err();
        assert_eq!(err.kind(), "cycle_detected");
    }

    #[test]
    fn complete_propagates_to_blocked_sibling() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits::default();
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();

        let a = create_task(input("a", Some(root_id)), 1001);
        let a_id = a.id;
        graph = add_task(&graph, a, limits).unwrap();

        let mut b_input = input("b", Some(root_id));
        let mut deps = BTreeSet::new();
        deps.insert(a_id);
        b_input.dependencies = deps;
        let b = create_task(b_input, 1002);
        let b_id = b.id;
        graph = add_task(&graph, b, limits).unwrap();

        assert!(get_ready_tasks(&graph).iter().any(|t| t.id == a_id));
        assert!(!get_ready_tasks(&graph).iter().any(|t| t.id == b_id));

        graph = start(&graph, a_id, None, 1003).unwrap();
        graph = complete(&graph, a_id, Some("done".into()), 1004).unwrap();

        assert_eq!(graph.get(b_id).unwrap().status, TaskStatus::Pending);
        assert!(get_ready_tasks(&graph).iter().any(|t| t.id == b_id));
    }

    #[test]
    fn fail_blocks_dependents() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits::default();
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();

        let a = create_task(input("a", Some(root_id)), 1001);
        let a_id = a.id;
        graph = add_task(&graph, a, limits).unwrap();

        let mut b_input = input("b", Some(root_id));
        let mut deps = BTreeSet::new();
        deps.insert(a_id);
        b_input.dependencies = deps;
        let b = create_task(b_input, 1002);
        let b_id = b.id;
        graph = add_task(&graph, b, limits).unwrap();

        graph = start(&graph, a_id, None, 1003).unwrap();
        graph = fail(&graph, a_id, "boom".into(), 1004).unwrap();

        assert_eq!(graph.get(b_id).unwrap().status, TaskStatus::Blocked);
    }

    #[test]
    fn terminal_transition_is_noop() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits::default();
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();
        graph = start(&graph, root_id, None, 1001).unwrap();
        graph = complete(&graph, root_id, None, 1002).unwrap();

        assert!(start(&graph, root_id, None, 1003).is_none());
        assert!(cancel(&graph, root_id, 1004).is_none());
    }

    #[test]
    fn progress_counts_subtree_only() {
        let mut graph = TaskGraph::new();
        let limits = GraphLimits::default();
        let root = create_task(input("root", None), 1000);
        let root_id = root.id;
        graph = add_task(&graph, root, limits).unwrap();
        let other_root = create_task(input("other", None), 1001);
        graph = add_task(&graph, other_root, limits).unwrap();

        let child = create_task(input("child", Some(root_id)), 1002);
        let child_id = child.id;
        graph = add_task(&graph, child, limits).unwrap();
        graph = start(&graph, child_id, None, 1003).unwrap();
        graph = complete(&graph, child_id, None, 1004).unwrap();

        let progress = get_progress(&graph, Some(root_id));
        assert_eq!(progress.total, 2);
        assert_eq!(progress.complete, 1);
        assert_eq!(progress.percent_complete, 50);
    }
}
