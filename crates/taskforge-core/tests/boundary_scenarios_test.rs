//! End-to-end coverage for the graph engine's named boundary scenarios:
//! a linear dependency chain driven to completion, and a parent with
//! concurrent, independent children.

use std::collections::BTreeSet;

use taskforge_core::graph::{
    CreateTaskInput, GraphLimits, TaskStatus, add_task, complete, create_task, get_progress,
    get_ready_tasks, start, TaskGraph,
};

fn input(title: &str, parent: Option<uuid::Uuid>, deps: BTreeSet<uuid::Uuid>) -> CreateTaskInput {
    CreateTaskInput {
        title: title.to_string(),
        parent_id: parent,
        dependencies: deps,
        ..Default::default()
    }
}

#[test]
fn linear_chain_completion() {
    let limits = GraphLimits::default();
    let mut graph = TaskGraph::new();
    let mut now = 1_000;

    let plan = create_task(input("plan", None, BTreeSet::new()), now);
    let plan_id = plan.id;
    graph = add_task(&graph, plan, limits).unwrap();

    let design = create_task(
        input("design", Some(plan_id), BTreeSet::from([plan_id])),
        now + 1,
    );
    let design_id = design.id;
    graph = add_task(&graph, design, limits).unwrap();

    let implement = create_task(
        input("implement", Some(plan_id), BTreeSet::from([design_id])),
        now + 2,
    );
    let implement_id = implement.id;
    graph = add_task(&graph, implement, limits).unwrap();

    let test = create_task(
        input("test", Some(plan_id), BTreeSet::from([implement_id])),
        now + 3,
    );
    let test_id = test.id;
    graph = add_task(&graph, test, limits).unwrap();

    let review = create_task(
        input(
            "review",
            Some(plan_id),
            BTreeSet::from([implement_id, test_id]),
        ),
        now + 4,
    );
    let review_id = review.id;
    graph = add_task(&graph, review, limits).unwrap();

    let ready_ids = |g: &TaskGraph| -> Vec<uuid::Uuid> { get_ready_tasks(g).iter().map(|t| t.id).collect() };

    assert_eq!(ready_ids(&graph), vec![plan_id]);

    let chain = [
        (plan_id, vec![design_id]),
        (design_id, vec![implement_id]),
        (implement_id, vec![test_id]),
        (test_id, vec![review_id]),
        (review_id, vec![]),
    ];

    for (task_id, expected_ready) in chain {
        now += 10;
        graph = start(&graph, task_id, None, now).unwrap();
        now += 10;
        graph = complete(&graph, task_id, None, now).unwrap();
        assert_eq!(ready_ids(&graph), expected_ready, "after completing {task_id}");
    }

    let progress = get_progress(&graph, Some(plan_id));
    assert_eq!(progress.percent_complete, 100);
}

#[test]
fn parallel_fan_out() {
    let limits = GraphLimits::default();
    let mut graph = TaskGraph::new();
    let now = 2_000;

    let parent = create_task(input("P", None, BTreeSet::new()), now);
    let parent_id = parent.id;
    graph = add_task(&graph, parent, limits).unwrap();

    let children: Vec<uuid::Uuid> = (0..3)
        .map(|i| {
            let child = create_task(
                input(&format!("s{i}"), Some(parent_id), BTreeSet::new()),
                now + 1 + i,
            );
            let id = child.id;
            graph = add_task(&graph, child, limits).unwrap();
            id
        })
        .collect();

    let ready = get_ready_tasks(&graph);
    assert_eq!(ready.len(), 4);

    for &child_id in &children {
        graph = start(&graph, child_id, None, now + 10).unwrap();
    }
    for &child_id in children.iter().take(2) {
        graph = complete(&graph, child_id, None, now + 20).unwrap();
    }
    graph = complete(&graph, children[2], None, now + 20).unwrap();

    let progress = get_progress(&graph, Some(parent_id));
    assert_eq!(progress.total, 4);
    assert_eq!(progress.complete, 3);
    assert_eq!(progress.pending, 1);
    assert_eq!(progress.percent_complete, 75);

    assert_eq!(graph.get(parent_id).unwrap().status, TaskStatus::Pending);
}
