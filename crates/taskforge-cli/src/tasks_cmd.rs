//! `taskforge tasks` (spec §6.1a, mirrors `GET /tasks`).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::graph::get_progress;
use taskforge_db::queries::tasks;

pub async fn run_list(pool: &PgPool, session_id: Uuid) -> Result<()> {
    let graph = tasks::load_graph(pool, session_id)
        .await
        .context("failed to load task graph")?;

    let mut all: Vec<_> = graph.iter().collect();
    all.sort_by_key(|t| (t.created_at, t.id));
    for task in &all {
        let indent = if task.is_root() { "" } else { "  " };
        println!(
            "{indent}{} [{}] {} ({})",
            task.id, task.status, task.title, task.task_type
        );
    }

    let progress = get_progress(&graph, None);
    println!(
        "\n{}/{} complete, {} failed, {} blocked, {} pending, {} in progress ({}%)",
        progress.complete,
        progress.total,
        progress.failed,
        progress.blocked,
        progress.pending,
        progress.in_progress,
        progress.percent_complete,
    );
    Ok(())
}
