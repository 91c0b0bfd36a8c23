//! Queries against the `tasks` table. The in-memory graph is the
//! source of truth during a turn; these functions persist and reload
//! its snapshots (spec §4.3, "L4").

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::graph::TaskGraph;

use crate::models::{TaskRow, row_to_task, task_to_row};

/// Upsert a single task row.
pub async fn upsert_task(pool: &PgPool, row: &TaskRow) -> Result<()> {
    sqlx::query(
        "INSERT INTO tasks \
         (id, session_id, parent_id, task_type, title, description, status, \
          dependencies, result, error, assigned_to, created_at, started_at, \
          completed_at, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (id) DO UPDATE SET \
            status = EXCLUDED.status, \
            dependencies = EXCLUDED.dependencies, \
            result = EXCLUDED.result, \
            error = EXCLUDED.error, \
            assigned_to = EXCLUDED.assigned_to, \
            started_at = EXCLUDED.started_at, \
            completed_at = EXCLUDED.completed_at, \
            metadata = EXCLUDED.metadata",
    )
    .bind(row.id)
    .bind(row.session_id)
    .bind(row.parent_id)
    .bind(&row.task_type)
    .bind(&row.title)
    .bind(&row.description)
    .bind(&row.status)
    .bind(&row.dependencies)
    .bind(&row.result)
    .bind(&row.error)
    .bind(&row.assigned_to)
    .bind(row.created_at)
    .bind(row.started_at)
    .bind(row.completed_at)
    .bind(&row.metadata)
    .execute(pool)
    .await
    .context("failed to upsert task")?;

    Ok(())
}

/// Persist every task currently in `graph` under `session_id`.
pub async fn save_graph(pool: &PgPool, session_id: Uuid, graph: &TaskGraph) -> Result<()> {
    for task in graph.iter() {
        upsert_task(pool, &task_to_row(task, session_id)).await?;
    }
    Ok(())
}

/// Rebuild a [`TaskGraph`] from the rows stored for `session_id`. Rows
/// already passed validation once, at creation time, so they are
/// reinserted directly rather than replayed through `add_task`.
pub async fn load_graph(pool: &PgPool, session_id: Uuid) -> Result<TaskGraph> {
    let rows: Vec<TaskRow> = sqlx::query_as(
        "SELECT id, session_id, parent_id, task_type, title, description, status, \
                dependencies, result, error, assigned_to, created_at, started_at, \
                completed_at, metadata \
         FROM tasks WHERE session_id = $1 ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .context("failed to load tasks for session")?;

    let mut tasks = Vec::with_capacity(rows.len());
    for row in &rows {
        tasks.push(row_to_task(row).with_context(|| format!("corrupt task row {}", row.id))?);
    }
    Ok(TaskGraph::from_tasks(tasks))
}

/// Fetch a single task row by id.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<TaskRow>> {
    let row = sqlx::query_as::<_, TaskRow>(
        "SELECT id, session_id, parent_id, task_type, title, description, status, \
                dependencies, result, error, assigned_to, created_at, started_at, \
                completed_at, metadata \
         FROM tasks WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch task")?;

    Ok(row)
}

/// List the ids of session roots left `in_progress`, used to find
/// turns interrupted mid-flight (spec §4.8).
pub async fn list_in_progress_roots(pool: &PgPool) -> Result<Vec<(Uuid, Uuid)>> {
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT id, session_id FROM tasks \
         WHERE parent_id IS NULL AND status = 'in_progress'",
    )
    .fetch_all(pool)
    .await
    .context("failed to list in-progress roots")?;

    Ok(rows)
}
