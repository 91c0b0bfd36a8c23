//! Queries against the `active_subagents` table (spec §3.5, §4.7, "L7").

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::subagent::TrackingRow;

use crate::models::{SubagentRow, subagent_row_to_tracking_row, tracking_row_to_subagent_row};

/// Insert a tracking row for a freshly spawned worker.
pub async fn insert_tracking_row(pool: &PgPool, row: &TrackingRow) -> Result<()> {
    let row = tracking_row_to_subagent_row(row);
    sqlx::query(
        "INSERT INTO active_subagents \
         (task_id, facet_name, session_id, started_at, status, props_json) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(row.task_id)
    .bind(&row.facet_name)
    .bind(row.session_id)
    .bind(row.started_at)
    .bind(&row.status)
    .bind(&row.props_json)
    .execute(pool)
    .await
    .context("failed to insert subagent tracking row")?;

    Ok(())
}

/// Update a worker's status (e.g. on completion, failure, timeout, or
/// interruption).
pub async fn update_status(pool: &PgPool, task_id: Uuid, status: &str) -> Result<()> {
    sqlx::query("UPDATE active_subagents SET status = $1 WHERE task_id = $2")
        .bind(status)
        .bind(task_id)
        .execute(pool)
        .await
        .context("failed to update subagent status")?;

    Ok(())
}

/// List every worker still `running` for a session.
pub async fn list_running(pool: &PgPool, session_id: Uuid) -> Result<Vec<TrackingRow>> {
    let rows: Vec<SubagentRow> = sqlx::query_as(
        "SELECT task_id, facet_name, session_id, started_at, status, props_json \
         FROM active_subagents WHERE session_id = $1 AND status = 'running'",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .context("failed to list running subagents")?;

    rows.iter()
        .map(|r| subagent_row_to_tracking_row(r).context("corrupt subagent tracking row"))
        .collect()
}
