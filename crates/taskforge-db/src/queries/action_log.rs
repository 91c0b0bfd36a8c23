//! Queries against the `action_log` table (spec §3.4, "L5").

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::action_log::ActionLogEntry;

use crate::models::{ActionLogRow, action_log_entry_to_row, row_to_action_log_entry};

/// Append one entry. Callers pass an already-truncated/summarized entry
/// (see [`taskforge_core::action_log`]); this layer never truncates.
pub async fn append_entry(pool: &PgPool, entry: &ActionLogEntry) -> Result<()> {
    let row = action_log_entry_to_row(entry);
    sqlx::query(
        "INSERT INTO action_log \
         (id, session_id, timestamp, tool, action, input, output_summary, \
          duration_ms, success, error, message_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(row.id)
    .bind(row.session_id)
    .bind(row.timestamp)
    .bind(&row.tool)
    .bind(&row.action)
    .bind(&row.input)
    .bind(&row.output_summary)
    .bind(row.duration_ms)
    .bind(row.success)
    .bind(&row.error)
    .bind(row.message_id)
    .execute(pool)
    .await
    .context("failed to append action log entry")?;

    Ok(())
}

/// List a session's action log entries, newest first, optionally capped.
pub async fn list_entries(
    pool: &PgPool,
    session_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<ActionLogEntry>> {
    let rows: Vec<ActionLogRow> = sqlx::query_as(
        "SELECT id, session_id, timestamp, tool, action, input, output_summary, \
                duration_ms, success, error, message_id \
         FROM action_log WHERE session_id = $1 ORDER BY timestamp DESC LIMIT $2",
    )
    .bind(session_id)
    .bind(limit.unwrap_or(500))
    .fetch_all(pool)
    .await
    .context("failed to list action log entries")?;

    Ok(rows.iter().map(row_to_action_log_entry).collect())
}

/// Delete a session's entire action log.
pub async fn clear_entries(pool: &PgPool, session_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM action_log WHERE session_id = $1")
        .bind(session_id)
        .execute(pool)
        .await
        .context("failed to clear action log")?;

    Ok(())
}
