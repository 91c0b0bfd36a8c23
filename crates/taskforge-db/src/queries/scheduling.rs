//! Queries against the `scheduling_messages` table, backing the
//! heartbeat/orphan-recovery machinery in
//! [`taskforge_core::recovery`] (spec §3.3, §4.8, "L8").

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::recovery::{MessageStatus, ScheduledMessage};

use crate::models::{ScheduledMessageRow, row_to_scheduled_message};

fn status_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Pending => "pending",
        MessageStatus::Streaming => "streaming",
        MessageStatus::Complete => "complete",
        MessageStatus::Error => "error",
        MessageStatus::Cancelled => "cancelled",
    }
}

/// Create a tracking row for a task about to start streaming.
pub async fn create_message(pool: &PgPool, id: Uuid, task_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO scheduling_messages (id, task_id, status, heartbeat_at, checkpoint, attempt) \
         VALUES ($1, $2, 'pending', NULL, NULL, 0)",
    )
    .bind(id)
    .bind(task_id)
    .execute(pool)
    .await
    .context("failed to create scheduling message")?;

    Ok(())
}

/// Mark a message streaming and refresh its heartbeat.
pub async fn heartbeat(pool: &PgPool, id: Uuid, now: i64) -> Result<()> {
    sqlx::query(
        "UPDATE scheduling_messages SET status = 'streaming', heartbeat_at = $1 WHERE id = $2",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to record heartbeat")?;

    Ok(())
}

/// Persist a resumable checkpoint without changing status.
pub async fn save_checkpoint(pool: &PgPool, id: Uuid, checkpoint: &str) -> Result<()> {
    sqlx::query("UPDATE scheduling_messages SET checkpoint = $1 WHERE id = $2")
        .bind(checkpoint)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to save checkpoint")?;

    Ok(())
}

/// Finalize a message's terminal status, incrementing its attempt count
/// when it is being retried.
pub async fn finalize(pool: &PgPool, id: Uuid, status: MessageStatus, bump_attempt: bool) -> Result<()> {
    if bump_attempt {
        sqlx::query("UPDATE scheduling_messages SET status = $1, attempt = attempt + 1 WHERE id = $2")
            .bind(status_str(status))
            .bind(id)
            .execute(pool)
            .await
    } else {
        sqlx::query("UPDATE scheduling_messages SET status = $1 WHERE id = $2")
            .bind(status_str(status))
            .bind(id)
            .execute(pool)
            .await
    }
    .context("failed to finalize scheduling message")?;

    Ok(())
}

/// List every message still in `streaming` or `pending`, for orphan
/// scanning at startup (spec §4.8, boundary scenario 7).
pub async fn list_unfinished(pool: &PgPool) -> Result<Vec<ScheduledMessage>> {
    let rows: Vec<ScheduledMessageRow> = sqlx::query_as(
        "SELECT id, status, heartbeat_at, checkpoint, attempt, task_id \
         FROM scheduling_messages WHERE status IN ('pending', 'streaming')",
    )
    .fetch_all(pool)
    .await
    .context("failed to list unfinished scheduling messages")?;

    Ok(rows.iter().map(row_to_scheduled_message).collect())
}
