//! Queries against the `sessions` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a session row, or do nothing if one with this id already exists.
pub async fn ensure_session(pool: &PgPool, id: Uuid, now: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (id, status, created_at, updated_at) \
         VALUES ($1, 'idle', $2, $2) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await
    .context("failed to ensure session row")?;

    Ok(())
}

/// Update a session's status and bump `updated_at`.
pub async fn set_session_status(pool: &PgPool, id: Uuid, status: &str, now: i64) -> Result<()> {
    let result = sqlx::query("UPDATE sessions SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update session status")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("session {id} not found");
    }

    Ok(())
}

/// Fetch a session's status, if the session exists.
pub async fn get_session_status(pool: &PgPool, id: Uuid) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch session status")?;

    Ok(row.map(|(status,)| status))
}
