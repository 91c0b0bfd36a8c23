//! `taskforge actions|actions clear` (spec §6.1a).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_db::queries::action_log;

pub async fn run_list(
    pool: &PgPool,
    session_id: Uuid,
    tool: Option<&str>,
    limit: Option<i64>,
) -> Result<()> {
    let entries = action_log::list_entries(pool, session_id, limit)
        .await
        .context("failed to load action log")?;
    for entry in entries.iter().filter(|e| tool.is_none_or(|t| e.tool == t)) {
        println!(
            "[{}] {} {} ({}ms, {}) {}",
            entry.timestamp,
            entry.tool,
            entry.action,
            entry.duration_ms,
            if entry.success { "ok" } else { "error" },
            entry.output_summary,
        );
    }
    Ok(())
}

pub async fn run_clear(pool: &PgPool, session_id: Uuid) -> Result<()> {
    action_log::clear_entries(pool, session_id)
        .await
        .context("failed to clear action log")?;
    Ok(())
}
