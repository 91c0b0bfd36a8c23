//! `taskforge recover` (spec §4.8, §6.1a): re-runs the orphan scan the
//! server applies automatically on startup, so an operator can trigger
//! it by hand after a crash without restarting `serve`.

use anyhow::{Context, Result};
use sqlx::PgPool;

use taskforge_core::recovery::{self, Decision, MessageStatus};
use taskforge_db::queries::scheduling;

pub async fn run(pool: &PgPool, now: i64, heartbeat_timeout_ms: i64, max_attempts: u32) -> Result<()> {
    let unfinished = scheduling::list_unfinished(pool)
        .await
        .context("failed to list unfinished scheduling messages")?;

    let orphaned = recovery::find_orphaned(&unfinished, now, heartbeat_timeout_ms);
    if orphaned.is_empty() {
        println!("no orphaned messages found");
        return Ok(());
    }

    for msg in orphaned {
        let decision = recovery::decide(msg, max_attempts);
        match decision {
            Decision::Resume => {
                println!("task {} resuming from checkpoint", msg.task_id);
                scheduling::finalize(pool, msg.id, MessageStatus::Pending, false).await?;
            }
            Decision::Retry => {
                println!(
                    "task {} retrying (attempt {} of {max_attempts})",
                    msg.task_id,
                    msg.attempt + 1
                );
                scheduling::finalize(pool, msg.id, MessageStatus::Pending, true).await?;
            }
            Decision::Fail => {
                println!("task {} exhausted retries, marking failed", msg.task_id);
                scheduling::finalize(pool, msg.id, MessageStatus::Error, false).await?;
            }
        }
    }

    Ok(())
}
