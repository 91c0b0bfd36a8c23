//! `taskforge session create|show` (spec §6.1a).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_db::queries::{sessions, tasks};

pub async fn run_create(pool: &PgPool, now: i64) -> Result<()> {
    let id = Uuid::new_v4();
    sessions::ensure_session(pool, id, now)
        .await
        .context("failed to create session")?;
    println!("{id}");
    Ok(())
}

pub async fn run_show(pool: &PgPool, session_id: Uuid) -> Result<()> {
    let status = sessions::get_session_status(pool, session_id)
        .await
        .context("failed to fetch session")?
        .context("session not found")?;
    let graph = tasks::load_graph(pool, session_id).await?;
    println!("session {session_id}");
    println!("  status: {status}");
    println!("  tasks:  {}", graph.len());
    Ok(())
}
