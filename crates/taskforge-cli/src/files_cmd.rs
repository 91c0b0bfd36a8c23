//! `taskforge files|file show|file write|file rm` (spec §6.1a).
//!
//! The CLI's document store is scoped to a single invocation (see
//! `session_ctx`), so these commands are mainly useful against a
//! `taskforge serve` process reached over HTTP, where the store lives
//! for the life of the server. Kept here for operators working
//! directly against the database without a server running.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::config::OrchestratorConfig;

use crate::session_ctx::with_session;

pub async fn run_list(pool: &PgPool, config: OrchestratorConfig, session_id: Uuid, now: i64) -> Result<()> {
    with_session(pool, config, session_id, now, |actor| async move {
        let (paths, version) = actor.list_files().await;
        println!("version {version}");
        for path in paths {
            println!("{path}");
        }
        Ok(())
    })
    .await
}

pub async fn run_write(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    path: &str,
    content: &str,
    now: i64,
) -> Result<()> {
    let path = path.to_string();
    let content = content.to_string();
    with_session(pool, config, session_id, now, |actor| async move {
        let version = actor.write_file(&path, content).await;
        println!("wrote {path} at version {version}");
        Ok(())
    })
    .await
}

pub async fn run_show(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    path: &str,
    now: i64,
) -> Result<()> {
    let path = path.to_string();
    with_session(pool, config, session_id, now, |actor| async move {
        match actor.read_file(&path).await {
            Some(content) => println!("{content}"),
            None => println!("(not found)"),
        }
        Ok(())
    })
    .await
}

pub async fn run_rm(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    path: &str,
    now: i64,
) -> Result<()> {
    let path = path.to_string();
    with_session(pool, config, session_id, now, |actor| async move {
        let removed = actor.delete_file(&path).await;
        println!("{}", if removed { "removed" } else { "not found" });
        Ok(())
    })
    .await
}
