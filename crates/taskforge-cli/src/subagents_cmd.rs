//! `taskforge subagents spawn|list` (spec §6.1a, §4.7).

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::config::OrchestratorConfig;

use crate::session_ctx::with_session;

pub async fn run_spawn(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    title: &str,
    description: Option<&str>,
    now: i64,
) -> Result<()> {
    let title = title.to_string();
    let description = description.map(|s| s.to_string());
    with_session(pool, config, session_id, now, |actor| async move {
        let rpc = actor.make_parent_rpc();
        let (task_id, facet_name) = actor
            .spawn_subagent(title, description, None, rpc, now)
            .await?;
        println!("spawned {facet_name} as task {task_id}");
        Ok(())
    })
    .await
}

pub async fn run_list(pool: &PgPool, config: OrchestratorConfig, session_id: Uuid, now: i64) -> Result<()> {
    with_session(pool, config, session_id, now, |actor| async move {
        let count = actor.active_subagent_count().await;
        println!("{count} subagent(s) currently running");
        Ok(())
    })
    .await
}
