//! `taskforge chat|chat history|chat clear` (spec §6.1a).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::config::OrchestratorConfig;
use taskforge_core::llm::ToolDescriptor;
use taskforge_db::queries::chat;

use crate::session_ctx::with_session;

pub async fn run_send(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    message: &str,
    now: i64,
) -> Result<()> {
    let outcome = with_session(pool, config, session_id, now, |actor| {
        let message = message.to_string();
        async move {
            actor
                .chat(&message, now, Vec::<ToolDescriptor>::new())
                .await
                .map_err(|e| anyhow::anyhow!(e))
        }
    })
    .await?;

    if let Some(text) = outcome.assistant_message {
        println!("{text}");
    }
    if let Some(err) = outcome.error {
        eprintln!("turn ended with an error: {err}");
    }
    Ok(())
}

pub async fn run_history(pool: &PgPool, session_id: Uuid) -> Result<()> {
    let history = chat::list_messages(pool, session_id)
        .await
        .context("failed to load chat history")?;
    for message in history {
        println!("{:?}: {}", message.role, message.content);
    }
    Ok(())
}

pub async fn run_clear(pool: &PgPool, session_id: Uuid) -> Result<()> {
    chat::clear_messages(pool, session_id)
        .await
        .context("failed to clear chat history")?;
    Ok(())
}
