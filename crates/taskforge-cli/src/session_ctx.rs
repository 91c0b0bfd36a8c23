//! Loads a [`SessionActor`] from Postgres, hands it to a one-shot CLI
//! command, then persists whatever it touched back. The CLI has no
//! long-lived process between invocations, so each command pays the
//! cost of a full load/save; `serve` instead keeps sessions resident
//! (see `serve_cmd.rs`).

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::config::OrchestratorConfig;
use taskforge_core::document_store::MemoryDocumentStore;
use taskforge_core::llm::NullDriver;
use taskforge_core::session::SessionActor;
use taskforge_db::queries::{action_log, chat, sessions, tasks};

use crate::capabilities::LocalCapabilities;

/// Build a session actor hydrated from the database, running the
/// closure against it, then persist graph/history/action-log changes
/// back before returning.
///
/// File contents are not round-tripped: the CLI's [`MemoryDocumentStore`]
/// is scoped to one invocation, since spec.md leaves document-store
/// durability to the embedding application (§4.7a).
pub async fn with_session<F, Fut, T>(
    pool: &PgPool,
    config: OrchestratorConfig,
    session_id: Uuid,
    now: i64,
    f: F,
) -> Result<T>
where
    F: FnOnce(Arc<SessionActor>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    sessions::ensure_session(pool, session_id, now)
        .await
        .context("failed to ensure session row")?;

    let graph = tasks::load_graph(pool, session_id)
        .await
        .context("failed to load task graph")?;
    let history = chat::list_messages(pool, session_id)
        .await
        .context("failed to load chat history")?;
    let prior_action_log = action_log::list_entries(pool, session_id, None)
        .await
        .context("failed to load action log")?;

    let before_history_len = history.len();
    let before_action_log_len = prior_action_log.len();

    let documents: Arc<dyn taskforge_core::document_store::DocumentStore> =
        Arc::new(MemoryDocumentStore::new());
    let capabilities = Arc::new(LocalCapabilities::new(documents.clone()));

    let actor = Arc::new(SessionActor::with_state(
        session_id,
        config,
        Arc::new(NullDriver::new(
            "taskforge-cli has no model configured; wire a real LlmDriver for interactive use.",
        )),
        capabilities,
        documents,
        graph,
        history,
        prior_action_log,
    ));

    let result = f(actor.clone()).await?;

    let (final_graph, _) = actor.tasks().await;
    tasks::save_graph(pool, session_id, &taskforge_core::graph::TaskGraph::from_tasks(final_graph))
        .await
        .context("failed to persist task graph")?;

    let final_history = actor.chat_history().await;
    for message in final_history.iter().skip(before_history_len) {
        chat::append_message(pool, session_id, message, now)
            .await
            .context("failed to persist chat message")?;
    }

    let final_action_log = actor.actions(None, None, usize::MAX).await;
    let mut sorted = final_action_log;
    sorted.sort_by_key(|e| e.timestamp);
    for entry in sorted.iter().skip(before_action_log_len) {
        action_log::append_entry(pool, entry)
            .await
            .context("failed to persist action log entry")?;
    }

    sessions::set_session_status(pool, session_id, "idle", now)
        .await
        .context("failed to update session status")?;

    Ok(result)
}
