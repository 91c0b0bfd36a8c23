//! Integration tests driving the same code paths the `taskforge` binary
//! uses, against a real PostgreSQL instance: create a session, run a
//! chat turn through it, then read back tasks and the action log.

use taskforge_core::config::OrchestratorConfig;
use taskforge_db::queries::{action_log, chat, sessions, tasks};
use taskforge_test_utils::{create_test_db, drop_test_db};

#[path = "../src/capabilities.rs"]
mod capabilities;
#[path = "../src/session_ctx.rs"]
mod session_ctx;

#[tokio::test]
async fn session_create_persists_idle_status() {
    let (pool, db_name) = create_test_db().await;

    let session_id = uuid::Uuid::new_v4();
    sessions::ensure_session(&pool, session_id, 1_000).await.unwrap();

    let status = sessions::get_session_status(&pool, session_id).await.unwrap();
    assert_eq!(status.as_deref(), Some("idle"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn chat_turn_persists_history_and_graph() {
    let (pool, db_name) = create_test_db().await;
    let session_id = uuid::Uuid::new_v4();
    let config = OrchestratorConfig::from_env();

    let outcome = session_ctx::with_session(&pool, config, session_id, 1_000, |actor| async move {
        actor
            .chat("build a greeting function", 1_000, Vec::new())
            .await
            .map_err(|e| anyhow::anyhow!(e))
    })
    .await
    .expect("with_session should succeed");

    assert!(outcome.assistant_message.is_some() || outcome.error.is_some());

    let history = chat::list_messages(&pool, session_id).await.unwrap();
    assert!(history.iter().any(|m| m.content.contains("greeting")));

    let graph = tasks::load_graph(&pool, session_id).await.unwrap();
    assert!(graph.len() >= 1, "a root task should have been created for the turn");

    let entries = action_log::list_entries(&pool, session_id, None).await.unwrap();
    assert_eq!(entries.len(), outcome.action_log.len());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn actions_clear_removes_all_entries() {
    let (pool, db_name) = create_test_db().await;
    let session_id = uuid::Uuid::new_v4();
    sessions::ensure_session(&pool, session_id, 1_000).await.unwrap();

    let entry = taskforge_core::action_log::ActionLogEntry {
        id: uuid::Uuid::new_v4(),
        session_id,
        timestamp: 1_000,
        tool: "bash".to_string(),
        action: "run".to_string(),
        input: "echo hi".to_string(),
        output_summary: "exit=0, stdout=2 chars, stderr=0 chars".to_string(),
        duration_ms: 5,
        success: true,
        error: None,
        message_id: None,
    };
    action_log::append_entry(&pool, &entry).await.unwrap();
    assert_eq!(action_log::list_entries(&pool, session_id, None).await.unwrap().len(), 1);

    action_log::clear_entries(&pool, session_id).await.unwrap();
    assert!(action_log::list_entries(&pool, session_id, None).await.unwrap().is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}
