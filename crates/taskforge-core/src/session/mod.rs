//! Session façade (spec §4.9, "L9"): a per-session actor with
//! at-most-one in-flight orchestration. Owns the graph, chat history,
//! action log, and subagent tracking; dispatches to L6/L7; is the
//! single writer to the document store.
//!
//! Matches the teacher's single-writer-actor shape: one `Mutex`-guarded
//! state, entered serially, with async work (the orchestrator turn)
//! suspended at each external await rather than holding the lock.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::action_log::ActionLogEntry;
use crate::capability::CapabilitySet;
use crate::config::OrchestratorConfig;
use crate::document_store::DocumentStore;
use crate::graph::{self, Task, TaskGraph};
use crate::llm::{ChatMessage, ChatRole, LlmDriver, ToolDescriptor};
use crate::orchestrator::{self, TurnOutcome};
use crate::subagent::rpc::{ParentRpc, SessionScopedRpc};
use crate::subagent::{SpawnProps, Supervisor};

/// Idle/busy status surfaced by `GET /state` (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Busy,
}

struct SessionState {
    graph: TaskGraph,
    history: Vec<ChatMessage>,
    action_log: Vec<ActionLogEntry>,
    status: SessionStatus,
}

/// Per-session state plus the collaborators it drives against (spec
/// §4.9). One instance per live session.
pub struct SessionActor {
    pub session_id: Uuid,
    pub config: OrchestratorConfig,
    state: Mutex<SessionState>,
    driver: Arc<dyn LlmDriver>,
    capabilities: Arc<dyn CapabilitySet>,
    documents: Arc<dyn DocumentStore>,
    supervisor: Supervisor,
    subagent_results_rx: Mutex<mpsc::UnboundedReceiver<crate::subagent::SubagentResult>>,
}

/// Error returned by [`SessionActor::chat`] when a turn is already in
/// flight (spec §5: "Additional chat messages while status != idle are
/// held on a bounded per-session queue (default 1); overflow returns an
/// error").
#[derive(Debug, Clone, thiserror::Error)]
#[error("session is busy with another orchestrator turn")]
pub struct SessionBusy;

impl SessionActor {
    pub fn new(
        session_id: Uuid,
        config: OrchestratorConfig,
        driver: Arc<dyn LlmDriver>,
        capabilities: Arc<dyn CapabilitySet>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let (supervisor, rx) = Supervisor::new();
        Self {
            session_id,
            config,
            state: Mutex::new(SessionState {
                graph: TaskGraph::new(),
                history: Vec::new(),
                action_log: Vec::new(),
                status: SessionStatus::Idle,
            }),
            driver,
            capabilities,
            documents,
            supervisor,
            subagent_results_rx: Mutex::new(rx),
        }
    }

    /// Like [`Self::new`], but hydrated from a previously persisted
    /// graph/history/action-log (a CLI or `serve` process reloading a
    /// session from the database rather than starting fresh).
    pub fn with_state(
        session_id: Uuid,
        config: OrchestratorConfig,
        driver: Arc<dyn LlmDriver>,
        capabilities: Arc<dyn CapabilitySet>,
        documents: Arc<dyn DocumentStore>,
        graph: TaskGraph,
        history: Vec<ChatMessage>,
        action_log: Vec<ActionLogEntry>,
    ) -> Self {
        let (supervisor, rx) = Supervisor::new();
        Self {
            session_id,
            config,
            state: Mutex::new(SessionState {
                graph,
                history,
                action_log,
                status: SessionStatus::Idle,
            }),
            driver,
            capabilities,
            documents,
            supervisor,
            subagent_results_rx: Mutex::new(rx),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    /// Run one orchestrator turn for `message` (spec §4.6). Rejects
    /// concurrent turns per the single-flight rule (spec §4.6, §5).
    pub async fn chat(&self, message: &str, now: i64, tools: Vec<ToolDescriptor>) -> Result<TurnOutcome, SessionBusy> {
        {
            let mut state = self.state.lock().await;
            if state.status == SessionStatus::Busy {
                return Err(SessionBusy);
            }
            state.status = SessionStatus::Busy;
            state.history.push(ChatMessage {
                role: ChatRole::User,
                content: message.to_string(),
            });
        }

        let (graph_snapshot, history_snapshot) = {
            let state = self.state.lock().await;
            (state.graph.clone(), state.history.clone())
        };

        let outcome = orchestrator::run_turn(
            &graph_snapshot,
            &history_snapshot,
            message,
            self.session_id,
            now,
            &self.config,
            &self.driver,
            &self.capabilities,
            tools,
        )
        .await;

        {
            let mut state = self.state.lock().await;
            state.graph = outcome.graph.clone();
            state.action_log.extend(outcome.action_log.clone());
            if let Some(text) = &outcome.assistant_message {
                state.history.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: text.clone(),
                });
            }
            state.status = SessionStatus::Idle;
        }

        Ok(outcome)
    }

    /// Cancel the current turn (spec §5): flips the root and its
    /// `in_progress` descendants to `cancelled`, aborts running
    /// subagents, returns to idle.
    pub async fn cancel(&self, root_id: Uuid, now: i64) -> Vec<Uuid> {
        let interrupted = self.supervisor.interrupt_all_running().await;
        let mut state = self.state.lock().await;
        state.graph = orchestrator::cancel_turn(&state.graph, root_id, now);
        state.status = SessionStatus::Idle;
        interrupted
    }

    pub async fn tasks(&self) -> (Vec<Task>, Vec<Uuid>) {
        let state = self.state.lock().await;
        let tasks: Vec<Task> = state.graph.iter().cloned().collect();
        let roots = tasks.iter().filter(|t| t.is_root()).map(|t| t.id).collect();
        (tasks, roots)
    }

    pub async fn actions(&self, tool: Option<&str>, since: Option<i64>, limit: usize) -> Vec<ActionLogEntry> {
        let state = self.state.lock().await;
        let mut matches: Vec<ActionLogEntry> = state
            .action_log
            .iter()
            .filter(|e| tool.is_none_or(|t| e.tool == t))
            .filter(|e| since.is_none_or(|s| e.timestamp >= s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        matches
    }

    pub async fn clear_actions(&self) {
        self.state.lock().await.action_log.clear();
    }

    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.clone()
    }

    pub async fn clear_chat(&self) {
        self.state.lock().await.history.clear();
    }

    pub async fn read_file(&self, path: &str) -> Option<String> {
        self.documents.read(path).await
    }

    pub async fn write_file(&self, path: &str, content: String) -> u64 {
        self.documents.write(path, content).await
    }

    pub async fn delete_file(&self, path: &str) -> bool {
        self.documents.delete(path).await
    }

    pub async fn list_files(&self) -> (Vec<String>, u64) {
        (self.documents.list().await, self.documents.version().await)
    }

    /// Build the scoped child->parent surface a spawned worker talks
    /// through (spec §4.7.4). Callers pass this to [`Self::spawn_subagent`].
    pub fn make_parent_rpc(&self) -> Arc<dyn ParentRpc> {
        Arc::new(SessionScopedRpc::new(
            self.documents.clone(),
            self.capabilities.clone(),
        ))
    }

    /// Spawn a subagent for `task`, recording it in the graph as
    /// `in_progress` first (spec §4.7.1).
    pub async fn spawn_subagent(
        &self,
        title: String,
        description: Option<String>,
        context: Option<String>,
        rpc: Arc<dyn ParentRpc>,
        now: i64,
    ) -> Result<(Uuid, String), graph::ValidationError> {
        let mut state = self.state.lock().await;
        let task = graph::create_task(
            graph::CreateTaskInput {
                title: title.clone(),
                description: description.clone(),
                ..Default::default()
            },
            now,
        );
        let task_id = task.id;
        state.graph = graph::add_task(&state.graph, task, self.config.graph_limits())?;
        state.graph = graph::start(&state.graph, task_id, Some("subagent-supervisor".into()), now)
            .unwrap_or_else(|| state.graph.clone());
        drop(state);

        let props = SpawnProps {
            task_id,
            title,
            description,
            context,
            parent_session_id: self.session_id,
            parent_id: None,
        };
        let facet_name = self
            .supervisor
            .spawn(props, self.driver.clone(), rpc, now)
            .await;
        Ok((task_id, facet_name))
    }

    pub async fn active_subagent_count(&self) -> usize {
        self.supervisor.active_count().await
    }

    /// Drain any completed subagent results and apply them to the
    /// graph as atomic `complete`/`fail` transitions (spec §5: "the
    /// parent applies them in arrival order, each as an atomic
    /// complete/fail").
    pub async fn drain_subagent_results(&self, now: i64) {
        let mut rx = self.subagent_results_rx.lock().await;
        while let Ok(result) = rx.try_recv() {
            self.supervisor.apply_result(&result).await;
            let mut state = self.state.lock().await;
            state.graph = if result.success {
                graph::complete(&state.graph, result.task_id, result.result.clone(), now)
                    .unwrap_or_else(|| state.graph.clone())
            } else {
                graph::fail(
                    &state.graph,
                    result.task_id,
                    result.error.clone().unwrap_or_else(|| "subagent failed".into()),
                    now,
                )
                .unwrap_or_else(|| state.graph.clone())
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ToolOutcome;
    use crate::document_store::MemoryDocumentStore;
    use crate::llm::NullDriver;
    use async_trait::async_trait;

    struct NoopCapabilities;

    #[async_trait]
    impl CapabilitySet for NoopCapabilities {
        async fn bash(&self, _input: crate::capability::BashInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn read_file(&self, _input: crate::capability::ReadFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn write_file(&self, _input: crate::capability::WriteFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn edit_file(&self, _input: crate::capability::EditFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn list_files(&self) -> ToolOutcome {
            Ok(serde_json::json!({"files": []}))
        }
        async fn fetch(&self, _input: crate::capability::FetchInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn web_search(&self, _input: crate::capability::SearchInput) -> ToolOutcome {
            Ok(serde_json::json!({"results": []}))
        }
        async fn news_search(&self, _input: crate::capability::SearchInput) -> ToolOutcome {
            Ok(serde_json::json!({"results": []}))
        }
        async fn execute_code(&self, _input: crate::capability::ExecuteCodeInput) -> ToolOutcome {
            Ok(serde_json::json!({"success": true}))
        }
    }

    fn actor() -> SessionActor {
        SessionActor::new(
            Uuid::new_v4(),
            OrchestratorConfig::default(),
            Arc::new(NullDriver::new("ok")),
            Arc::new(NoopCapabilities),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    #[tokio::test]
    async fn chat_completes_root_and_returns_to_idle() {
        let actor = actor();
        let outcome = actor.chat("fix the bug", 1_000, vec![]).await.unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(actor.status().await, SessionStatus::Idle);
        let (tasks, roots) = actor.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(roots.len(), 1);
    }

    #[tokio::test]
    async fn files_round_trip_through_session() {
        let actor = actor();
        let v = actor.write_file("a.txt", "hi".into()).await;
        assert_eq!(v, 1);
        assert_eq!(actor.read_file("a.txt").await.as_deref(), Some("hi"));
        let (files, version) = actor.list_files().await;
        assert_eq!(files, vec!["a.txt".to_string()]);
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn clearing_actions_and_chat_empties_them() {
        let actor = actor();
        actor.chat("do something", 1_000, vec![]).await.unwrap();
        actor.clear_chat().await;
        actor.clear_actions().await;
        assert!(actor.chat_history().await.is_empty());
        assert!(actor.actions(None, None, 100).await.is_empty());
    }
}
