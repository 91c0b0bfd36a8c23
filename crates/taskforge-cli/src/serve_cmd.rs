//! The `axum` HTTP surface (spec §6.1), session-scoped under
//! `/sessions/{id}/...`. Unlike the one-shot CLI commands, `serve`
//! keeps one [`SessionActor`] resident per session for the life of the
//! process, so its document store and in-flight subagents persist
//! across requests the way spec §5 assumes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use taskforge_core::config::OrchestratorConfig;
use taskforge_core::document_store::MemoryDocumentStore;
use taskforge_core::graph::{Task, get_progress};
use taskforge_core::llm::{NullDriver, ToolDescriptor};
use taskforge_core::session::SessionActor;
use taskforge_db::queries::{action_log, chat, sessions, tasks};

use crate::capabilities::LocalCapabilities;

pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: OrchestratorConfig,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionActor>>>>,
}

impl AppState {
    async fn actor_for(&self, session_id: Uuid) -> Result<Arc<SessionActor>> {
        if let Some(actor) = self.sessions.read().await.get(&session_id) {
            return Ok(actor.clone());
        }

        let now = now_ms();
        sessions::ensure_session(&self.pool, session_id, now).await?;
        let graph = tasks::load_graph(&self.pool, session_id).await?;
        let history = chat::list_messages(&self.pool, session_id).await?;
        let action_log = action_log::list_entries(&self.pool, session_id, None).await?;

        let documents: Arc<dyn taskforge_core::document_store::DocumentStore> =
            Arc::new(MemoryDocumentStore::new());
        let capabilities = Arc::new(LocalCapabilities::new(documents.clone()));
        let actor = Arc::new(SessionActor::with_state(
            session_id,
            self.config.clone(),
            Arc::new(NullDriver::new(
                "taskforge serve has no model configured; wire a real LlmDriver.",
            )),
            capabilities,
            documents,
            graph,
            history,
            action_log,
        ));

        self.sessions.write().await.insert(session_id, actor.clone());
        Ok(actor)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError(e.into()))
}

#[derive(Serialize)]
struct StateResponse {
    session_id: Uuid,
    status: String,
    task_count: usize,
    percent_complete: u32,
}

async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StateResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let (all_tasks, _) = actor.tasks().await;
    let graph = taskforge_core::graph::TaskGraph::from_tasks(all_tasks.clone());
    let progress = get_progress(&graph, None);
    Ok(Json(StateResponse {
        session_id,
        status: format!("{:?}", actor.status().await),
        task_count: all_tasks.len(),
        percent_complete: progress.percent_complete,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    assistant_message: Option<String>,
    error: Option<String>,
    root_task_id: Uuid,
}

async fn post_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let outcome = actor
        .chat(&req.message, now_ms(), Vec::<ToolDescriptor>::new())
        .await
        .map_err(|e| AppError(anyhow::anyhow!(e)))?;

    chat::append_message(
        &state.pool,
        session_id,
        &taskforge_core::llm::ChatMessage {
            role: taskforge_core::llm::ChatRole::User,
            content: req.message,
        },
        now_ms(),
    )
    .await?;
    if let Some(text) = &outcome.assistant_message {
        chat::append_message(
            &state.pool,
            session_id,
            &taskforge_core::llm::ChatMessage {
                role: taskforge_core::llm::ChatRole::Assistant,
                content: text.clone(),
            },
            now_ms(),
        )
        .await?;
    }
    tasks::save_graph(&state.pool, session_id, &outcome.graph).await?;
    for entry in &outcome.action_log {
        action_log::append_entry(&state.pool, entry).await?;
    }

    Ok(Json(ChatResponse {
        assistant_message: outcome.assistant_message,
        error: outcome.error,
        root_task_id: outcome.root_task_id,
    }))
}

async fn get_chat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<taskforge_core::llm::ChatMessage>>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    Ok(Json(actor.chat_history().await))
}

async fn post_chat_clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    actor.clear_chat().await;
    chat::clear_messages(&state.pool, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Task>>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let (all_tasks, _) = actor.tasks().await;
    Ok(Json(all_tasks))
}

#[derive(Deserialize)]
struct ActionsQuery {
    tool: Option<String>,
    since: Option<i64>,
    limit: Option<usize>,
}

async fn get_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ActionsQuery>,
) -> Result<Json<Vec<taskforge_core::action_log::ActionLogEntry>>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let entries = actor
        .actions(q.tool.as_deref(), q.since, q.limit.unwrap_or(200))
        .await;
    Ok(Json(entries))
}

async fn post_actions_clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    actor.clear_actions().await;
    action_log::clear_entries(&state.pool, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
    version: u64,
}

async fn get_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FilesResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let (files, version) = actor.list_files().await;
    Ok(Json(FilesResponse { files, version }))
}

async fn get_file(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    match actor.read_file(&path).await {
        Some(content) => Ok(Json(serde_json::json!({ "content": content, "path": path }))),
        None => Err(AppError(anyhow::anyhow!("{path} not found"))),
    }
}

async fn put_file(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let version = actor.write_file(&path, body).await;
    Ok(Json(serde_json::json!({ "success": true, "path": path, "version": version })))
}

async fn delete_file(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    if actor.delete_file(&path).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError(anyhow::anyhow!("{path} not found")))
    }
}

#[derive(Deserialize)]
struct SpawnRequest {
    title: String,
    description: Option<String>,
}

#[derive(Serialize)]
struct SpawnResponse {
    task_id: Uuid,
    facet_name: String,
}

async fn post_subagents_spawn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SpawnRequest>,
) -> Result<Json<SpawnResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    let rpc = actor.make_parent_rpc();
    let (task_id, facet_name) = actor
        .spawn_subagent(req.title, req.description, None, rpc, now_ms())
        .await?;
    Ok(Json(SpawnResponse { task_id, facet_name }))
}

#[derive(Serialize)]
struct SubagentsResponse {
    active_count: usize,
}

async fn get_subagents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubagentsResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let actor = state.actor_for(session_id).await?;
    Ok(Json(SubagentsResponse {
        active_count: actor.active_subagent_count().await,
    }))
}

pub fn build_router(pool: PgPool, config: OrchestratorConfig) -> Router {
    let state = AppState {
        pool,
        config,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };

    Router::new()
        .route("/sessions/{id}/state", get(get_state))
        .route("/sessions/{id}/chat", post(post_chat))
        .route("/sessions/{id}/chat/history", get(get_chat_history))
        .route("/sessions/{id}/chat/clear", post(post_chat_clear))
        .route("/sessions/{id}/tasks", get(get_tasks))
        .route("/sessions/{id}/actions", get(get_actions))
        .route("/sessions/{id}/actions/clear", post(post_actions_clear))
        .route("/sessions/{id}/files", get(get_files))
        .route("/sessions/{id}/file/{*path}", get(get_file))
        .route("/sessions/{id}/file/{*path}", put(put_file))
        .route("/sessions/{id}/file/{*path}", delete(delete_file))
        .route("/sessions/{id}/subagents/spawn", post(post_subagents_spawn))
        .route("/sessions/{id}/subagents", get(get_subagents))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_serve(pool: PgPool, config: OrchestratorConfig, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pool, config);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!(%addr, "taskforge serve listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    tracing::info!("taskforge serve shut down");
    Ok(())
}
