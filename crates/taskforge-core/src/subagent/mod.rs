//! Subagent supervisor (spec §4.7, "L7"): spawn/track/timeout isolated
//! workers, expose the scoped RPC surface they call back through.
//!
//! Grounded on the isolation/harness split the main agent loop uses for
//! its own child processes: a tracking record persisted independently
//! of the worker's liveness, and a fire-and-forget spawn whose result
//! arrives later through polling or a channel.

pub mod rpc;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatRole, LlmDriver, ToolCallResult, TurnRequest};
use rpc::ParentRpc;

/// Local status of a spawned worker (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubagentStatus {
    Running,
    Complete,
    Failed,
    Interrupted,
    Timeout,
}

impl SubagentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SubagentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

impl FromStr for SubagentStatus {
    type Err = SubagentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "interrupted" => Ok(Self::Interrupted),
            "timeout" => Ok(Self::Timeout),
            other => Err(SubagentStatusParseError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubagentStatusParseError(pub String);

impl fmt::Display for SubagentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid subagent status: {:?}", self.0)
    }
}

impl std::error::Error for SubagentStatusParseError {}

/// Props captured at spawn time and handed to the worker (spec
/// §4.7.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnProps {
    pub task_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub context: Option<String>,
    pub parent_session_id: Uuid,
    pub parent_id: Option<Uuid>,
}

/// Durable tracking row (spec §3.5); one per spawned worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRow {
    pub task_id: Uuid,
    pub facet_name: String,
    pub session_id: Uuid,
    pub started_at: i64,
    pub status: SubagentStatus,
    pub props: SpawnProps,
}

/// Outcome a worker reports back to the parent transport (spec
/// §4.7.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentResult {
    pub task_id: Uuid,
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration_ms: i64,
}

/// `true` iff a still-running row has exceeded the execution budget
/// (spec §4.7.3).
pub fn is_timed_out(row: &TrackingRow, now: i64, max_execution_time_ms: i64) -> bool {
    row.status == SubagentStatus::Running && now - row.started_at > max_execution_time_ms
}

/// Delay before the `attempt`'th status check, 0-indexed (spec
/// §4.7.1): the first check waits `initial_delay`, every later one
/// waits `interval`.
pub fn next_check_delay(attempt: u32, initial_delay: Duration, interval: Duration) -> Duration {
    if attempt == 0 {
        initial_delay
    } else {
        interval
    }
}

/// Every `running` row, as it should read after a parent restart: all
/// flipped to `interrupted` (spec §4.7.3). Pure so it's covered without
/// a live supervisor; the async wrapper below applies it to live state
/// and reports which task ids changed, since their graph tasks must
/// also transition to `failed("interrupted")`.
pub fn mark_interrupted(rows: &[TrackingRow]) -> Vec<TrackingRow> {
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            if row.status == SubagentStatus::Running {
                row.status = SubagentStatus::Interrupted;
            }
            row
        })
        .collect()
}

/// Build the focused system prompt a worker sees: only its own task's
/// title, description, and optional context -- no chat history, no
/// sibling tasks (spec §4.7.2).
pub fn build_focused_prompt(props: &SpawnProps) -> String {
    let mut prompt = format!("You are an isolated worker completing one task.\n\nTitle: {}\n", props.title);
    if let Some(description) = &props.description {
        prompt.push_str(&format!("Description: {description}\n"));
    }
    if let Some(context) = &props.context {
        prompt.push_str(&format!("Context: {context}\n"));
    }
    prompt
}

/// Step budget for a subagent worker (spec §4.7.2: "step budget ≤
/// 15").
pub const SUBAGENT_STEP_BUDGET: u32 = 15;

/// Drive a worker's isolated LLM loop to completion, routing every tool
/// call through the scoped RPC surface rather than the full capability
/// set (spec §4.7.2, §4.7.4).
pub async fn run_worker(
    props: SpawnProps,
    driver: Arc<dyn LlmDriver>,
    rpc: Arc<dyn ParentRpc>,
    started_at_ms: i64,
    now_ms: impl Fn() -> i64,
) -> SubagentResult {
    let system_prompt = build_focused_prompt(&props);
    let request = TurnRequest {
        system_prompt,
        history: vec![ChatMessage {
            role: ChatRole::User,
            content: props.title.clone(),
        }],
        tools: Vec::new(),
        step_budget: SUBAGENT_STEP_BUDGET,
    };

    let mut prior_results: Vec<ToolCallResult> = Vec::new();
    for _ in 0..SUBAGENT_STEP_BUDGET {
        let step = match driver.step(&request, &prior_results).await {
            Ok(step) => step,
            Err(err) => {
                return SubagentResult {
                    task_id: props.task_id,
                    success: false,
                    result: None,
                    error: Some(err.to_string()),
                    duration_ms: now_ms() - started_at_ms,
                };
            }
        };

        if let Some(final_text) = step.final_text {
            return SubagentResult {
                task_id: props.task_id,
                success: true,
                result: Some(final_text),
                error: None,
                duration_ms: now_ms() - started_at_ms,
            };
        }

        prior_results.clear();
        for call in step.tool_calls {
            let output = dispatch_via_rpc(&rpc, &call.tool, &call.input).await;
            prior_results.push(ToolCallResult {
                call_id: call.id,
                output,
            });
        }
    }

    SubagentResult {
        task_id: props.task_id,
        success: false,
        result: None,
        error: Some("step budget exhausted".to_string()),
        duration_ms: now_ms() - started_at_ms,
    }
}

async fn dispatch_via_rpc(rpc: &Arc<dyn ParentRpc>, tool: &str, input: &serde_json::Value) -> serde_json::Value {
    match tool {
        "readFile" => {
            let path = input.get("path").and_then(|p| p.as_str()).unwrap_or("");
            match rpc.read_file(path).await {
                Some(content) => serde_json::json!({"content": content, "path": path}),
                None => serde_json::json!({"error": "not found"}),
            }
        }
        "writeFile" => {
            let path = input.get("path").and_then(|p| p.as_str()).unwrap_or("").to_string();
            let content = input.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string();
            let version = rpc.write_file(&path, content).await;
            serde_json::json!({"success": true, "path": path, "version": version})
        }
        "deleteFile" => {
            let path = input.get("path").and_then(|p| p.as_str()).unwrap_or("");
            serde_json::json!({"deleted": rpc.delete_file(path).await})
        }
        "listFiles" => serde_json::json!({"files": rpc.list_files().await}),
        "shellExec" => {
            let command = input.get("command").and_then(|c| c.as_str()).unwrap_or("").to_string();
            match rpc
                .shell_exec(rpc::ShellExecInput {
                    command,
                    cwd: None,
                    env: HashMap::new(),
                })
                .await
            {
                Ok(out) => serde_json::json!({"stdout": out.stdout, "stderr": out.stderr, "exitCode": out.exit_code}),
                Err(e) => serde_json::json!({"error": e}),
            }
        }
        "webSearch" => {
            let query = input.get("query").and_then(|q| q.as_str()).unwrap_or("");
            match rpc.web_search(query).await {
                Ok(v) => v,
                Err(e) => serde_json::json!({"error": e}),
            }
        }
        other => serde_json::json!({"error": format!("unknown tool for subagent: {other}")}),
    }
}

/// In-process supervisor: tracks rows, spawns workers as detached
/// tokio tasks, and drains their results through a channel (spec
/// §4.7.1: spawn is fire-and-forget from the parent's perspective).
pub struct Supervisor {
    rows: RwLock<HashMap<Uuid, TrackingRow>>,
    results_tx: mpsc::UnboundedSender<SubagentResult>,
}

impl Supervisor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SubagentResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rows: RwLock::new(HashMap::new()),
                results_tx: tx,
            },
            rx,
        )
    }

    /// Record the tracking row and spawn the worker. Returns the
    /// generated facet name immediately (spec §4.7.1).
    pub async fn spawn(
        &self,
        props: SpawnProps,
        driver: Arc<dyn LlmDriver>,
        rpc: Arc<dyn ParentRpc>,
        started_at_ms: i64,
    ) -> String {
        let facet_name = format!("subagent-{}", props.task_id);
        let row = TrackingRow {
            task_id: props.task_id,
            facet_name: facet_name.clone(),
            session_id: props.parent_session_id,
            started_at: started_at_ms,
            status: SubagentStatus::Running,
            props: props.clone(),
        };
        self.rows.write().await.insert(row.task_id, row);

        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = run_worker(props, driver, rpc, started_at_ms, default_now_ms).await;
            let _ = tx.send(result);
        });

        facet_name
    }

    pub async fn status(&self, task_id: Uuid) -> Option<TrackingRow> {
        self.rows.read().await.get(&task_id).cloned()
    }

    pub async fn apply_result(&self, result: &SubagentResult) {
        if let Some(row) = self.rows.write().await.get_mut(&result.task_id) {
            row.status = if result.success {
                SubagentStatus::Complete
            } else {
                SubagentStatus::Failed
            };
        }
    }

    pub async fn mark_timed_out(&self, task_id: Uuid) {
        if let Some(row) = self.rows.write().await.get_mut(&task_id) {
            row.status = SubagentStatus::Timeout;
        }
    }

    /// Apply [`mark_interrupted`] to every tracked row, returning the
    /// task ids that flipped so the caller can fail their graph tasks.
    pub async fn interrupt_all_running(&self) -> Vec<Uuid> {
        let mut rows = self.rows.write().await;
        let current: Vec<TrackingRow> = rows.values().cloned().collect();
        let updated = mark_interrupted(&current);
        let mut changed = Vec::new();
        for row in updated {
            if row.status == SubagentStatus::Interrupted {
                changed.push(row.task_id);
            }
            rows.insert(row.task_id, row);
        }
        changed
    }

    pub async fn active_count(&self) -> usize {
        self.rows
            .read()
            .await
            .values()
            .filter(|r| r.status == SubagentStatus::Running)
            .count()
    }
}

fn default_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NullDriver;

    struct StubRpc;

    #[async_trait::async_trait]
    impl ParentRpc for StubRpc {
        async fn read_file(&self, _path: &str) -> Option<String> {
            None
        }
        async fn write_file(&self, _path: &str, _content: String) -> u64 {
            1
        }
        async fn delete_file(&self, _path: &str) -> bool {
            false
        }
        async fn list_files(&self) -> Vec<String> {
            vec![]
        }
        async fn shell_exec(&self, _input: rpc::ShellExecInput) -> Result<rpc::ShellExecOutput, String> {
            Ok(rpc::ShellExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
        async fn fetch(&self, _input: crate::capability::FetchInput) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({}))
        }
        async fn web_search(&self, _query: &str) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({"results": []}))
        }
    }

    fn sample_props() -> SpawnProps {
        SpawnProps {
            task_id: Uuid::new_v4(),
            title: "do the thing".into(),
            description: Some("a focused task".into()),
            context: None,
            parent_session_id: Uuid::new_v4(),
            parent_id: None,
        }
    }

    #[test]
    fn timeout_check_respects_budget() {
        let row = TrackingRow {
            task_id: Uuid::new_v4(),
            facet_name: "f".into(),
            session_id: Uuid::new_v4(),
            started_at: 0,
            status: SubagentStatus::Running,
            props: sample_props(),
        };
        assert!(!is_timed_out(&row, 500_000, 600_000));
        assert!(is_timed_out(&row, 700_000, 600_000));
    }

    #[test]
    fn check_schedule_uses_initial_delay_then_interval() {
        let initial = Duration::from_secs(30);
        let interval = Duration::from_secs(60);
        assert_eq!(next_check_delay(0, initial, interval), initial);
        assert_eq!(next_check_delay(1, initial, interval), interval);
        assert_eq!(next_check_delay(5, initial, interval), interval);
    }

    #[test]
    fn mark_interrupted_only_touches_running_rows() {
        let mut running = TrackingRow {
            task_id: Uuid::new_v4(),
            facet_name: "a".into(),
            session_id: Uuid::new_v4(),
            started_at: 0,
            status: SubagentStatus::Running,
            props: sample_props(),
        };
        let mut complete = running.clone();
        complete.task_id = Uuid::new_v4();
        complete.status = SubagentStatus::Complete;

        let updated = mark_interrupted(&[running.clone(), complete.clone()]);
        running.status = SubagentStatus::Interrupted;
        assert_eq!(updated[0].status, SubagentStatus::Interrupted);
        assert_eq!(updated[1].status, SubagentStatus::Complete);
    }

    #[tokio::test]
    async fn worker_returns_final_text_from_null_driver() {
        let props = sample_props();
        let result = run_worker(
            props.clone(),
            Arc::new(NullDriver::new("the answer")),
            Arc::new(StubRpc),
            0,
            || 1_500,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.result.as_deref(), Some("the answer"));
        assert_eq!(result.duration_ms, 1_500);
    }

    #[tokio::test]
    async fn supervisor_spawn_and_drain_result() {
        let (supervisor, mut rx) = Supervisor::new();
        let props = sample_props();
        let task_id = props.task_id;
        supervisor
            .spawn(props, Arc::new(NullDriver::new("done")), Arc::new(StubRpc), 0)
            .await;

        assert_eq!(supervisor.active_count().await, 1);

        let result = rx.recv().await.unwrap();
        assert_eq!(result.task_id, task_id);
        supervisor.apply_result(&result).await;

        let row = supervisor.status(task_id).await.unwrap();
        assert_eq!(row.status, SubagentStatus::Complete);
        assert_eq!(supervisor.active_count().await, 0);
    }
}
