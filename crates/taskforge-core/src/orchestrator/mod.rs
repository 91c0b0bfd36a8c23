//! The per-user-message orchestrator loop (spec §4.6, "L6"): create a
//! root task, drive the LLM with tools, record every tool call, close
//! the root task out. One call to [`run_turn`] is one orchestrator
//! turn; the session façade (L9) enforces the single-flight-per-session
//! rule around it.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::action_log::{derive_success, summarize, truncate_input, ActionLogEntry};
use crate::capability::{
    BashInput, CapabilitySet, EditFileInput, ExecuteCodeInput, FetchInput, ReadFileInput,
    SearchInput, WriteFileInput,
};
use crate::config::OrchestratorConfig;
use crate::graph::{self, CreateTaskInput, Task, TaskGraph, TaskType};
use crate::llm::{ChatMessage, ChatRole, LlmDriver, ToolCallResult, TurnRequest};

/// Title cap for a root task minted from a user message (spec §4.6
/// step 3).
const ROOT_TITLE_CHARS: usize = 47;
/// Result cap when a turn completes (spec §4.6 step 7).
const RESULT_CHARS: usize = 200;

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    format!("{head}…")
}

/// What one call to [`run_turn`] produced: the new graph state, any
/// action log entries recorded along the way, and either an assistant
/// message or an error surfaced on the chat channel (spec §7:
/// "{type: 'error', error: message}").
pub struct TurnOutcome {
    pub graph: TaskGraph,
    pub root_task_id: Uuid,
    pub action_log: Vec<ActionLogEntry>,
    pub assistant_message: Option<String>,
    pub error: Option<String>,
}

/// Bound `history` to the last `limit` messages (spec §4.6 step 1).
pub fn bounded_history(history: &[ChatMessage], limit: usize) -> Vec<ChatMessage> {
    if history.len() <= limit {
        history.to_vec()
    } else {
        history[history.len() - limit..].to_vec()
    }
}

/// Run one orchestrator turn for `user_message` against `graph`.
///
/// `now` and `entry_id_factory`/`call_id_factory` are passed in rather
/// than read from the clock so the loop stays a pure function of its
/// inputs for tests, matching the "headless driver" requirement (spec
/// §1).
#[allow(clippy::too_many_arguments)]
pub async fn run_turn(
    graph: &TaskGraph,
    history: &[ChatMessage],
    user_message: &str,
    session_id: Uuid,
    now: i64,
    config: &OrchestratorConfig,
    driver: &Arc<dyn LlmDriver>,
    capabilities: &Arc<dyn CapabilitySet>,
    tools: Vec<crate::llm::ToolDescriptor>,
) -> TurnOutcome {
    let bounded = bounded_history(history, config.max_context_messages);

    let title = truncate_chars(user_message, ROOT_TITLE_CHARS);
    let root = graph::create_task(
        CreateTaskInput {
            task_type: Some(TaskType::Code),
            title,
            ..Default::default()
        },
        now,
    );
    let root_id = root.id;

    let mut current_graph = match graph::add_task(graph, root, config.graph_limits()) {
        Ok(g) => g,
        Err(err) => {
            return TurnOutcome {
                graph: graph.clone(),
                root_task_id: root_id,
                action_log: Vec::new(),
                assistant_message: None,
                error: Some(err.to_string()),
            };
        }
    };

    current_graph = match graph::start(&current_graph, root_id, Some(session_id.to_string()), now) {
        Some(g) => g,
        None => current_graph,
    };

    let system_prompt = "You are a coding agent orchestrating a task graph.".to_string();
    let mut request = TurnRequest {
        system_prompt,
        history: bounded,
        tools,
        step_budget: config.max_tool_rounds,
    };
    request.history.push(ChatMessage {
        role: ChatRole::User,
        content: user_message.to_string(),
    });

    let mut action_log = Vec::new();
    let mut prior_results: Vec<ToolCallResult> = Vec::new();

    for _step in 0..config.max_tool_rounds {
        let step = match driver.step(&request, &prior_results).await {
            Ok(step) => step,
            Err(err) => {
                return TurnOutcome {
                    graph: current_graph,
                    root_task_id: root_id,
                    action_log,
                    assistant_message: None,
                    error: Some(err.to_string()),
                };
            }
        };

        if let Some(final_text) = step.final_text {
            let result = truncate_chars(&final_text, RESULT_CHARS);
            current_graph =
                graph::complete(&current_graph, root_id, Some(result), now).unwrap_or(current_graph);
            return TurnOutcome {
                graph: current_graph,
                root_task_id: root_id,
                action_log,
                assistant_message: Some(final_text),
                error: None,
            };
        }

        prior_results.clear();
        for call in step.tool_calls {
            let started = Instant::now();
            let outcome = dispatch_tool(capabilities, &call.tool, &call.input).await;
            let duration_ms = started.elapsed().as_millis() as i64;

            let (output, success, error) = match outcome {
                Ok(v) => {
                    let success = derive_success(&v);
                    (v, success, None)
                }
                Err(e) => (
                    serde_json::json!({"error": e.message, "code": e.code}),
                    false,
                    Some(e.message),
                ),
            };
            let summary = summarize(&call.tool, &output);

            action_log.push(ActionLogEntry {
                id: Uuid::new_v4(),
                session_id,
                timestamp: now,
                tool: call.tool.clone(),
                action: call.tool.clone(),
                input: truncate_input(&call.input.to_string()),
                output_summary: summary,
                duration_ms,
                success,
                error,
                message_id: None,
            });

            prior_results.push(ToolCallResult {
                call_id: call.id,
                output,
            });
        }
    }

    TurnOutcome {
        graph: current_graph,
        root_task_id: root_id,
        action_log,
        assistant_message: None,
        error: Some("max tool rounds exceeded".to_string()),
    }
}

async fn dispatch_tool(
    capabilities: &Arc<dyn CapabilitySet>,
    tool: &str,
    input: &Value,
) -> Result<Value, crate::capability::ToolError> {
    match tool {
        "bash" => {
            capabilities
                .bash(BashInput {
                    command: field_str(input, "command"),
                })
                .await
        }
        "readFile" => {
            capabilities
                .read_file(ReadFileInput {
                    path: field_str(input, "path"),
                })
                .await
        }
        "writeFile" => {
            capabilities
                .write_file(WriteFileInput {
                    path: field_str(input, "path"),
                    content: field_str(input, "content"),
                })
                .await
        }
        "editFile" => {
            capabilities
                .edit_file(EditFileInput {
                    path: field_str(input, "path"),
                    search: field_str(input, "search"),
                    replace: field_str(input, "replace"),
                })
                .await
        }
        "listFiles" => capabilities.list_files().await,
        "fetch" => {
            capabilities
                .fetch(FetchInput {
                    url: field_str(input, "url"),
                    method: input.get("method").and_then(|v| v.as_str()).map(str::to_string),
                    headers: input
                        .get("headers")
                        .and_then(|v| v.as_object())
                        .cloned(),
                })
                .await
        }
        "webSearch" => {
            capabilities
                .web_search(SearchInput {
                    query: field_str(input, "query"),
                    freshness: input.get("freshness").and_then(|v| v.as_str()).map(str::to_string),
                    count: input.get("count").and_then(|v| v.as_u64()).map(|v| v as u32),
                })
                .await
        }
        "newsSearch" => {
            capabilities
                .news_search(SearchInput {
                    query: field_str(input, "query"),
                    freshness: input.get("freshness").and_then(|v| v.as_str()).map(str::to_string),
                    count: input.get("count").and_then(|v| v.as_u64()).map(|v| v as u32),
                })
                .await
        }
        "executeCode" => {
            capabilities
                .execute_code(ExecuteCodeInput {
                    code: field_str(input, "code"),
                    modules: input
                        .get("modules")
                        .and_then(|v| v.as_array())
                        .map(|a| a.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                    timeout_ms: input.get("timeoutMs").and_then(|v| v.as_u64()),
                })
                .await
        }
        other => Err(crate::capability::ToolError {
            code: "unknown_tool".to_string(),
            message: format!("unknown tool: {other}"),
        }),
    }
}

fn field_str(v: &Value, key: &str) -> String {
    v.get(key).and_then(|f| f.as_str()).unwrap_or("").to_string()
}

/// Every `in_progress` descendant of `root`, plus `root` itself, failed
/// or cancelled (spec §5's cancellation semantics): transition each to
/// `cancelled`, skipping any that are already terminal.
pub fn cancel_turn(graph: &TaskGraph, root_id: Uuid, now: i64) -> TaskGraph {
    let mut next = graph.clone();
    let mut ids = vec![root_id];
    ids.extend(graph::get_descendants(graph, root_id));
    for id in ids {
        if let Some(cancelled) = graph::cancel(&next, id, now) {
            next = cancelled;
        }
    }
    next
}

/// `true` iff `task` looks like a turn left dangling by a crash (spec
/// §4.6 step 8: "leave root task in_progress so recovery can reclaim
/// it").
pub fn is_reclaimable_root(task: &Task) -> bool {
    task.is_root() && task.status == crate::graph::TaskStatus::InProgress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ToolOutcome;
    use crate::llm::NullDriver;
    use async_trait::async_trait;

    struct NoopCapabilities;

    #[async_trait]
    impl CapabilitySet for NoopCapabilities {
        async fn bash(&self, _input: BashInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn read_file(&self, _input: ReadFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn write_file(&self, _input: WriteFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn edit_file(&self, _input: EditFileInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn list_files(&self) -> ToolOutcome {
            Ok(serde_json::json!({"files": []}))
        }
        async fn fetch(&self, _input: FetchInput) -> ToolOutcome {
            Ok(serde_json::json!({}))
        }
        async fn web_search(&self, _input: SearchInput) -> ToolOutcome {
            Ok(serde_json::json!({"results": []}))
        }
        async fn news_search(&self, _input: SearchInput) -> ToolOutcome {
            Ok(serde_json::json!({"results": []}))
        }
        async fn execute_code(&self, _input: ExecuteCodeInput) -> ToolOutcome {
            Ok(serde_json::json!({"success": true}))
        }
    }

    #[tokio::test]
    async fn turn_with_null_driver_completes_root_immediately() {
        let graph = TaskGraph::new();
        let config = OrchestratorConfig::default();
        let driver: Arc<dyn LlmDriver> = Arc::new(NullDriver::new("all done"));
        let capabilities: Arc<dyn CapabilitySet> = Arc::new(NoopCapabilities);

        let outcome = run_turn(
            &graph,
            &[],
            "please refactor the parser",
            Uuid::new_v4(),
            1_000,
            &config,
            &driver,
            &capabilities,
            vec![],
        )
        .await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.assistant_message.as_deref(), Some("all done"));
        let root = outcome.graph.get(outcome.root_task_id).unwrap();
        assert_eq!(root.status, crate::graph::TaskStatus::Complete);
        assert_eq!(root.result.as_deref(), Some("all done"));
        assert!(outcome.action_log.is_empty());
    }

    #[test]
    fn bounded_history_keeps_only_the_tail() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage {
                role: ChatRole::User,
                content: i.to_string(),
            })
            .collect();
        let bounded = bounded_history(&history, 3);
        assert_eq!(bounded.len(), 3);
        assert_eq!(bounded[0].content, "7");
        assert_eq!(bounded[2].content, "9");
    }

    #[test]
    fn long_message_title_is_truncated() {
        let message = "x".repeat(100);
        let title = truncate_chars(&message, ROOT_TITLE_CHARS);
        assert_eq!(title.chars().count(), ROOT_TITLE_CHARS + 1);
        assert!(title.ends_with('…'));
    }
}
