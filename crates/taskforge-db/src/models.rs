//! Row <-> domain type conversions (spec §4.4, "L4"). `task_to_row` and
//! `row_to_task` are exact inverses when every field is present (spec
//! §8, law L2).

use std::collections::BTreeSet;
use std::str::FromStr;

use sqlx::FromRow;
use taskforge_core::action_log::ActionLogEntry;
use taskforge_core::graph::{Task, TaskStatus, TaskType};
use taskforge_core::llm::{ChatMessage, ChatRole};
use taskforge_core::recovery::{MessageStatus, ScheduledMessage};
use taskforge_core::subagent::{SpawnProps, SubagentStatus, TrackingRow};
use uuid::Uuid;

/// One row of the `tasks` table (spec §4.4's schema; a `session_id`
/// column scopes rows to a session, since every table in this schema
/// is session-scoped per spec §6.3).
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub task_type: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub dependencies: serde_json::Value,
    pub result: Option<String>,
    pub error: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

pub fn task_to_row(task: &Task, session_id: Uuid) -> TaskRow {
    let dependencies = serde_json::Value::Array(
        task.dependencies
            .iter()
            .map(|id| serde_json::Value::String(id.to_string()))
            .collect(),
    );
    TaskRow {
        id: task.id,
        session_id,
        parent_id: task.parent_id,
        task_type: task.task_type.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        status: task.status.to_string(),
        dependencies,
        result: task.result.clone(),
        error: task.error.clone(),
        assigned_to: task.assigned_to.clone(),
        created_at: task.created_at,
        started_at: task.started_at,
        completed_at: task.completed_at,
        metadata: if task.metadata.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(task.metadata.clone()))
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RowConversionError {
    #[error("invalid task type {0:?}: {1}")]
    TaskType(String, taskforge_core::graph::task::TaskTypeParseError),
    #[error("invalid task status {0:?}: {1}")]
    TaskStatus(String, taskforge_core::graph::task::TaskStatusParseError),
    #[error("invalid dependency uuid: {0}")]
    DependencyUuid(#[from] uuid::Error),
    #[error("dependencies column was not a JSON array of strings")]
    DependenciesShape,
}

pub fn row_to_task(row: &TaskRow) -> Result<Task, RowConversionError> {
    let task_type = TaskType::from_str(&row.task_type)
        .map_err(|e| RowConversionError::TaskType(row.task_type.clone(), e))?;
    let status = TaskStatus::from_str(&row.status)
        .map_err(|e| RowConversionError::TaskStatus(row.status.clone(), e))?;

    let dep_array = row
        .dependencies
        .as_array()
        .ok_or(RowConversionError::DependenciesShape)?;
    let mut dependencies = BTreeSet::new();
    for dep in dep_array {
        let s = dep.as_str().ok_or(RowConversionError::DependenciesShape)?;
        dependencies.insert(Uuid::parse_str(s)?);
    }

    let metadata = match &row.metadata {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };

    Ok(Task {
        id: row.id,
        parent_id: row.parent_id,
        task_type,
        title: row.title.clone(),
        description: row.description.clone(),
        dependencies,
        status,
        result: row.result.clone(),
        error: row.error.clone(),
        assigned_to: row.assigned_to.clone(),
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        metadata,
    })
}

/// One row of the `chat_messages` table (spec §6.3).
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub tool_calls: Option<serde_json::Value>,
    pub timestamp: i64,
}

pub fn chat_message_to_row(msg: &ChatMessage, session_id: Uuid, timestamp: i64) -> ChatMessageRow {
    ChatMessageRow {
        id: Uuid::new_v4(),
        session_id,
        role: match msg.role {
            ChatRole::User => "user".to_string(),
            ChatRole::Assistant => "assistant".to_string(),
            ChatRole::System => "system".to_string(),
        },
        content: msg.content.clone(),
        tool_calls: None,
        timestamp,
    }
}

pub fn row_to_chat_message(row: &ChatMessageRow) -> ChatMessage {
    let role = match row.role.as_str() {
        "assistant" => ChatRole::Assistant,
        "system" => ChatRole::System,
        _ => ChatRole::User,
    };
    ChatMessage {
        role,
        content: row.content.clone(),
    }
}

/// One row of the `action_log` table (spec §3.4).
#[derive(Debug, Clone, FromRow)]
pub struct ActionLogRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: i64,
    pub tool: String,
    pub action: String,
    pub input: String,
    pub output_summary: String,
    pub duration_ms: i64,
    pub success: bool,
    pub error: Option<String>,
    pub message_id: Option<Uuid>,
}

pub fn action_log_entry_to_row(entry: &ActionLogEntry) -> ActionLogRow {
    ActionLogRow {
        id: entry.id,
        session_id: entry.session_id,
        timestamp: entry.timestamp,
        tool: entry.tool.clone(),
        action: entry.action.clone(),
        input: entry.input.clone(),
        output_summary: entry.output_summary.clone(),
        duration_ms: entry.duration_ms,
        success: entry.success,
        error: entry.error.clone(),
        message_id: entry.message_id,
    }
}

pub fn row_to_action_log_entry(row: &ActionLogRow) -> ActionLogEntry {
    ActionLogEntry {
        id: row.id,
        session_id: row.session_id,
        timestamp: row.timestamp,
        tool: row.tool.clone(),
        action: row.action.clone(),
        input: row.input.clone(),
        output_summary: row.output_summary.clone(),
        duration_ms: row.duration_ms,
        success: row.success,
        error: row.error.clone(),
        message_id: row.message_id,
    }
}

/// One row of the `scheduling_messages` table (spec §3.3).
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledMessageRow {
    pub id: Uuid,
    pub status: String,
    pub heartbeat_at: Option<i64>,
    pub checkpoint: Option<String>,
    pub attempt: i32,
    pub task_id: Uuid,
}

pub fn row_to_scheduled_message(row: &ScheduledMessageRow) -> ScheduledMessage {
    let status = match row.status.as_str() {
        "pending" => MessageStatus::Pending,
        "streaming" => MessageStatus::Streaming,
        "complete" => MessageStatus::Complete,
        "error" => MessageStatus::Error,
        _ => MessageStatus::Cancelled,
    };
    ScheduledMessage {
        id: row.id,
        status,
        heartbeat_at: row.heartbeat_at,
        checkpoint: row.checkpoint.clone(),
        attempt: row.attempt.max(0) as u32,
        task_id: row.task_id,
    }
}

/// One row of the `active_subagents` table (spec §3.5).
#[derive(Debug, Clone, FromRow)]
pub struct SubagentRow {
    pub task_id: Uuid,
    pub facet_name: String,
    pub session_id: Uuid,
    pub started_at: i64,
    pub status: String,
    pub props_json: serde_json::Value,
}

pub fn subagent_row_to_tracking_row(row: &SubagentRow) -> Result<TrackingRow, serde_json::Error> {
    let status = match row.status.as_str() {
        "complete" => SubagentStatus::Complete,
        "failed" => SubagentStatus::Failed,
        "interrupted" => SubagentStatus::Interrupted,
        "timeout" => SubagentStatus::Timeout,
        _ => SubagentStatus::Running,
    };
    let props: SpawnProps = serde_json::from_value(row.props_json.clone())?;
    Ok(TrackingRow {
        task_id: row.task_id,
        facet_name: row.facet_name.clone(),
        session_id: row.session_id,
        started_at: row.started_at,
        status,
        props,
    })
}

pub fn tracking_row_to_subagent_row(row: &TrackingRow) -> SubagentRow {
    SubagentRow {
        task_id: row.task_id,
        facet_name: row.facet_name.clone(),
        session_id: row.session_id,
        started_at: row.started_at,
        status: row.status.to_string(),
        props_json: serde_json::to_value(&row.props).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample_task() -> Task {
        let mut dependencies = BTreeSet::new();
        dependencies.insert(Uuid::new_v4());
        dependencies.insert(Uuid::new_v4());
        let mut metadata = serde_json::Map::new();
        metadata.insert("key".to_string(), serde_json::json!("value"));
        Task {
            id: Uuid::new_v4(),
            parent_id: Some(Uuid::new_v4()),
            task_type: TaskType::Review,
            title: "review the patch".to_string(),
            description: Some("look closely".to_string()),
            dependencies,
            status: TaskStatus::Blocked,
            result: Some("looks good".to_string()),
            error: None,
            assigned_to: Some("worker-1".to_string()),
            created_at: 1_000,
            started_at: Some(2_000),
            completed_at: None,
            metadata,
        }
    }

    #[test]
    fn row_round_trips_through_task() {
        let task = sample_task();
        let session_id = Uuid::new_v4();
        let row = task_to_row(&task, session_id);
        let restored = row_to_task(&row).unwrap();
        assert_eq!(restored, task);
        assert_eq!(row.session_id, session_id);
    }

    #[test]
    fn row_round_trips_with_empty_dependencies_and_metadata() {
        let task = Task {
            id: Uuid::new_v4(),
            parent_id: None,
            task_type: TaskType::Plan,
            title: "plan it".to_string(),
            description: None,
            dependencies: BTreeSet::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            assigned_to: None,
            created_at: 500,
            started_at: None,
            completed_at: None,
            metadata: serde_json::Map::new(),
        };
        let row = task_to_row(&task, Uuid::new_v4());
        let restored = row_to_task(&row).unwrap();
        assert_eq!(restored, task);
    }
}
