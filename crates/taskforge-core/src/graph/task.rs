//! The task entity (spec §3.1) and its state machine (spec §4.3.3).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a task's intent. Informational only -- the engine
/// does not branch on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Explore,
    Code,
    Test,
    Review,
    Plan,
    Fix,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explore => "explore",
            Self::Code => "code",
            Self::Test => "test",
            Self::Review => "review",
            Self::Plan => "plan",
            Self::Fix => "fix",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskType {
    type Err = TaskTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explore" => Ok(Self::Explore),
            "code" => Ok(Self::Code),
            "test" => Ok(Self::Test),
            "review" => Ok(Self::Review),
            "plan" => Ok(Self::Plan),
            "fix" => Ok(Self::Fix),
            other => Err(TaskTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskType`] string.
#[derive(Debug, Clone)]
pub struct TaskTypeParseError(pub String);

impl fmt::Display for TaskTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task type: {:?}", self.0)
    }
}

impl std::error::Error for TaskTypeParseError {}

/// Status of a task (spec §4.3.3). The allowed transition graph is
/// enforced by [`super::ops`], never by this type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Complete,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Active statuses are the ones counted toward an in-flight graph.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Blocked)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

/// A task: the unit of work in the graph (spec §3.1).
///
/// `dependencies` is frozen at construction time -- nothing after
/// [`super::ops::add_task`] mutates it, per spec §9 ("Implementations
/// must not expose a mutable dependency list after insertion").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub task_type: TaskType,
    pub title: String,
    pub description: Option<String>,
    pub dependencies: BTreeSet<Uuid>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// `true` iff this task has no parent (a session root).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input to [`super::ops::create_task`].
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub task_type: Option<TaskType>,
    pub title: String,
    pub description: Option<String>,
    pub dependencies: BTreeSet<Uuid>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
