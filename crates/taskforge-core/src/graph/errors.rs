//! Validation errors returned by [`super::ops::add_task`] (spec §4.3.1,
//! §7). The graph is left unchanged whenever one of these is returned.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task id {0} already exists in the graph")]
    DuplicateId(Uuid),

    #[error("parent task {0} does not exist")]
    MissingParent(Uuid),

    #[error("dependency task {0} does not exist")]
    MissingDependency(Uuid),

    #[error("graph already has the maximum of {max} tasks")]
    MaxTotalExceeded { max: usize },

    #[error("depth {depth} exceeds the maximum of {max}")]
    MaxDepthExceeded { depth: u32, max: u32 },

    #[error("parent {parent} already has the maximum of {max} children")]
    MaxSubtasksExceeded { parent: Uuid, max: usize },

    #[error("dependency {dependency} on ancestor {ancestor} would create a cycle")]
    CycleDetected { dependency: Uuid, ancestor: Uuid },
}

impl ValidationError {
    /// Short machine-readable kind, matching the names in spec §4.3.1's
    /// check table (`duplicate_id`, `missing_parent`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "duplicate_id",
            Self::MissingParent(_) => "missing_parent",
            Self::MissingDependency(_) => "missing_dependency",
            Self::MaxTotalExceeded { .. } => "max_total_exceeded",
            Self::MaxDepthExceeded { .. } => "max_depth_exceeded",
            Self::MaxSubtasksExceeded { .. } => "max_subtasks_exceeded",
            Self::CycleDetected { .. } => "cycle_detected",
        }
    }
}
