use perfbench_domain::{DomainError, TaskId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("corrupt task record {id}: {reason}")]
    Corrupt { id: TaskId, reason: String },

    #[error("{0}")]
    Other(String),
}

impl TaskStoreError {
    /// True when the write was refused because the task already moved on.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::Domain(DomainError::InvalidTransition { .. }))
    }
}
