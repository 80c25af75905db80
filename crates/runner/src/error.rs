use perfbench_domain::{DomainError, TaskId, TaskState};
use perfbench_task_store::TaskStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    /// The request was rejected before any task was created.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task {id} is {state}, not pending")]
    NotPending { id: TaskId, state: TaskState },

    /// Another launch of this task is queued or running.
    #[error("task {0} already has a launch in progress")]
    AlreadyLaunched(TaskId),

    #[error("launch queue is full")]
    QueueFull,

    #[error("failed to launch worker: {0}")]
    Spawn(String),

    #[error(transparent)]
    Domain(DomainError),

    #[error("task store: {0}")]
    Store(#[from] TaskStoreError),
}

impl LaunchError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<DomainError> for LaunchError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Domain(other),
        }
    }
}
