/// Errors for task domain validation.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),

    #[error("invalid endpoint id: {0}")]
    InvalidEndpointId(String),

    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("invalid task state: {0}")]
    InvalidState(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
