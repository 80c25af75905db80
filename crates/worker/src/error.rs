use thiserror::Error;

/// Failure raised by a benchmark engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine itself reported a failure.
    #[error("{0}")]
    Failed(String),

    #[error("failed to start engine: {0}")]
    Spawn(std::io::Error),

    #[error("engine exited with status {code}: {stderr}")]
    Exit { code: String, stderr: String },

    #[error("unusable engine output: {0}")]
    Output(String),

    #[error("engine run cancelled")]
    Cancelled,
}

/// The worker could not complete its handoff.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("outcome file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("outcome encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("blocking file task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
