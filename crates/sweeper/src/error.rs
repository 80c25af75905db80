use perfbench_task_store::TaskStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweeperError {
    #[error("task store: {0}")]
    Store(#[from] TaskStoreError),

    #[error("outcome directory: {0}")]
    Io(#[from] std::io::Error),
}
