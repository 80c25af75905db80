use async_trait::async_trait;

use perfbench_domain::{NewTask, OwnerId, Task, TaskId, Transition};

use crate::error::TaskStoreError;
use crate::filter::{TaskFilter, TaskPage};

/// Durable task records. Each call is atomic for its task; no call spans tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a `pending` task and assign its id.
    async fn insert(&self, task: NewTask) -> Result<Task, TaskStoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError>;

    /// Apply a lifecycle transition together with its payload.
    ///
    /// Rejects transitions the state machine forbids with
    /// `TaskStoreError::Domain(DomainError::InvalidTransition)` and leaves
    /// the record untouched.
    async fn update_state(&self, id: TaskId, transition: Transition)
    -> Result<Task, TaskStoreError>;

    /// Tasks matching `filter`, newest first.
    async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, TaskStoreError>;

    /// Remove a task owned by `owner`. Returns whether a record was removed.
    async fn delete(&self, id: TaskId, owner: OwnerId) -> Result<bool, TaskStoreError>;

    async fn ping(&self) -> Result<bool, TaskStoreError>;

    async fn close(&self) -> Result<(), TaskStoreError>;
}
