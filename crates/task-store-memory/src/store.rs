use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use perfbench_domain::{NewTask, OwnerId, Task, TaskId, Transition};
use perfbench_task_store::{TaskFilter, TaskPage, TaskStore, TaskStoreError, newest_first};

struct Tables {
    next_id: u64,
    tasks: HashMap<TaskId, Task>,
}

/// Task store held in process memory. Clones share the same tables.
#[derive(Clone)]
pub struct MemoryTaskStore {
    tables: Arc<Mutex<Tables>>,
    closed: Arc<AtomicBool>,
}

impl MemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                next_id: 1,
                tasks: HashMap::new(),
            })),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_closed(&self) -> Result<(), TaskStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TaskStoreError::Other("store is closed".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: NewTask) -> Result<Task, TaskStoreError> {
        self.check_closed()?;
        let mut tables = self.tables.lock().await;
        let id = TaskId::new(tables.next_id);
        tables.next_id += 1;
        let task = Task::from_new(id, task);
        tables.tasks.insert(id, task.clone());
        tracing::debug!(task_id = %id, "task inserted");
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        self.check_closed()?;
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn update_state(
        &self,
        id: TaskId,
        transition: Transition,
    ) -> Result<Task, TaskStoreError> {
        self.check_closed()?;
        let mut tables = self.tables.lock().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or(TaskStoreError::NotFound(id))?;
        // Apply to a copy so a rejected transition leaves the record untouched.
        let mut next = task.clone();
        next.apply(transition)?;
        *task = next.clone();
        Ok(next)
    }

    async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, TaskStoreError> {
        self.check_closed()?;
        let tables = self.tables.lock().await;
        let mut matches: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matches.sort_by(newest_first);
        Ok(filter.paginate(matches))
    }

    async fn delete(&self, id: TaskId, owner: OwnerId) -> Result<bool, TaskStoreError> {
        self.check_closed()?;
        let mut tables = self.tables.lock().await;
        match tables.tasks.get(&id) {
            Some(task) if task.owner_id == owner => {
                tables.tasks.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<bool, TaskStoreError> {
        Ok(!self.closed.load(Ordering::Acquire))
    }

    async fn close(&self) -> Result<(), TaskStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
