use perfbench_domain::{OwnerId, Task, TaskState};

/// Query over an owner's tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub owner: OwnerId,
    pub state: Option<TaskState>,
    /// Case-insensitive substring over model and dataset name.
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl TaskFilter {
    #[must_use]
    pub fn for_owner(owner: OwnerId) -> Self {
        Self {
            owner,
            state: None,
            search: None,
            page: 1,
            per_page: 10,
        }
    }

    /// Owner, state and search all match.
    pub fn matches(&self, task: &Task) -> bool {
        if task.owner_id != self.owner {
            return false;
        }
        if let Some(state) = self.state
            && task.state != state
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                task.model_name.to_lowercase().contains(&needle)
                    || task.dataset_name.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }

    /// Number of leading matches to skip.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.limit()
    }

    pub fn limit(&self) -> usize {
        self.per_page.max(1) as usize
    }

    /// Cut one page out of matches already sorted newest first.
    pub fn paginate(&self, sorted: Vec<Task>) -> TaskPage {
        let total = sorted.len();
        let tasks = sorted
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect();
        TaskPage { tasks, total }
    }
}

/// One page of tasks plus the number of matches across all pages.
#[derive(Debug, Clone, Default)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: usize,
}

/// Newest first; id breaks ties between tasks created in the same millisecond.
pub fn newest_first(a: &Task, b: &Task) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfbench_domain::{DatasetRef, EndpointId, NewTask, RequestBounds, TaskConfig, TaskId};

    fn task(id: u64, owner: u64, model: &str, dataset: &str, created_at: u64) -> Task {
        Task::from_new(
            TaskId::new(id),
            NewTask {
                owner_id: OwnerId::new(owner),
                model_name: model.to_string(),
                dataset_name: dataset.to_string(),
                config: TaskConfig {
                    endpoint_id: EndpointId::new(1),
                    dataset: DatasetRef::BuiltIn,
                    concurrency: 1,
                    total_requests: 1,
                    bounds: RequestBounds::default(),
                },
                created_at,
            },
        )
    }

    #[test]
    fn matches_owner_state_and_search() {
        let t = task(1, 7, "Qwen2.5-7B", "openqa", 1);
        let mut filter = TaskFilter::for_owner(OwnerId::new(7));
        assert!(filter.matches(&t));

        filter.search = Some("qwen".to_string());
        assert!(filter.matches(&t));
        filter.search = Some("OPENQA".to_string());
        assert!(filter.matches(&t));
        filter.search = Some("llama".to_string());
        assert!(!filter.matches(&t));

        filter.search = None;
        filter.state = Some(TaskState::Running);
        assert!(!filter.matches(&t));

        assert!(!TaskFilter::for_owner(OwnerId::new(8)).matches(&t));
    }

    #[test]
    fn paginate_counts_all_matches() {
        let mut tasks: Vec<Task> = (1..=5).map(|i| task(i, 1, "m", "d", i * 10)).collect();
        tasks.sort_by(newest_first);
        let filter = TaskFilter {
            page: 2,
            per_page: 2,
            ..TaskFilter::for_owner(OwnerId::new(1))
        };
        let page = filter.paginate(tasks);
        assert_eq!(page.total, 5);
        let ids: Vec<u64> = page.tasks.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn page_zero_is_first_page() {
        let filter = TaskFilter {
            page: 0,
            per_page: 0,
            ..TaskFilter::for_owner(OwnerId::new(1))
        };
        assert_eq!(filter.offset(), 0);
        assert_eq!(filter.limit(), 1);
    }
}
