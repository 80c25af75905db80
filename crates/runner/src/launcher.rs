use std::path::PathBuf;
use std::sync::Arc;

use perfbench_domain::{
    DatasetRef, DatasetSource, EndpointId, EngineConfig, EngineTarget, NewTask, OwnerId,
    RequestBounds, Task, TaskConfig, TaskId, TaskState, Transition, engine, now_millis,
};
use perfbench_task_store::{TaskFilter, TaskPage, TaskStore};
use perfbench_worker::outcome_file;

use crate::catalog::{Catalog, Endpoint};
use crate::config::RunnerConfig;
use crate::error::LaunchError;
use crate::spawn::WorkerJob;
use crate::supervisor::{LaunchClaim, SubmitError, Supervisor};

/// Fields of a benchmark request as the caller sends them.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub owner_id: OwnerId,
    pub endpoint_id: EndpointId,
    /// Raw dataset id; `-1` selects the built-in dataset.
    pub dataset_id: i64,
    pub concurrency: u32,
    pub total_requests: u32,
    pub min_prompt_length: Option<u32>,
    pub max_prompt_length: Option<u32>,
    pub max_tokens: Option<u32>,
    /// JSON object text merged into every request body.
    pub extra_args: Option<String>,
}

/// Validates requests, creates tasks, and hands launches to the supervisor.
pub struct Launcher {
    store: Arc<dyn TaskStore>,
    catalog: Arc<dyn Catalog>,
    supervisor: Supervisor,
    outcome_dir: PathBuf,
}

impl Launcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        catalog: Arc<dyn Catalog>,
        supervisor: Supervisor,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            supervisor,
            outcome_dir: config.outcome_dir.clone(),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Validate and insert a `pending` task. Never waits on the benchmark.
    ///
    /// Validation failures name the offending field and leave the store untouched.
    pub async fn create_task(&self, req: CreateTaskRequest) -> Result<Task, LaunchError> {
        let endpoint = self.resolve_endpoint(req.owner_id, req.endpoint_id).await?;
        let dataset = DatasetRef::from_raw(req.dataset_id)
            .map_err(|e| LaunchError::validation("dataset_id", e.to_string()))?;
        let source = self.resolve_dataset(req.owner_id, dataset).await?;

        let config = TaskConfig {
            endpoint_id: req.endpoint_id,
            dataset,
            concurrency: req.concurrency,
            total_requests: req.total_requests,
            bounds: RequestBounds {
                min_prompt_length: req.min_prompt_length,
                max_prompt_length: req.max_prompt_length,
                max_tokens: req.max_tokens,
                extra_args: RequestBounds::parse_extra_args(req.extra_args.as_deref())?,
            },
        };
        config.validate()?;

        let task = self
            .store
            .insert(NewTask {
                owner_id: req.owner_id,
                model_name: endpoint.name,
                dataset_name: source.display_name().to_string(),
                config,
                created_at: now_millis(),
            })
            .await?;
        tracing::info!(task_id = %task.id, owner_id = %task.owner_id, "task created");
        Ok(task)
    }

    /// Build the engine configuration and queue the worker and its monitor.
    ///
    /// Returns once queued. Any failure here moves the task `pending -> failed`.
    pub async fn start_execution(&self, task_id: TaskId) -> Result<PathBuf, LaunchError> {
        // Claim before reading state, so a launch finishing in between is
        // seen as a terminal state rather than a free slot.
        let claim = self.supervisor.claim(task_id);
        let task = self
            .store
            .get(task_id)
            .await?
            .ok_or(LaunchError::NotFound(task_id))?;
        if task.state != TaskState::Pending {
            return Err(LaunchError::NotPending {
                id: task_id,
                state: task.state,
            });
        }
        let Some(claim) = claim else {
            return Err(LaunchError::AlreadyLaunched(task_id));
        };

        match self.launch(&task, claim).await {
            Ok(path) => Ok(path),
            Err(e) => {
                tracing::error!(%task_id, error = %e, "launch failed");
                if let Err(store_err) = self
                    .store
                    .update_state(task_id, Transition::fail(e.to_string()))
                    .await
                {
                    tracing::warn!(%task_id, error = %store_err, "failed to record launch failure");
                }
                Err(e)
            }
        }
    }

    /// `create_task` followed by `start_execution`.
    pub async fn submit(&self, req: CreateTaskRequest) -> Result<Task, LaunchError> {
        let task = self.create_task(req).await?;
        self.start_execution(task.id).await?;
        Ok(task)
    }

    async fn launch(&self, task: &Task, claim: LaunchClaim) -> Result<PathBuf, LaunchError> {
        let endpoint = self
            .resolve_endpoint(task.owner_id, task.config.endpoint_id)
            .await?;
        let source = self
            .resolve_dataset(task.owner_id, task.config.dataset)
            .await?;
        let target = EngineTarget {
            model: endpoint.model_identifier,
            api_base_url: endpoint.api_base_url,
            api_key: endpoint.api_key,
        };
        let config = EngineConfig::for_task(&target, &source, &task.config);

        std::fs::create_dir_all(&self.outcome_dir).map_err(|e| {
            LaunchError::Spawn(format!(
                "cannot create outcome directory {}: {e}",
                self.outcome_dir.display()
            ))
        })?;
        let outcome_path = self.outcome_dir.join(outcome_file::file_name(task.id));

        self.supervisor
            .submit(
                WorkerJob {
                    task_id: task.id,
                    config,
                    outcome_path: outcome_path.clone(),
                },
                claim,
            )
            .map_err(|e| match e {
                SubmitError::Full(_) => LaunchError::QueueFull,
                SubmitError::Closed(_) | SubmitError::Unclaimed(_) => {
                    LaunchError::Spawn(e.to_string())
                }
            })?;
        tracing::info!(task_id = %task.id, path = %outcome_path.display(), "launch queued");
        Ok(outcome_path)
    }

    async fn resolve_endpoint(
        &self,
        owner: OwnerId,
        id: EndpointId,
    ) -> Result<Endpoint, LaunchError> {
        let endpoint = self.catalog.endpoint(owner, id).await.ok_or_else(|| {
            LaunchError::validation("endpoint_id", format!("endpoint {id} not found"))
        })?;
        engine::validate_model_identifier(&endpoint.model_identifier)?;
        engine::validate_endpoint_url(&endpoint.api_base_url)?;
        Ok(endpoint)
    }

    async fn resolve_dataset(
        &self,
        owner: OwnerId,
        dataset: DatasetRef,
    ) -> Result<DatasetSource, LaunchError> {
        match dataset {
            DatasetRef::BuiltIn => Ok(DatasetSource::BuiltIn),
            DatasetRef::Catalog(id) => {
                let dataset = self.catalog.dataset(owner, id).await.ok_or_else(|| {
                    LaunchError::validation("dataset_id", format!("dataset {id} not found"))
                })?;
                Ok(DatasetSource::File {
                    name: dataset.name,
                    path: dataset.download_url,
                })
            }
        }
    }

    /// The task, if it exists and belongs to `owner`.
    pub async fn get_task(&self, owner: OwnerId, id: TaskId) -> Result<Option<Task>, LaunchError> {
        Ok(self.store.get(id).await?.filter(|t| t.owner_id == owner))
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, LaunchError> {
        Ok(self.store.list(filter).await?)
    }

    /// Delete an owned task. A running worker is not stopped; its monitor
    /// only cleans up the outcome file.
    pub async fn delete_task(&self, owner: OwnerId, id: TaskId) -> Result<bool, LaunchError> {
        let removed = self.store.delete(id, owner).await?;
        if removed {
            tracing::info!(task_id = %id, "task deleted");
        }
        Ok(removed)
    }
}
