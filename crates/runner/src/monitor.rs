//! Watches one worker's outcome file and reconciles it into the task store.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use perfbench_domain::metrics::strip_housekeeping;
use perfbench_domain::render::{percentiles_to_text, raw_transcript, summary_to_text};
use perfbench_domain::{OutcomeRecord, Task, TaskId, TaskResults, Transition};
use perfbench_task_store::{TaskStore, TaskStoreError};

use crate::config::RunnerConfig;
use crate::spawn::WorkerHandle;

/// Ceiling reached with only the zero-length placeholder on disk.
pub const NO_OUTPUT_MESSAGE: &str = "execution timed out: no output produced";
const EARLY_EXIT_MESSAGE: &str = "no output produced: worker exited without writing a result";

/// Attempts at recording `pending -> running` before the task is failed.
const START_ATTEMPTS: u32 = 3;
const START_BACKOFF: Duration = Duration::from_millis(100);

/// One sample of the outcome file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Missing,
    Empty,
    /// Size changed across the settle delay.
    Growing,
    /// Non-empty and unchanged across the settle delay.
    Complete,
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Stability check: non-zero size, unchanged across `settle`.
pub async fn check_outcome(path: &Path, settle: Duration) -> FileState {
    match file_size(path) {
        None => FileState::Missing,
        Some(0) => FileState::Empty,
        Some(first) => {
            tokio::time::sleep(settle).await;
            if file_size(path) == Some(first) {
                FileState::Complete
            } else {
                FileState::Growing
            }
        }
    }
}

/// Why watching stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detection {
    Complete,
    /// Worker exited leaving no record.
    EarlyExit,
    /// Ceiling elapsed; `no_output` when nothing beyond a zero-length
    /// placeholder ever appeared.
    Ceiling { no_output: bool },
}

/// Result of recording that the worker started.
#[derive(Debug)]
enum Start {
    Running,
    /// Task removed before the worker came up.
    Deleted,
    /// Task already left `pending`; someone else owns it.
    Rejected,
    /// Store kept failing; the message is recorded as the failure reason.
    Unrecorded(String),
}

/// Polls an outcome file and moves its task to a terminal state.
///
/// After a successful launch this is the only writer of the task's state.
pub struct Monitor {
    store: Arc<dyn TaskStore>,
    poll_interval: Duration,
    settle_delay: Duration,
    ceiling: Duration,
    kill_grace: Duration,
}

impl Monitor {
    pub fn new(store: Arc<dyn TaskStore>, config: &RunnerConfig) -> Self {
        Self {
            store,
            poll_interval: config.poll_interval,
            settle_delay: config.settle_delay,
            ceiling: config.ceiling,
            kill_grace: config.kill_grace,
        }
    }

    /// Watch until the outcome is reconciled, then clean up the worker and file.
    ///
    /// Returns the task as committed, or `None` when no terminal write was
    /// accepted (for instance the task was deleted mid-run).
    pub async fn watch(
        &self,
        task_id: TaskId,
        outcome_path: &Path,
        mut worker: Box<dyn WorkerHandle>,
    ) -> Option<Task> {
        let started = Instant::now();
        match self.mark_running(task_id).await {
            Start::Running | Start::Deleted => {}
            Start::Rejected => {
                self.abandon(task_id, outcome_path, worker.as_mut()).await;
                return None;
            }
            Start::Unrecorded(error) => {
                let committed = self
                    .commit(
                        task_id,
                        Transition::fail(format!("failed to record task start: {error}")),
                    )
                    .await;
                self.abandon(task_id, outcome_path, worker.as_mut()).await;
                return committed;
            }
        }

        let detection = self.wait_for_outcome(task_id, outcome_path, worker.as_mut(), started).await;
        let transition = match detection {
            Detection::Complete => read_outcome(outcome_path),
            Detection::EarlyExit => Transition::fail(EARLY_EXIT_MESSAGE),
            Detection::Ceiling { no_output: true } => Transition::fail(NO_OUTPUT_MESSAGE),
            Detection::Ceiling { no_output: false } => Transition::fail(format!(
                "execution timed out: no result within {:?}",
                self.ceiling
            )),
        };
        let committed = self.commit(task_id, transition).await;

        self.reap(task_id, worker.as_mut()).await;
        remove_outcome(task_id, outcome_path);
        committed
    }

    /// Record `pending -> running`, retrying transient store errors with backoff.
    async fn mark_running(&self, task_id: TaskId) -> Start {
        let mut backoff = START_BACKOFF;
        for attempt in 1..=START_ATTEMPTS {
            match self.store.update_state(task_id, Transition::start()).await {
                Ok(_) => {
                    tracing::info!(%task_id, "task running");
                    return Start::Running;
                }
                Err(TaskStoreError::NotFound(_)) => {
                    tracing::info!(%task_id, "task deleted before start; watching for cleanup only");
                    return Start::Deleted;
                }
                Err(e) if e.is_invalid_transition() => {
                    tracing::warn!(%task_id, error = %e, "task no longer pending; abandoning worker");
                    return Start::Rejected;
                }
                Err(e) if attempt == START_ATTEMPTS => {
                    tracing::error!(%task_id, attempt, error = %e, "failed to mark task running");
                    return Start::Unrecorded(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(%task_id, attempt, error = %e, "failed to mark task running, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
        Start::Unrecorded("no attempts made".to_string())
    }

    /// Stop a worker whose task will not be watched.
    async fn abandon(&self, task_id: TaskId, outcome_path: &Path, worker: &mut dyn WorkerHandle) {
        if !worker_exited(task_id, worker) {
            if let Err(e) = worker.kill().await {
                tracing::warn!(%task_id, error = %e, "failed to kill worker");
            }
        }
        remove_outcome(task_id, outcome_path);
    }

    async fn wait_for_outcome(
        &self,
        task_id: TaskId,
        path: &Path,
        worker: &mut dyn WorkerHandle,
        started: Instant,
    ) -> Detection {
        loop {
            let sample = check_outcome(path, self.settle_delay).await;
            #[allow(clippy::cast_possible_truncation)]
            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::debug!(%task_id, ?sample, elapsed_ms, "outcome poll");

            match sample {
                FileState::Complete => return Detection::Complete,
                FileState::Missing | FileState::Empty if worker_exited(task_id, worker) => {
                    // The rename may have landed between the sample and the exit check.
                    if check_outcome(path, self.settle_delay).await == FileState::Complete {
                        return Detection::Complete;
                    }
                    return Detection::EarlyExit;
                }
                _ => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.ceiling {
                return Detection::Ceiling {
                    no_output: matches!(sample, FileState::Missing | FileState::Empty),
                };
            }
            // Never sleep past the ceiling, so a timeout lands within one poll of it.
            tokio::time::sleep(self.poll_interval.min(self.ceiling - elapsed)).await;
        }
    }

    async fn commit(&self, task_id: TaskId, transition: Transition) -> Option<Task> {
        match self.store.update_state(task_id, transition).await {
            Ok(task) => {
                match &task.error_message {
                    Some(error) => tracing::error!(%task_id, %error, "task failed"),
                    None => tracing::info!(%task_id, "task completed"),
                }
                Some(task)
            }
            Err(TaskStoreError::NotFound(_)) => {
                tracing::info!(%task_id, "task deleted during run; outcome discarded");
                None
            }
            Err(e) => {
                tracing::error!(%task_id, error = %e, "failed to record task outcome");
                None
            }
        }
    }

    /// Give a lingering worker `kill_grace` to exit, then kill it.
    async fn reap(&self, task_id: TaskId, worker: &mut dyn WorkerHandle) {
        if worker_exited(task_id, worker) {
            return;
        }
        if tokio::time::timeout(self.kill_grace, worker.wait()).await.is_ok() {
            return;
        }
        tracing::warn!(%task_id, "worker still running after reconciliation; killing");
        if let Err(e) = worker.kill().await {
            tracing::warn!(%task_id, error = %e, "failed to kill worker");
        }
    }
}

fn worker_exited(task_id: TaskId, worker: &mut dyn WorkerHandle) -> bool {
    worker.try_exited().unwrap_or_else(|e| {
        tracing::warn!(%task_id, error = %e, "failed to check worker status");
        false
    })
}

/// Turn a complete outcome file into the task's terminal transition.
fn read_outcome(path: &Path) -> Transition {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return Transition::fail(format!("corrupt result: {e}")),
    };
    match OutcomeRecord::from_bytes(&bytes) {
        Ok(OutcomeRecord::Ok {
            mut summary,
            percentiles,
        }) => {
            strip_housekeeping(&mut summary);
            Transition::complete(TaskResults {
                summary_results: summary_to_text(&summary),
                percentile_results: percentiles_to_text(&percentiles),
                raw_output: raw_transcript(&summary, &percentiles),
            })
        }
        Ok(OutcomeRecord::Error { message }) => Transition::fail(message),
        Err(e) => Transition::fail(format!("corrupt result: {e}")),
    }
}

fn remove_outcome(task_id: TaskId, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(%task_id, path = %path.display(), "outcome file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(%task_id, path = %path.display(), error = %e, "failed to remove outcome file");
        }
    }
}
