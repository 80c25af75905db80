use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use perfbench_domain::{EngineConfig, OutcomeRecord, TaskId};

use crate::classify::classify_failure;
use crate::engine::{BenchmarkEngine, EngineOutput};
use crate::error::WorkerError;
use crate::outcome_file;

pub const TIMEOUT_MESSAGE: &str = "execution timed out";

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Hard ceiling on one engine run.
    pub watchdog: Duration,
    /// Remove the engine working directory once the outcome is written.
    pub cleanup_workdir: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(15 * 60),
            cleanup_workdir: false,
        }
    }
}

/// Engine working directory paired with an outcome file.
pub fn workdir_for(outcome_path: &Path) -> PathBuf {
    outcome_path.with_extension("work")
}

/// Run one benchmark and hand its outcome to the monitor through `outcome_path`.
///
/// Every engine result (success, classified failure, or watchdog expiry)
/// ends in exactly one write to `outcome_path`. An `Err` means that write
/// itself failed and the monitor will only see the placeholder.
pub async fn run_worker(
    task_id: TaskId,
    config: &EngineConfig,
    outcome_path: &Path,
    engine: &dyn BenchmarkEngine,
    opts: &WorkerOptions,
) -> Result<OutcomeRecord, WorkerError> {
    outcome_file::touch_placeholder(outcome_path)?;

    let workdir = workdir_for(outcome_path);
    let created = {
        let workdir = workdir.clone();
        tokio::task::spawn_blocking(move || std::fs::create_dir_all(workdir)).await?
    };
    let record = match created {
        Ok(()) => execute(task_id, config, &workdir, engine, opts.watchdog).await,
        Err(e) => OutcomeRecord::error(format!(
            "execution failed: cannot create working directory {}: {e}",
            workdir.display()
        )),
    };

    if opts.cleanup_workdir {
        let target = workdir.clone();
        match tokio::task::spawn_blocking(move || std::fs::remove_dir_all(target)).await? {
            Ok(()) => tracing::info!(%task_id, path = %workdir.display(), "engine workdir removed"),
            Err(e) => {
                tracing::warn!(%task_id, path = %workdir.display(), error = %e, "failed to remove engine workdir");
            }
        }
    } else {
        tracing::info!(%task_id, path = %workdir.display(), "engine workdir kept");
    }

    outcome_file::write_record(outcome_path.to_path_buf(), record.clone()).await?;
    tracing::info!(%task_id, ok = record.is_ok(), path = %outcome_path.display(), "outcome written");
    Ok(record)
}

async fn execute(
    task_id: TaskId,
    config: &EngineConfig,
    workdir: &Path,
    engine: &dyn BenchmarkEngine,
    watchdog: Duration,
) -> OutcomeRecord {
    tracing::info!(%task_id, model = %config.model, parallel = config.parallel, number = config.number, "benchmark started");
    let cancel = CancellationToken::new();
    let started = std::time::Instant::now();

    let result = tokio::time::timeout(watchdog, engine.run(config, workdir, cancel.clone())).await;
    #[allow(clippy::cast_possible_truncation)]
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(EngineOutput {
            summary,
            percentiles,
        })) => {
            tracing::info!(%task_id, elapsed_ms, "benchmark finished");
            OutcomeRecord::Ok {
                summary,
                percentiles,
            }
        }
        Ok(Err(e)) => {
            let message = classify_failure(&e);
            tracing::error!(%task_id, elapsed_ms, error = %e, "benchmark failed");
            OutcomeRecord::error(message)
        }
        Err(_) => {
            // The engine future is already dropped; cancel anything it detached.
            cancel.cancel();
            tracing::error!(%task_id, elapsed_ms, "benchmark exceeded watchdog");
            OutcomeRecord::error(TIMEOUT_MESSAGE)
        }
    }
}
