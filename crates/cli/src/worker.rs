//! `perfbench worker`: the isolated child process behind one task.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use perfbench_domain::{EngineConfig, OutcomeRecord, TaskId};
use perfbench_worker::{CommandEngine, outcome_file};

use crate::config::AppConfig;

/// Run one benchmark from the engine config on `input`.
///
/// Exits zero once an outcome record is on disk, whatever the benchmark
/// result. Setup failures (config, stdin, decoding) are recorded too, so
/// the monitor never waits out the ceiling on a worker that could not start.
/// A nonzero exit means the record itself could not be written.
pub async fn run(
    config_path: Option<&Path>,
    task_id: TaskId,
    outcome: &Path,
    input: impl AsyncRead + Unpin,
) -> Result<()> {
    let (config, engine_config) = match prepare(config_path, input).await {
        Ok(prepared) => prepared,
        Err(e) => {
            let message = format!("execution failed: {e:#}");
            tracing::error!(%task_id, error = %message, "worker setup failed");
            outcome_file::write_record(outcome.to_path_buf(), OutcomeRecord::error(message))
                .await
                .with_context(|| format!("writing outcome {}", outcome.display()))?;
            return Ok(());
        }
    };

    let engine = CommandEngine::new(config.engine.program.clone(), config.engine.args.clone());
    let options = config.runner.runner_config().worker_options();
    let record = perfbench_worker::run_worker(task_id, &engine_config, outcome, &engine, &options)
        .await
        .with_context(|| format!("writing outcome {}", outcome.display()))?;
    tracing::debug!(%task_id, ok = record.is_ok(), "worker exiting");
    Ok(())
}

async fn prepare(
    config_path: Option<&Path>,
    mut input: impl AsyncRead + Unpin,
) -> Result<(AppConfig, EngineConfig)> {
    let config = AppConfig::load(config_path)?;
    let mut buf = Vec::new();
    input
        .read_to_end(&mut buf)
        .await
        .context("reading engine config from stdin")?;
    let engine_config = serde_json::from_slice(&buf).context("decoding engine config")?;
    Ok((config, engine_config))
}
