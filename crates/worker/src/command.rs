use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use perfbench_domain::{EngineConfig, parse_benchmark_output};

use crate::engine::{BenchmarkEngine, EngineOutput};
use crate::error::EngineError;

/// Stderr lines kept in an exit error.
const STDERR_TAIL_LINES: usize = 20;

/// Runs an external benchmark tool as a child process.
///
/// The tool receives the engine configuration as JSON on stdin and prints
/// `{"summary": {...}, "percentiles": {...}}` on stdout. Console table
/// output is accepted as a fallback.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl BenchmarkEngine for CommandEngine {
    async fn run(
        &self,
        config: &EngineConfig,
        workdir: &Path,
        cancel: CancellationToken,
    ) -> Result<EngineOutput, EngineError> {
        let input = serde_json::to_vec(config)
            .map_err(|e| EngineError::Failed(format!("encode engine config: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits before reading its input is judged by its exit status.
            if let Err(e) = stdin.write_all(&input).await {
                tracing::debug!(error = %e, "engine closed stdin early");
            }
        }

        // Dropping the child on cancellation kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| EngineError::Failed(format!("wait for engine: {e}")))?
            }
            () = cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(EngineError::Exit {
                code,
                stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        decode_output(&stdout)
    }
}

/// Structured JSON first, then the console-table fallback.
fn decode_output(stdout: &str) -> Result<EngineOutput, EngineError> {
    if let Ok(output) = serde_json::from_str::<EngineOutput>(stdout.trim()) {
        return Ok(output);
    }
    let parsed = parse_benchmark_output(stdout);
    if let Some(reason) = parsed.summary_error().or_else(|| parsed.percentile_error()) {
        return Err(EngineError::Output(reason.to_string()));
    }
    Ok(EngineOutput {
        summary: parsed.summary,
        percentiles: parsed.percentiles,
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
