use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use perfbench_domain::{EngineConfig, TaskId};
use perfbench_worker::{BenchmarkEngine, WorkerOptions, run_worker};

/// Everything a worker needs for one run.
#[derive(Debug, Clone)]
pub struct WorkerJob {
    pub task_id: TaskId,
    pub config: EngineConfig,
    pub outcome_path: PathBuf,
}

/// A running worker owned by its monitor.
#[async_trait]
pub trait WorkerHandle: Send {
    /// Non-blocking check whether the worker has exited.
    fn try_exited(&mut self) -> std::io::Result<bool>;

    async fn wait(&mut self) -> std::io::Result<()>;

    /// Hard stop. No-op if already exited.
    async fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts isolated workers.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self, job: &WorkerJob) -> std::io::Result<Box<dyn WorkerHandle>>;
}

/// Spawns `program [args..] worker --task-id <id> --outcome <path>` with the
/// engine configuration as JSON on stdin.
///
/// On unix the worker leads its own process group, so a kill also reaches
/// the engine processes it started.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-invoke the running binary.
    pub fn current_exe(args: Vec<String>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args))
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self, job: &WorkerJob) -> std::io::Result<Box<dyn WorkerHandle>> {
        let input = serde_json::to_vec(&job.config)?;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("worker")
            .arg("--task-id")
            .arg(job.task_id.to_string())
            .arg("--outcome")
            .arg(&job.outcome_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;
        let group = child.id().and_then(|pid| i32::try_from(pid).ok());

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
        }
        tracing::info!(
            task_id = %job.task_id,
            pid = child.id(),
            path = %job.outcome_path.display(),
            "worker process spawned"
        );
        Ok(Box::new(ProcessHandle { child, group }))
    }
}

struct ProcessHandle {
    child: Child,
    /// Process group led by the worker.
    #[cfg_attr(not(unix), allow(dead_code))]
    group: Option<i32>,
}

/// SIGKILL every process in `group`. False if the signal could not be sent.
#[cfg(unix)]
fn kill_group(group: i32) -> bool {
    // SAFETY: killpg takes plain integers and touches no memory.
    if unsafe { libc::killpg(group, libc::SIGKILL) } == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    tracing::warn!(group, error = %err, "failed to kill worker process group");
    false
}

#[async_trait]
impl WorkerHandle for ProcessHandle {
    fn try_exited(&mut self) -> std::io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    async fn wait(&mut self) -> std::io::Result<()> {
        self.child.wait().await.map(|_| ())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        if self.try_exited()? {
            return Ok(());
        }
        #[cfg(unix)]
        if let Some(group) = self.group {
            if kill_group(group) {
                return self.child.wait().await.map(|_| ());
            }
        }
        self.child.kill().await
    }
}

/// Runs the worker as a tokio task inside this process.
///
/// No process isolation: a hung engine is only stopped by the watchdog or
/// an abort. Meant for tests and single-process runs.
#[derive(Clone)]
pub struct InProcessSpawner {
    engine: Arc<dyn BenchmarkEngine>,
    options: WorkerOptions,
}

impl InProcessSpawner {
    pub fn new(engine: Arc<dyn BenchmarkEngine>, options: WorkerOptions) -> Self {
        Self { engine, options }
    }
}

#[async_trait]
impl WorkerSpawner for InProcessSpawner {
    async fn spawn(&self, job: &WorkerJob) -> std::io::Result<Box<dyn WorkerHandle>> {
        let engine = Arc::clone(&self.engine);
        let options = self.options.clone();
        let job = job.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = run_worker(
                job.task_id,
                &job.config,
                &job.outcome_path,
                engine.as_ref(),
                &options,
            )
            .await
            {
                tracing::error!(task_id = %job.task_id, error = %e, "worker failed to write outcome");
            }
        });
        Ok(Box::new(TaskHandle { handle }))
    }
}

struct TaskHandle {
    handle: JoinHandle<()>,
}

#[async_trait]
impl WorkerHandle for TaskHandle {
    fn try_exited(&mut self) -> std::io::Result<bool> {
        Ok(self.handle.is_finished())
    }

    async fn wait(&mut self) -> std::io::Result<()> {
        // A panicked or aborted worker has exited all the same.
        let _ = (&mut self.handle).await;
        Ok(())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.handle.abort();
        let _ = (&mut self.handle).await;
        Ok(())
    }
}
