use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use perfbench_task_store::TaskStore;
use perfbench_worker::outcome_file;

use crate::config::SweeperConfig;
use crate::error::SweeperError;

/// Prefix of temp files left by an interrupted atomic write.
const TEMP_PREFIX: &str = ".tmp";

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    /// Too young, or the owning task is still live.
    pub skipped: usize,
    pub failed: usize,
}

/// Removes outcome files and engine workdirs nobody will reconcile.
///
/// An entry is removed once it is older than `max_age` and its task is
/// terminal or gone. Leftover temp files only need the age check.
pub struct OutcomeSweeper {
    store: Arc<dyn TaskStore>,
    config: SweeperConfig,
}

impl OutcomeSweeper {
    pub fn new(store: Arc<dyn TaskStore>, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Run one pass over the outcome directory.
    pub async fn sweep(&self) -> Result<SweepReport, SweeperError> {
        let mut report = SweepReport::default();
        let entries = match std::fs::read_dir(&self.config.outcome_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let task_id = outcome_file::task_id_from_name(name);
            if task_id.is_none() && !name.starts_with(TEMP_PREFIX) {
                continue;
            }
            report.scanned += 1;

            match self.is_orphan(&path, task_id).await {
                Ok(true) => match remove(&path) {
                    Ok(()) => {
                        tracing::info!(path = %path.display(), "orphaned outcome removed");
                        report.removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove orphan");
                        report.failed += 1;
                    }
                },
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to inspect entry");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed,
            skipped = report.skipped,
            failed = report.failed,
            "sweep completed"
        );
        Ok(report)
    }

    async fn is_orphan(
        &self,
        path: &Path,
        task_id: Option<perfbench_domain::TaskId>,
    ) -> Result<bool, SweeperError> {
        let modified = std::fs::metadata(path)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < self.config.max_age {
            return Ok(false);
        }
        let Some(task_id) = task_id else {
            return Ok(true);
        };
        Ok(match self.store.get(task_id).await? {
            Some(task) => task.state.is_terminal(),
            None => true,
        })
    }

    /// Sweep every `interval` until `shutdown` fires.
    ///
    /// A zero interval sweeps once and returns.
    pub async fn run(&self, shutdown: CancellationToken) {
        if self.config.interval.is_zero() {
            tracing::error!("sweep interval is zero; sweeping once");
            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "sweep failed");
            }
            return;
        }
        let mut interval = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "sweep failed");
                    }
                }
            }
        }
        tracing::debug!("sweeper stopped");
    }
}

fn remove(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}
