use std::path::PathBuf;
use std::time::Duration;

use perfbench_worker::WorkerOptions;

/// Timing and capacity knobs shared by the launcher, monitor, and supervisor.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Delay between outcome file polls.
    pub poll_interval: Duration,
    /// Gap between the two size samples of the stability check.
    pub settle_delay: Duration,
    /// Worker watchdog and monitor ceiling. One value so the monitor never
    /// gives up while the worker may still legitimately run.
    pub ceiling: Duration,
    /// How long a worker may linger after reconciliation before it is killed.
    pub kill_grace: Duration,
    pub max_concurrent_watchers: usize,
    pub queue_capacity: usize,
    pub outcome_dir: PathBuf,
    pub cleanup_engine_workdir: bool,
    /// Outcome files older than this with no live task are orphans.
    pub orphan_max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let ceiling = Duration::from_secs(15 * 60);
        Self {
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            ceiling,
            kill_grace: Duration::from_secs(10),
            max_concurrent_watchers: 4,
            queue_capacity: 64,
            outcome_dir: std::env::temp_dir().join("perfbench"),
            cleanup_engine_workdir: false,
            orphan_max_age: ceiling * 2,
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            watchdog: self.ceiling,
            cleanup_workdir: self.cleanup_engine_workdir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.ceiling, Duration::from_secs(900));
        assert_eq!(config.orphan_max_age, Duration::from_secs(1800));
        assert!(!config.cleanup_engine_workdir);
        assert!(config.outcome_dir.ends_with("perfbench"));
    }

    #[test]
    fn worker_watchdog_matches_monitor_ceiling() {
        let config = RunnerConfig {
            ceiling: Duration::from_secs(60),
            cleanup_engine_workdir: true,
            ..RunnerConfig::default()
        };
        let opts = config.worker_options();
        assert_eq!(opts.watchdog, config.ceiling);
        assert!(opts.cleanup_workdir);
    }
}
