//! TOML application config.
//!
//! ```toml
//! [runner]
//! poll_interval_ms = 5000
//! ceiling_secs = 900
//! outcome_dir = "/var/tmp/perfbench"
//!
//! [store]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//!
//! [engine]
//! program = "perfbench-engine"
//! args = ["--quiet"]
//!
//! [[endpoints]]
//! id = 1
//! name = "qwen-7b"
//! model_identifier = "qwen2.5-7b-instruct"
//! api_base_url = "http://10.0.0.5:8000/v1"
//!
//! [[datasets]]
//! id = 3
//! owner = 7
//! name = "support-tickets"
//! download_url = "/data/tickets.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use perfbench_runner::{Dataset, Endpoint, RunnerConfig, StaticCatalog};
use perfbench_sweeper::SweeperConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub runner: RunnerSection,
    pub store: StoreSection,
    pub engine: EngineSection,
    pub endpoints: Vec<Endpoint>,
    pub datasets: Vec<Dataset>,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.runner.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn catalog(&self) -> StaticCatalog {
        StaticCatalog::new(self.endpoints.clone(), self.datasets.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSection {
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub ceiling_secs: u64,
    pub kill_grace_secs: u64,
    pub max_concurrent_watchers: usize,
    pub queue_capacity: usize,
    pub outcome_dir: Option<PathBuf>,
    pub cleanup_engine_workdir: bool,
    /// Defaults to twice the ceiling.
    pub orphan_max_age_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        let defaults = RunnerConfig::default();
        Self {
            poll_interval_ms: millis(defaults.poll_interval),
            settle_delay_ms: millis(defaults.settle_delay),
            ceiling_secs: defaults.ceiling.as_secs(),
            kill_grace_secs: defaults.kill_grace.as_secs(),
            max_concurrent_watchers: defaults.max_concurrent_watchers,
            queue_capacity: defaults.queue_capacity,
            outcome_dir: None,
            cleanup_engine_workdir: defaults.cleanup_engine_workdir,
            orphan_max_age_secs: None,
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl RunnerSection {
    /// Reject values that would spin, panic, or overflow at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        let positive = [
            ("runner.poll_interval_ms", self.poll_interval_ms),
            ("runner.settle_delay_ms", self.settle_delay_ms),
            ("runner.ceiling_secs", self.ceiling_secs),
            ("runner.sweep_interval_secs", self.sweep_interval_secs),
            ("runner.max_concurrent_watchers", self.max_concurrent_watchers as u64),
            ("runner.queue_capacity", self.queue_capacity as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                bail!("{field} must be greater than zero");
            }
        }
        if self.orphan_max_age_secs.is_none() && self.ceiling_secs.checked_mul(2).is_none() {
            bail!(
                "runner.ceiling_secs is too large to derive runner.orphan_max_age_secs; set it explicitly"
            );
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let ceiling = Duration::from_secs(self.ceiling_secs);
        let defaults = RunnerConfig::default();
        RunnerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ceiling,
            kill_grace: Duration::from_secs(self.kill_grace_secs),
            max_concurrent_watchers: self.max_concurrent_watchers,
            queue_capacity: self.queue_capacity,
            outcome_dir: self.outcome_dir.clone().unwrap_or(defaults.outcome_dir),
            cleanup_engine_workdir: self.cleanup_engine_workdir,
            orphan_max_age: self
                .orphan_max_age_secs
                .map_or_else(
                    || Duration::from_secs(self.ceiling_secs.saturating_mul(2)),
                    Duration::from_secs,
                ),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        let runner = self.runner_config();
        SweeperConfig {
            outcome_dir: runner.outcome_dir,
            max_age: runner.orphan_max_age,
            interval: runner.sweep_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Lives and dies with the process.
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Redis URL. Falls back to `REDIS_URL`, then localhost.
    pub url: Option<String>,
}

/// External benchmark tool run by `perfbench worker`.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from("perfbench-engine"),
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.endpoints.is_empty());

        let runner = config.runner.runner_config();
        let defaults = RunnerConfig::default();
        assert_eq!(runner.poll_interval, defaults.poll_interval);
        assert_eq!(runner.settle_delay, defaults.settle_delay);
        assert_eq!(runner.ceiling, defaults.ceiling);
        assert_eq!(runner.orphan_max_age, defaults.orphan_max_age);
        assert_eq!(runner.outcome_dir, defaults.outcome_dir);
    }

    #[test]
    fn full_file() {
        let config = AppConfig::from_toml(
            r#"
            [runner]
            poll_interval_ms = 250
            ceiling_secs = 60
            outcome_dir = "/var/tmp/perfbench"
            cleanup_engine_workdir = true

            [store]
            backend = "redis"
            url = "redis://cache:6379"

            [engine]
            program = "/opt/bench/run"
            args = ["--quiet"]

            [[endpoints]]
            id = 1
            name = "qwen-7b"
            model_identifier = "qwen2.5-7b-instruct"
            api_base_url = "http://10.0.0.5:8000/v1"
            api_key = "sk-test"

            [[datasets]]
            id = 3
            owner = 7
            name = "support-tickets"
            download_url = "/data/tickets.jsonl"
            "#,
        )
        .unwrap();

        let runner = config.runner.runner_config();
        assert_eq!(runner.poll_interval, Duration::from_millis(250));
        assert_eq!(runner.ceiling, Duration::from_secs(60));
        assert_eq!(runner.orphan_max_age, Duration::from_secs(120));
        assert_eq!(runner.outcome_dir, PathBuf::from("/var/tmp/perfbench"));
        assert!(runner.worker_options().cleanup_workdir);

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.engine.program, PathBuf::from("/opt/bench/run"));
        assert_eq!(config.engine.args, vec!["--quiet".to_string()]);

        assert_eq!(config.endpoints.len(), 1);
        assert!(config.endpoints[0].owner.is_none());
        assert_eq!(config.datasets[0].owner.map(|o| o.get()), Some(7));
    }

    #[test]
    fn sweeper_follows_runner_section() {
        let config = AppConfig::from_toml(
            "[runner]\nceiling_secs = 10\norphan_max_age_secs = 45\nsweep_interval_secs = 5\n",
        )
        .unwrap();
        let sweeper = config.runner.sweeper_config();
        assert_eq!(sweeper.max_age, Duration::from_secs(45));
        assert_eq!(sweeper.interval, Duration::from_secs(5));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(AppConfig::from_toml("[store]\nbackend = \"sqlite\"\n").is_err());
        assert!(AppConfig::from_toml("[runner]\npoll_secs = 1\n").is_err());
    }

    #[test]
    fn zero_and_overflowing_timings_are_rejected() {
        for (toml, field) in [
            ("[runner]\npoll_interval_ms = 0\n", "runner.poll_interval_ms"),
            ("[runner]\nsettle_delay_ms = 0\n", "runner.settle_delay_ms"),
            ("[runner]\nceiling_secs = 0\n", "runner.ceiling_secs"),
            ("[runner]\nsweep_interval_secs = 0\n", "runner.sweep_interval_secs"),
            ("[runner]\nmax_concurrent_watchers = 0\n", "runner.max_concurrent_watchers"),
            ("[runner]\nqueue_capacity = 0\n", "runner.queue_capacity"),
        ] {
            let err = AppConfig::from_toml(toml).unwrap_err();
            assert!(err.to_string().starts_with(field), "{field}: {err}");
        }
    }

    #[test]
    fn orphan_age_derived_from_huge_ceiling_is_rejected() {
        let section = RunnerSection {
            ceiling_secs: u64::MAX,
            ..RunnerSection::default()
        };
        let err = section.validate().unwrap_err();
        assert!(err.to_string().starts_with("runner.ceiling_secs"));

        let section = RunnerSection {
            ceiling_secs: u64::MAX,
            orphan_max_age_secs: Some(3600),
            ..RunnerSection::default()
        };
        section.validate().unwrap();
        let runner = section.runner_config();
        assert_eq!(runner.orphan_max_age, Duration::from_secs(3600));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/perfbench.toml"))).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
