use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use perfbench_runner::{
    InProcessSpawner, Launcher, ProcessSpawner, RunnerConfig, Supervisor, WorkerSpawner,
};
use perfbench_task_store::TaskStore;
use perfbench_task_store_memory::MemoryTaskStore;
use perfbench_task_store_redis::{RedisTaskStore, RedisTaskStoreConfig};
use perfbench_worker::CommandEngine;

use crate::config::{AppConfig, StoreBackend};

pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryTaskStore::new())),
        StoreBackend::Redis => {
            let url = config
                .store
                .url
                .clone()
                .or_else(|| std::env::var("REDIS_URL").ok())
                .unwrap_or_else(|| RedisTaskStoreConfig::default().url);
            let store = RedisTaskStore::connect(RedisTaskStoreConfig { url: url.clone() })
                .await
                .with_context(|| format!("connecting to task store at {url}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Worker processes re-run this binary, handing the config path along.
pub fn spawner(
    config: &AppConfig,
    runner: &RunnerConfig,
    config_path: Option<&Path>,
    in_process: bool,
) -> anyhow::Result<Arc<dyn WorkerSpawner>> {
    if in_process {
        let engine = CommandEngine::new(config.engine.program.clone(), config.engine.args.clone());
        return Ok(Arc::new(InProcessSpawner::new(
            Arc::new(engine),
            runner.worker_options(),
        )));
    }
    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    let spawner = ProcessSpawner::current_exe(args).context("locating perfbench executable")?;
    Ok(Arc::new(spawner))
}

pub fn launcher(
    config: &AppConfig,
    runner: &RunnerConfig,
    store: Arc<dyn TaskStore>,
    spawner: Arc<dyn WorkerSpawner>,
) -> Launcher {
    let supervisor = Supervisor::start(Arc::clone(&store), spawner, runner);
    Launcher::new(store, Arc::new(config.catalog()), supervisor, runner)
}
