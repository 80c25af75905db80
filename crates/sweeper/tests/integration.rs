//! Sweeper behavior against a scratch outcome directory and the memory store.

use std::sync::Arc;
use std::time::Duration;

use perfbench_domain::{
    DatasetRef, EndpointId, NewTask, OwnerId, RequestBounds, TaskConfig, TaskId, Transition,
};
use perfbench_sweeper::{OutcomeSweeper, SweepReport, SweeperConfig};
use perfbench_task_store::TaskStore;
use perfbench_task_store_memory::MemoryTaskStore;
use perfbench_worker::outcome_file;

fn new_task() -> NewTask {
    NewTask {
        owner_id: OwnerId::new(1),
        model_name: "m".to_string(),
        dataset_name: "openqa".to_string(),
        config: TaskConfig {
            endpoint_id: EndpointId::new(1),
            dataset: DatasetRef::BuiltIn,
            concurrency: 1,
            total_requests: 1,
            bounds: RequestBounds::default(),
        },
        created_at: 1,
    }
}

fn sweeper(store: Arc<dyn TaskStore>, dir: &std::path::Path, max_age: Duration) -> OutcomeSweeper {
    OutcomeSweeper::new(
        store,
        SweeperConfig {
            outcome_dir: dir.to_path_buf(),
            max_age,
            interval: Duration::from_millis(20),
        },
    )
}

fn touch(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

#[tokio::test]
async fn test_removes_orphans_of_terminal_and_missing_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTaskStore::new());

    let failed = store.insert(new_task()).await.unwrap();
    store
        .update_state(failed.id, Transition::fail("boom"))
        .await
        .unwrap();
    let running = store.insert(new_task()).await.unwrap();
    store.update_state(running.id, Transition::start()).await.unwrap();

    let failed_file = touch(dir.path(), &outcome_file::file_name(failed.id));
    let missing_file = touch(dir.path(), &outcome_file::file_name(TaskId::new(999)));
    let live_file = touch(dir.path(), &outcome_file::file_name(running.id));
    let workdir = dir
        .path()
        .join(outcome_file::file_name(failed.id))
        .with_extension("work");
    std::fs::create_dir(&workdir).unwrap();
    std::fs::write(workdir.join("engine.log"), b"log").unwrap();
    let temp_file = touch(dir.path(), ".tmpAbC123");
    let unrelated = touch(dir.path(), "notes.txt");

    let report = sweeper(store.clone(), dir.path(), Duration::ZERO)
        .sweep()
        .await
        .unwrap();

    assert_eq!(
        report,
        SweepReport {
            scanned: 5,
            removed: 4,
            skipped: 1,
            failed: 0,
        }
    );
    assert!(!failed_file.exists());
    assert!(!missing_file.exists());
    assert!(!workdir.exists());
    assert!(!temp_file.exists());
    assert!(live_file.exists());
    assert!(unrelated.exists());
}

#[tokio::test]
async fn test_young_entries_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTaskStore::new());
    let path = touch(dir.path(), &outcome_file::file_name(TaskId::new(5)));

    let report = sweeper(store, dir.path(), Duration::from_secs(3600))
        .sweep()
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.skipped, 1);
    assert!(path.exists());
}

#[tokio::test]
async fn test_missing_directory_is_empty_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTaskStore::new());
    let report = sweeper(store, &dir.path().join("absent"), Duration::ZERO)
        .sweep()
        .await
        .unwrap();
    assert_eq!(report, SweepReport::default());
}

#[tokio::test]
async fn test_run_sweeps_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTaskStore::new());
    let path = touch(dir.path(), &outcome_file::file_name(TaskId::new(77)));

    let sweeper = Arc::new(sweeper(store, dir.path(), Duration::ZERO));
    let shutdown = tokio_util::sync::CancellationToken::new();
    let handle = {
        let sweeper = Arc::clone(&sweeper);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sweeper.run(shutdown).await })
    };

    for _ in 0..100 {
        if !path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!path.exists());
    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_zero_interval_sweeps_once_and_returns() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTaskStore::new());
    let path = touch(dir.path(), &outcome_file::file_name(TaskId::new(78)));

    let sweeper = OutcomeSweeper::new(
        store,
        SweeperConfig {
            outcome_dir: dir.path().to_path_buf(),
            max_age: Duration::ZERO,
            interval: Duration::ZERO,
        },
    );
    let shutdown = tokio_util::sync::CancellationToken::new();
    tokio::time::timeout(Duration::from_secs(5), sweeper.run(shutdown))
        .await
        .unwrap();
    assert!(!path.exists());
}
