//! Outcome file handoff: a zero-length placeholder at start, then one
//! atomic replace with the final record.

use std::io::Write;
use std::path::{Path, PathBuf};

use perfbench_domain::{OutcomeRecord, TaskId};

use crate::error::WorkerError;

pub const EXTENSION: &str = "outcome";
const PREFIX: &str = "perf-";

/// Fresh outcome file name for one launch: `perf-{task_id}-{ulid}.outcome`.
pub fn file_name(task_id: TaskId) -> String {
    format!(
        "{PREFIX}{task_id}-{}.{EXTENSION}",
        ulid::Ulid::new().to_string().to_lowercase()
    )
}

/// Task id encoded in an outcome file or engine workdir name.
pub fn task_id_from_name(name: &str) -> Option<TaskId> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let (id, _) = stem.strip_prefix(PREFIX)?.split_once('-')?;
    id.parse().ok()
}

/// Create (or truncate) the zero-length placeholder the monitor watches.
pub fn touch_placeholder(path: &Path) -> Result<(), WorkerError> {
    std::fs::File::create(path)?;
    Ok(())
}

/// Write `record` to a temp file in the same directory, fsync, and rename it
/// over `path`. Readers see either the placeholder or the complete record.
pub fn write_atomic(path: &Path, record: &OutcomeRecord) -> Result<(), WorkerError> {
    let bytes = record.to_bytes()?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// [`write_atomic`] on the blocking pool, for async callers.
pub async fn write_record(path: PathBuf, record: OutcomeRecord) -> Result<(), WorkerError> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &record)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_unique_and_parse_back() {
        let a = file_name(TaskId::new(42));
        let b = file_name(TaskId::new(42));
        assert_ne!(a, b);
        assert!(a.starts_with("perf-42-") && a.ends_with(".outcome"));
        assert_eq!(task_id_from_name(&a), Some(TaskId::new(42)));

        let workdir = Path::new(&a).with_extension("work");
        let workdir = workdir.to_str().unwrap();
        assert_eq!(task_id_from_name(workdir), Some(TaskId::new(42)));
    }

    #[test]
    fn foreign_names_do_not_parse() {
        assert_eq!(task_id_from_name("notes.txt"), None);
        assert_eq!(task_id_from_name("perf-abc-01h.outcome"), None);
        assert_eq!(task_id_from_name(".tmpX1y2"), None);
    }

    #[test]
    fn placeholder_then_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf-1.outcome");

        touch_placeholder(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        let record = OutcomeRecord::error("execution timed out");
        write_atomic(&path, &record).unwrap();
        let back = OutcomeRecord::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, record);

        // No temp files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("perf-1.outcome");
        assert!(write_atomic(&path, &OutcomeRecord::error("x")).is_err());
    }

    #[tokio::test]
    async fn record_written_from_async_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf-2.outcome");
        touch_placeholder(&path).unwrap();

        let record = OutcomeRecord::error("execution failed: boom");
        write_record(path.clone(), record.clone()).await.unwrap();
        let back = OutcomeRecord::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, record);

        let missing = dir.path().join("gone").join("perf-3.outcome");
        assert!(matches!(
            write_record(missing, record).await,
            Err(WorkerError::Io(_))
        ));
    }
}
