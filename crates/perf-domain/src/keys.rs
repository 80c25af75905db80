//! KV key builders and field name constants for task records.

/// Counter allocating task ids.
pub const TASK_SEQUENCE_KEY: &str = "perfbench.seq.tasks";

/// Task record key: `perfbench.state.tasks.{task_id}`
#[must_use]
pub fn task_key(task_id: u64) -> String {
    format!("perfbench.state.tasks.{task_id}")
}

/// Per-owner index of task ids scored by creation time:
/// `perfbench.idx.owners.{owner_id}.tasks`
#[must_use]
pub fn owner_index_key(owner_id: u64) -> String {
    format!("perfbench.idx.owners.{owner_id}.tasks")
}

/// Field name constants for type-safe KV access.
pub mod fields {
    pub const TASK_ID: &str = "task_id";
    pub const OWNER_ID: &str = "owner_id";
    pub const MODEL_NAME: &str = "model_name";
    pub const DATASET_NAME: &str = "dataset_name";
    /// JSON-encoded `TaskConfig`.
    pub const CONFIG: &str = "config";
    pub const STATE: &str = "state";
    pub const SUMMARY_RESULTS: &str = "summary_results";
    pub const PERCENTILE_RESULTS: &str = "percentile_results";
    pub const RAW_OUTPUT: &str = "raw_output";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const CREATED_AT: &str = "created_at";
    pub const STARTED_AT: &str = "started_at";
    pub const COMPLETED_AT: &str = "completed_at";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_format() {
        assert_eq!(task_key(42), "perfbench.state.tasks.42");
    }

    #[test]
    fn owner_index_key_format() {
        assert_eq!(owner_index_key(7), "perfbench.idx.owners.7.tasks");
    }
}
