//! Task <-> hash field mapping. Every value is stored as a UTF-8 string.

use std::collections::HashMap;

use perfbench_domain::keys::fields;
use perfbench_domain::{OwnerId, Task, TaskConfig, TaskId, TaskResults, TaskState};
use perfbench_task_store::TaskStoreError;

/// Hash fields for `task`. Unset optional fields are omitted.
pub(crate) fn encode(task: &Task) -> Result<Vec<(&'static str, String)>, TaskStoreError> {
    let config = serde_json::to_string(&task.config).map_err(|e| TaskStoreError::Corrupt {
        id: task.id,
        reason: format!("config: {e}"),
    })?;
    let mut out = vec![
        (fields::TASK_ID, task.id.to_string()),
        (fields::OWNER_ID, task.owner_id.to_string()),
        (fields::MODEL_NAME, task.model_name.clone()),
        (fields::DATASET_NAME, task.dataset_name.clone()),
        (fields::CONFIG, config),
        (fields::CREATED_AT, task.created_at.to_string()),
    ];
    out.extend(lifecycle_fields(task));
    Ok(out)
}

/// Fields a transition may set: state, timestamps, result or error payload.
pub(crate) fn lifecycle_fields(task: &Task) -> Vec<(&'static str, String)> {
    let mut out = vec![(fields::STATE, task.state.as_str().to_string())];
    if let Some(at) = task.started_at {
        out.push((fields::STARTED_AT, at.to_string()));
    }
    if let Some(at) = task.completed_at {
        out.push((fields::COMPLETED_AT, at.to_string()));
    }
    if let Some(results) = &task.results {
        out.push((fields::SUMMARY_RESULTS, results.summary_results.clone()));
        out.push((fields::PERCENTILE_RESULTS, results.percentile_results.clone()));
        out.push((fields::RAW_OUTPUT, results.raw_output.clone()));
    }
    if let Some(error) = &task.error_message {
        out.push((fields::ERROR_MESSAGE, error.clone()));
    }
    out
}

pub(crate) fn decode(id: TaskId, mut hash: HashMap<String, String>) -> Result<Task, TaskStoreError> {
    let corrupt = |reason: String| TaskStoreError::Corrupt { id, reason };

    let mut required = |field: &str| {
        hash.remove(field)
            .ok_or_else(|| corrupt(format!("missing field {field}")))
    };
    let owner_id = required(fields::OWNER_ID)?;
    let model_name = required(fields::MODEL_NAME)?;
    let dataset_name = required(fields::DATASET_NAME)?;
    let config = required(fields::CONFIG)?;
    let state = required(fields::STATE)?;
    let created_at = required(fields::CREATED_AT)?;

    let owner_id: OwnerId = owner_id.parse().map_err(|e| corrupt(format!("{e}")))?;
    let config: TaskConfig =
        serde_json::from_str(&config).map_err(|e| corrupt(format!("config: {e}")))?;
    let state: TaskState = state.parse().map_err(|e| corrupt(format!("{e}")))?;
    let created_at = parse_millis(fields::CREATED_AT, &created_at).map_err(corrupt)?;
    let started_at = optional_millis(&mut hash, fields::STARTED_AT).map_err(corrupt)?;
    let completed_at = optional_millis(&mut hash, fields::COMPLETED_AT).map_err(corrupt)?;

    let results = match (
        hash.remove(fields::SUMMARY_RESULTS),
        hash.remove(fields::PERCENTILE_RESULTS),
        hash.remove(fields::RAW_OUTPUT),
    ) {
        (Some(summary_results), Some(percentile_results), Some(raw_output)) => Some(TaskResults {
            summary_results,
            percentile_results,
            raw_output,
        }),
        (None, None, None) => None,
        _ => return Err(corrupt("partial result payload".to_string())),
    };

    Ok(Task {
        id,
        owner_id,
        model_name,
        dataset_name,
        config,
        state,
        results,
        error_message: hash.remove(fields::ERROR_MESSAGE),
        created_at,
        started_at,
        completed_at,
    })
}

fn parse_millis(field: &str, raw: &str) -> Result<u64, String> {
    raw.parse::<u64>()
        .map_err(|e| format!("{field}: {e}"))
}

fn optional_millis(hash: &mut HashMap<String, String>, field: &str) -> Result<Option<u64>, String> {
    hash.remove(field)
        .map(|raw| parse_millis(field, &raw))
        .transpose()
}
