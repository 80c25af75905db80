use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::ids::{DatasetRef, EndpointId, OwnerId, TaskId};
use crate::state::TaskState;

/// Unix millis, the timestamp unit of every task record.
#[allow(clippy::cast_possible_truncation)] // millis since epoch fits in u64 until year 584556
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Optional per-request overrides forwarded to the benchmark engine.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_prompt_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prompt_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Extra JSON fields merged into every request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Map<String, Value>>,
}

impl RequestBounds {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.min_prompt_length == Some(0) {
            return Err(DomainError::validation(
                "min_prompt_length",
                "must be at least 1",
            ));
        }
        if self.max_prompt_length == Some(0) {
            return Err(DomainError::validation(
                "max_prompt_length",
                "must be at least 1",
            ));
        }
        if let (Some(min), Some(max)) = (self.min_prompt_length, self.max_prompt_length)
            && min > max
        {
            return Err(DomainError::validation(
                "max_prompt_length",
                format!("must not be below min_prompt_length ({max} < {min})"),
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(DomainError::validation("max_tokens", "must be at least 1"));
        }
        Ok(())
    }

    /// Parse the caller's `extra_args` JSON string. Blank input means "none".
    pub fn parse_extra_args(raw: Option<&str>) -> Result<Option<Map<String, Value>>, DomainError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(DomainError::validation(
                "extra_args",
                "must be a JSON object",
            )),
            Err(e) => Err(DomainError::validation("extra_args", e.to_string())),
        }
    }
}

/// Benchmark configuration captured at creation. Immutable once running.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskConfig {
    pub endpoint_id: EndpointId,
    pub dataset: DatasetRef,
    pub concurrency: u32,
    pub total_requests: u32,
    #[serde(default)]
    pub bounds: RequestBounds,
}

impl TaskConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.concurrency == 0 {
            return Err(DomainError::validation("concurrency", "must be at least 1"));
        }
        if self.total_requests == 0 {
            return Err(DomainError::validation(
                "total_requests",
                "must be at least 1",
            ));
        }
        self.bounds.validate()
    }
}

/// Result payload of a completed task, stored as pipe/comma-delimited text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskResults {
    pub summary_results: String,
    pub percentile_results: String,
    pub raw_output: String,
}

/// A task about to be inserted; the store assigns the id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewTask {
    pub owner_id: OwnerId,
    pub model_name: String,
    pub dataset_name: String,
    pub config: TaskConfig,
    pub created_at: u64,
}

/// One requested benchmark run and its lifecycle record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub model_name: String,
    pub dataset_name: String,
    pub config: TaskConfig,
    pub state: TaskState,
    pub results: Option<TaskResults>,
    pub error_message: Option<String>,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
}

impl Task {
    #[must_use]
    pub fn from_new(id: TaskId, new: NewTask) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            model_name: new.model_name,
            dataset_name: new.dataset_name,
            config: new.config,
            state: TaskState::Pending,
            results: None,
            error_message: None,
            created_at: new.created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a lifecycle transition, setting state and payload together.
    pub fn apply(&mut self, transition: Transition) -> Result<(), DomainError> {
        self.state = self.state.transition_to(transition.target())?;
        match transition {
            Transition::Start { at } => {
                self.started_at = Some(at);
            }
            Transition::Complete { results, at } => {
                self.results = Some(results);
                self.completed_at = Some(at);
            }
            Transition::Fail { error, at } => {
                self.error_message = Some(error);
                self.completed_at = Some(at);
            }
        }
        Ok(())
    }

    /// Exactly one of results/error is set once terminal; neither before.
    pub fn payload_consistent(&self) -> bool {
        match self.state {
            TaskState::Pending | TaskState::Running => {
                self.results.is_none() && self.error_message.is_none()
            }
            TaskState::Completed => self.results.is_some() && self.error_message.is_none(),
            TaskState::Failed => self.results.is_none() && self.error_message.is_some(),
        }
    }
}

/// A forward move through the task lifecycle with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start { at: u64 },
    Complete { results: TaskResults, at: u64 },
    Fail { error: String, at: u64 },
}

impl Transition {
    #[must_use]
    pub fn start() -> Self {
        Self::Start { at: now_millis() }
    }

    #[must_use]
    pub fn complete(results: TaskResults) -> Self {
        Self::Complete {
            results,
            at: now_millis(),
        }
    }

    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self::Fail {
            error: error.into(),
            at: now_millis(),
        }
    }

    pub fn target(&self) -> TaskState {
        match self {
            Self::Start { .. } => TaskState::Running,
            Self::Complete { .. } => TaskState::Completed,
            Self::Fail { .. } => TaskState::Failed,
        }
    }

    /// States from which this transition may be applied.
    pub fn allowed_from(&self) -> &'static [TaskState] {
        match self {
            Self::Start { .. } => &[TaskState::Pending],
            Self::Complete { .. } => &[TaskState::Running],
            Self::Fail { .. } => &[TaskState::Pending, TaskState::Running],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TaskConfig {
        TaskConfig {
            endpoint_id: EndpointId::new(3),
            dataset: DatasetRef::BuiltIn,
            concurrency: 4,
            total_requests: 20,
            bounds: RequestBounds::default(),
        }
    }

    fn pending_task() -> Task {
        Task::from_new(
            TaskId::new(1),
            NewTask {
                owner_id: OwnerId::new(7),
                model_name: "qwen-7b".to_string(),
                dataset_name: "openqa".to_string(),
                config: config(),
                created_at: 1_707_934_567_000,
            },
        )
    }

    fn results() -> TaskResults {
        TaskResults {
            summary_results: "Total requests|20\n".to_string(),
            percentile_results: "Percentiles|10%,50%\n".to_string(),
            raw_output: "Benchmarking summary:\n".to_string(),
        }
    }

    #[test]
    fn new_task_is_pending_with_empty_payload() {
        let task = pending_task();
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.payload_consistent());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn success_path_sets_results_and_timestamps() {
        let mut task = pending_task();
        task.apply(Transition::Start { at: 10 }).unwrap();
        assert_eq!(task.state, TaskState::Running);
        assert_eq!(task.started_at, Some(10));
        assert!(task.payload_consistent());

        task.apply(Transition::Complete {
            results: results(),
            at: 20,
        })
        .unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.completed_at, Some(20));
        assert!(task.error_message.is_none());
        assert!(task.payload_consistent());
    }

    #[test]
    fn launch_failure_goes_straight_to_failed() {
        let mut task = pending_task();
        task.apply(Transition::fail("spawn failed")).unwrap();
        assert_eq!(task.state, TaskState::Failed);
        assert!(task.started_at.is_none());
        assert_eq!(task.error_message.as_deref(), Some("spawn failed"));
        assert!(task.payload_consistent());
    }

    #[test]
    fn terminal_task_rejects_second_terminal_transition() {
        let mut task = pending_task();
        task.apply(Transition::start()).unwrap();
        task.apply(Transition::fail("boom")).unwrap();
        let before = task.clone();
        assert!(task.apply(Transition::complete(results())).is_err());
        assert!(task.apply(Transition::start()).is_err());
        assert_eq!(task, before);
    }

    #[test]
    fn complete_requires_running() {
        let mut task = pending_task();
        assert!(task.apply(Transition::complete(results())).is_err());
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.results.is_none());
    }

    #[test]
    fn allowed_from_matches_state_machine() {
        assert_eq!(Transition::start().allowed_from(), &[TaskState::Pending]);
        assert_eq!(
            Transition::complete(results()).allowed_from(),
            &[TaskState::Running]
        );
        assert_eq!(
            Transition::fail("x").allowed_from(),
            &[TaskState::Pending, TaskState::Running]
        );
    }

    #[test]
    fn config_rejects_zero_concurrency_and_requests() {
        let mut c = config();
        c.concurrency = 0;
        assert!(matches!(
            c.validate(),
            Err(DomainError::Validation {
                field: "concurrency",
                ..
            })
        ));
        let mut c = config();
        c.total_requests = 0;
        assert!(matches!(
            c.validate(),
            Err(DomainError::Validation {
                field: "total_requests",
                ..
            })
        ));
    }

    #[test]
    fn bounds_reject_inverted_prompt_lengths() {
        let bounds = RequestBounds {
            min_prompt_length: Some(512),
            max_prompt_length: Some(128),
            ..RequestBounds::default()
        };
        assert!(matches!(
            bounds.validate(),
            Err(DomainError::Validation {
                field: "max_prompt_length",
                ..
            })
        ));
    }

    #[test]
    fn bounds_reject_zero_max_tokens() {
        let bounds = RequestBounds {
            max_tokens: Some(0),
            ..RequestBounds::default()
        };
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn extra_args_must_be_object() {
        let parsed = RequestBounds::parse_extra_args(Some(r#"{"temperature": 0.2}"#))
            .unwrap()
            .unwrap();
        assert_eq!(parsed["temperature"], 0.2);

        assert!(RequestBounds::parse_extra_args(Some("  ")).unwrap().is_none());
        assert!(RequestBounds::parse_extra_args(None).unwrap().is_none());
        assert!(RequestBounds::parse_extra_args(Some("[1, 2]")).is_err());
        assert!(RequestBounds::parse_extra_args(Some("{not json")).is_err());
    }

    #[test]
    fn task_round_trip() {
        let mut task = pending_task();
        task.config.bounds.max_tokens = Some(256);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
