use std::str::FromStr;

use crate::error::DomainError;

/// Benchmark task state machine.
///
/// `pending -> running -> {completed | failed}`, plus `pending -> failed`
/// when the worker process could not be launched. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                // Launch error: the worker never started
                | (Self::Pending, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn transition_to(self, next: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TaskState {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::InvalidState(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskState; 4] = [
        TaskState::Pending,
        TaskState::Running,
        TaskState::Completed,
        TaskState::Failed,
    ];

    #[test]
    fn normal_flow() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Completed));
        assert!(TaskState::Running.can_transition_to(TaskState::Failed));
    }

    #[test]
    fn launch_failure_skips_running() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Completed));
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!TaskState::Running.can_transition_to(TaskState::Pending));
        assert!(!TaskState::Running.can_transition_to(TaskState::Running));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Pending));
    }

    #[test]
    fn no_transitions_from_terminal() {
        for terminal in [TaskState::Completed, TaskState::Failed] {
            for target in ALL {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn transition_to_returns_error_on_invalid() {
        let err = TaskState::Completed
            .transition_to(TaskState::Failed)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state transition: completed -> failed"
        );
    }

    #[test]
    fn parse_round_trips_as_str() {
        for state in ALL {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
        }
        assert!("cancelled".parse::<TaskState>().is_err());
    }

    #[test]
    fn serde_snake_case() {
        let json = serde_json::to_string(&TaskState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let back: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskState::Running);
    }
}
