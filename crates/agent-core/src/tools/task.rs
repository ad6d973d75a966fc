use serde::{Deserialize, Serialize};

/// Lifecycle state of a remote agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    AuthRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed | TaskState::Rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_protocol_state_names() {
        let state: TaskState = serde_json::from_str("\"input-required\"").unwrap();
        assert_eq!(state, TaskState::InputRequired);

        let state: TaskState = serde_json::from_str("\"paused-by-operator\"").unwrap();
        assert_eq!(state, TaskState::Unknown);
    }

    #[test]
    fn input_required_is_not_terminal() {
        assert!(!TaskState::InputRequired.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }
}
