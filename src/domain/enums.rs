use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Backlog,
    Ongoing,
    Paused,
    Completed,
}

impl TaskState {
    /// Convert state to its stored tag
    pub fn to_tag(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Ongoing => "ongoing",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Check if a task in this state belongs in the active set
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Backlog | Self::Ongoing | Self::Paused)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_tag())
    }
}

/// How a task's elapsed time is accounted. Fixed when the task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountingMode {
    /// Elapsed time is the sum of recorded work intervals
    Precise,
    /// Elapsed time is a running counter advanced by the tick driver
    Legacy,
}

/// Outcome class of a completed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    /// Finished before the stretch target
    Ambitious,
}

/// Operations that move a task between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Pause,
    Resume,
    Complete,
    ConvertToPrecise,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Complete => "complete",
            Action::ConvertToPrecise => "convert",
        };
        f.write_str(name)
    }
}

/// UI mode for the terminal front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    AddingTask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_is_active() {
        assert!(TaskState::Backlog.is_active());
        assert!(TaskState::Ongoing.is_active());
        assert!(TaskState::Paused.is_active());
        assert!(!TaskState::Completed.is_active());
        assert_eq!(TaskState::Ongoing.to_string(), "ongoing");
    }

    #[test]
    fn test_task_state_serde_tag() {
        let json = serde_json::to_string(&TaskState::Ongoing).unwrap();
        assert_eq!(json, "\"ongoing\"");
        let parsed: TaskState = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(parsed, TaskState::Paused);
    }
}
