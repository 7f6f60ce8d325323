use crate::domain::{Action, TaskState};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by engine operations.
///
/// Every variant is a rejection: the active set is left exactly as it was before the
/// call, except for `InvariantViolation`, which freezes the affected task's elapsed
/// value at its last trusted reading.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The task's current state does not allow the requested operation
    #[error("Cannot {action} task {task_id} while it is {state}")]
    InvalidTransition {
        task_id: Uuid,
        state: TaskState,
        action: Action,
    },

    /// Assigning the parent would make the task its own ancestor
    #[error("Task {parent_id} is {task_id} or one of its subtasks")]
    CycleDetected { task_id: Uuid, parent_id: Uuid },

    /// No completion left to restore
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Task id not present in the active set
    #[error("No active task with id {0}")]
    UnknownTask(Uuid),

    /// Creation fields rejected
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Interval log of a task is inconsistent
    #[error("Task {task_id} has inconsistent work intervals: {detail}")]
    InvariantViolation { task_id: Uuid, detail: String },

    /// Store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors raised by a task store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("Corrupt data in {} at line {line}: {message}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let id = Uuid::nil();
        let err = EngineError::InvalidTransition {
            task_id: id,
            state: TaskState::Backlog,
            action: Action::Pause,
        };
        assert_eq!(
            err.to_string(),
            format!("Cannot pause task {} while it is backlog", id)
        );
    }

    #[test]
    fn test_persistence_error_converts() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: EngineError = PersistenceError::from(json_err).into();
        assert!(matches!(err, EngineError::Persistence(PersistenceError::Json(_))));
    }
}
