use crate::domain::{CompletionRecord, TaskState};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Which alarm sounds a stop request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopScope {
    Task(Uuid),
    All,
}

/// Events published by the engine, in the order the changes happened
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A task changed state. `from` is None for a newly created task.
    Transition {
        task_id: Uuid,
        from: Option<TaskState>,
        to: TaskState,
        at: DateTime<Utc>,
    },
    /// Start looping the alarm for a task at the given level
    SoundRequest { task_id: Uuid, level: u32 },
    /// Stop alarm sound. Safe to repeat.
    SoundStop(StopScope),
    /// A task completed and left the active set
    Completion(CompletionRecord),
}
