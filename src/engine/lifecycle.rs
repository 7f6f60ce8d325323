//! Task state transitions.
//!
//! ```text
//! Backlog -> Ongoing <-> Paused
//!               \         /
//!                Completed  --undo-->  Ongoing
//! ```
//!
//! Every operation checks its preconditions before touching anything, so a rejected
//! call leaves the active set unchanged. Pause is the only way into Paused and always
//! silences the task's alarm.

use super::accounting;
use super::alarm;
use super::events::{EngineEvent, StopScope};
use super::EngineState;
use crate::domain::{Action, CompletionRecord, NewTask, Task, TaskState};
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

impl EngineState {
    pub(crate) fn index_of(&self, id: Uuid) -> EngineResult<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EngineError::UnknownTask(id))
    }

    fn require_state(&self, idx: usize, allowed: &[TaskState], action: Action) -> EngineResult<()> {
        let task = &self.tasks[idx];
        if allowed.contains(&task.state) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                task_id: task.id,
                state: task.state,
                action,
            })
        }
    }

    fn emit_transition(&mut self, task_id: Uuid, from: Option<TaskState>, to: TaskState, at: DateTime<Utc>) {
        debug!(task = %task_id, from = ?from, to = %to, "transition");
        self.outbox.push(EngineEvent::Transition {
            task_id,
            from,
            to,
            at,
        });
    }

    fn log_fault(fault: Option<EngineError>) {
        if let Some(err) = fault {
            error!("{}", err);
        }
    }

    /// Add a task to the active set, starting it right away when auto-start is on
    pub fn create_task(&mut self, fields: NewTask, now: DateTime<Utc>) -> EngineResult<Uuid> {
        let name = fields.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidTask("name is empty".to_string()));
        }
        if fields.estimated_seconds <= 0 {
            return Err(EngineError::InvalidTask(
                "estimate must be greater than zero".to_string(),
            ));
        }
        if let Some(ambitious) = fields.ambitious_seconds {
            if ambitious <= 0 || ambitious > fields.estimated_seconds {
                return Err(EngineError::InvalidTask(format!(
                    "ambitious time {}s must be positive and within the estimate {}s",
                    ambitious, fields.estimated_seconds
                )));
            }
        }
        if let Some(parent) = fields.parent_id {
            self.index_of(parent)?;
        }

        let task = Task::new(NewTask { name, ..fields }, self.config.default_mode(), now);
        let id = task.id;
        info!(task = %id, name = %task.name, estimate = task.estimated_seconds, "task created");
        self.tasks.push(task);
        self.emit_transition(id, None, TaskState::Backlog, now);

        if self.config.auto_start {
            let idx = self.tasks.len() - 1;
            self.apply_start(idx, now);
        }
        Ok(id)
    }

    /// Backlog -> Ongoing
    pub fn start(&mut self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        let idx = self.index_of(id)?;
        self.require_state(idx, &[TaskState::Backlog], Action::Start)?;
        self.apply_start(idx, now);
        Ok(())
    }

    fn apply_start(&mut self, idx: usize, now: DateTime<Utc>) {
        let task = &mut self.tasks[idx];
        task.open_interval(now);
        task.started_at.get_or_insert(now);
        task.alarm.reset();
        task.state = TaskState::Ongoing;
        let id = task.id;
        self.emit_transition(id, Some(TaskState::Backlog), TaskState::Ongoing, now);
    }

    /// Ongoing -> Paused
    pub fn pause(&mut self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        let idx = self.index_of(id)?;
        self.require_state(idx, &[TaskState::Ongoing], Action::Pause)?;
        self.apply_pause(idx, now);
        Ok(())
    }

    /// The single place a task becomes Paused
    pub(crate) fn apply_pause(&mut self, idx: usize, now: DateTime<Utc>) {
        let task = &mut self.tasks[idx];
        task.close_open_intervals(now);
        let settled = accounting::settle(task, now);
        Self::log_fault(settled.fault);
        alarm::suppress(task);
        task.state = TaskState::Paused;
        let id = task.id;

        self.outbox.push(EngineEvent::SoundStop(StopScope::Task(id)));
        self.emit_transition(id, Some(TaskState::Ongoing), TaskState::Paused, now);
    }

    /// Paused -> Ongoing
    pub fn resume(&mut self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        let idx = self.index_of(id)?;
        self.require_state(idx, &[TaskState::Paused], Action::Resume)?;
        self.apply_resume(idx, now);
        Ok(())
    }

    pub(crate) fn apply_resume(&mut self, idx: usize, now: DateTime<Utc>) {
        let task = &mut self.tasks[idx];
        task.open_interval(now);
        task.state = TaskState::Ongoing;
        let settled = accounting::settle(task, now);
        Self::log_fault(settled.fault);
        let ring = alarm::rearm(task, settled.elapsed);
        let id = task.id;

        self.emit_transition(id, Some(TaskState::Paused), TaskState::Ongoing, now);
        if let Some(level) = ring {
            info!(task = %id, level, "still overtime on resume");
            self.outbox.push(EngineEvent::SoundRequest { task_id: id, level });
        }
    }

    /// Start, pause or resume depending on the current state
    pub fn toggle(&mut self, id: Uuid, now: DateTime<Utc>) -> EngineResult<TaskState> {
        let idx = self.index_of(id)?;
        match self.tasks[idx].state {
            TaskState::Backlog => self.apply_start(idx, now),
            TaskState::Ongoing => self.apply_pause(idx, now),
            TaskState::Paused => self.apply_resume(idx, now),
            TaskState::Completed => {
                return Err(EngineError::InvalidTransition {
                    task_id: id,
                    state: TaskState::Completed,
                    action: Action::Start,
                })
            }
        }
        Ok(self.tasks[idx].state)
    }

    /// Ongoing or Paused -> Completed. The task leaves the active set.
    pub fn complete(&mut self, id: Uuid, now: DateTime<Utc>) -> EngineResult<CompletionRecord> {
        let idx = self.index_of(id)?;
        self.require_state(idx, &[TaskState::Ongoing, TaskState::Paused], Action::Complete)?;

        let mut task = self.tasks.remove(idx);
        let from = task.state;
        task.close_open_intervals(now);
        let settled = accounting::settle(&mut task, now);
        Self::log_fault(settled.fault);
        task.alarm.sounding = false;
        task.completed_at = Some(now);
        task.state = TaskState::Completed;

        let classification = task.classify(settled.elapsed);
        let record = CompletionRecord {
            task,
            classification,
            elapsed_seconds: settled.elapsed,
            position: idx,
        };
        info!(
            task = %id,
            elapsed = settled.elapsed,
            classification = ?classification,
            "task completed"
        );

        self.last_completion = Some(record.clone());
        self.outbox.push(EngineEvent::SoundStop(StopScope::Task(id)));
        self.emit_transition(id, Some(from), TaskState::Completed, now);
        self.outbox.push(EngineEvent::Completion(record.clone()));
        Ok(record)
    }

    /// Id of the completion that undo would restore
    pub fn undo_target(&self) -> Option<Uuid> {
        self.last_completion.as_ref().map(|r| r.task.id)
    }

    /// Restore the most recent completion as an Ongoing task. Only one level deep.
    pub fn undo(&mut self, now: DateTime<Utc>) -> EngineResult<Uuid> {
        let record = self.last_completion.take().ok_or(EngineError::NothingToUndo)?;

        let mut task = record.task;
        task.completed_at = None;
        task.state = TaskState::Ongoing;
        task.alarm.reset();
        task.open_interval(now);
        let settled = accounting::settle(&mut task, now);
        Self::log_fault(settled.fault);

        let id = task.id;
        let position = record.position.min(self.tasks.len());
        self.tasks.insert(position, task);
        info!(task = %id, "completion undone");
        self.emit_transition(id, Some(TaskState::Completed), TaskState::Ongoing, now);
        Ok(id)
    }

    /// Silence every sounding alarm. Levels are kept, so only a higher level rings again.
    pub fn quiet(&mut self) -> usize {
        let mut quieted = 0;
        for task in self.tasks.iter_mut().filter(|t| t.state == TaskState::Ongoing) {
            if alarm::quiet(task) {
                quieted += 1;
            }
        }
        if quieted > 0 {
            info!(count = quieted, "alarms quieted");
        }
        self.outbox.push(EngineEvent::SoundStop(StopScope::All));
        quieted
    }

    /// Make `task_id` a subtask of `parent_id`, or clear the link if it already is one.
    /// Returns the new parent.
    pub fn toggle_subtask(&mut self, task_id: Uuid, parent_id: Uuid) -> EngineResult<Option<Uuid>> {
        let idx = self.index_of(task_id)?;
        self.index_of(parent_id)?;

        if self.tasks[idx].parent_id == Some(parent_id) {
            self.tasks[idx].parent_id = None;
            debug!(task = %task_id, "subtask link cleared");
            return Ok(None);
        }

        if self.is_ancestor_or_self(task_id, parent_id) {
            return Err(EngineError::CycleDetected { task_id, parent_id });
        }

        self.tasks[idx].parent_id = Some(parent_id);
        debug!(task = %task_id, parent = %parent_id, "subtask link set");
        Ok(Some(parent_id))
    }

    /// Whether `ancestor` appears on the parent chain starting at `node` (inclusive)
    fn is_ancestor_or_self(&self, ancestor: Uuid, node: Uuid) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            // A chain longer than the set means an existing loop; stop walking
            steps += 1;
            if steps > self.tasks.len() {
                return true;
            }
            current = self
                .tasks
                .iter()
                .find(|t| t.id == id)
                .and_then(|t| t.parent_id);
        }
        false
    }

    /// One-time switch of a legacy task to interval accounting.
    /// Returns false if the task was already precise.
    pub fn convert_to_precise(&mut self, id: Uuid) -> EngineResult<bool> {
        let idx = self.index_of(id)?;
        self.require_state(
            idx,
            &[TaskState::Backlog, TaskState::Paused],
            Action::ConvertToPrecise,
        )?;
        let converted = accounting::convert_to_precise(&mut self.tasks[idx]);
        if converted {
            info!(task = %id, elapsed = self.tasks[idx].last_known_elapsed, "legacy task converted");
        }
        Ok(converted)
    }
}
