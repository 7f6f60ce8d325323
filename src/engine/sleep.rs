use super::EngineState;
use crate::domain::TaskState;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Remembers which tasks a sleep signal paused, so wake resumes only those.
///
/// Signals are level-triggered: a second Sleep while asleep, or a Wake while awake,
/// changes nothing.
#[derive(Debug, Clone, Default)]
pub struct SleepWakeCoordinator {
    asleep: bool,
    sleep_paused_ids: Vec<Uuid>,
}

impl SleepWakeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Tasks paused by the current sleep, in the order they were paused
    pub fn sleep_paused_ids(&self) -> &[Uuid] {
        &self.sleep_paused_ids
    }

    /// Enter the sleeping state with the tasks that were paused for it.
    /// Returns false if already asleep.
    pub fn begin_sleep(&mut self, paused: Vec<Uuid>) -> bool {
        if self.asleep {
            return false;
        }
        self.asleep = true;
        self.sleep_paused_ids = paused;
        true
    }

    /// Leave the sleeping state, handing back the ids to resume.
    /// Returns None if not asleep.
    pub fn end_sleep(&mut self) -> Option<Vec<Uuid>> {
        if !self.asleep {
            return None;
        }
        self.asleep = false;
        Some(std::mem::take(&mut self.sleep_paused_ids))
    }
}

impl EngineState {
    /// Pause every Ongoing task as one batch and remember which ones were paused.
    /// Tasks the user already paused are left alone.
    pub fn sleep(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        if self.sleep.is_asleep() {
            debug!("sleep signal while asleep, ignored");
            return Vec::new();
        }

        let ongoing: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Ongoing)
            .map(|(i, _)| i)
            .collect();

        let mut paused = Vec::with_capacity(ongoing.len());
        for idx in ongoing {
            self.apply_pause(idx, now);
            paused.push(self.tasks[idx].id);
        }

        self.sleep.begin_sleep(paused.clone());
        self.last_tick = Some(now);
        info!(paused = paused.len(), "sleep: tasks paused");
        paused
    }

    /// Resume the tasks the last sleep paused, if they are still Paused
    pub fn wake(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let Some(ids) = self.sleep.end_sleep() else {
            debug!("wake signal while awake, ignored");
            return Vec::new();
        };

        let mut resumed = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(idx) = self.index_of(id) else {
                continue;
            };
            if self.tasks[idx].state == TaskState::Paused {
                self.apply_resume(idx, now);
                resumed.push(id);
            }
        }

        self.last_tick = Some(now);
        info!(resumed = resumed.len(), "wake: tasks resumed");
        resumed
    }
}
