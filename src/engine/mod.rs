//! Task lifecycle and timing engine.
//!
//! [`Engine`] owns the active task set behind a single lock. Every transition, tick pass
//! and sleep/wake batch runs as one critical section, and the events it produced are
//! published to subscribers before the lock is released, so subscribers see them in
//! the order the changes were made.

pub mod accounting;
pub mod alarm;
pub mod events;
mod lifecycle;
pub mod sleep;
mod tick;

pub use events::{EngineEvent, StopScope};
pub use sleep::SleepWakeCoordinator;
pub use tick::TickReport;

use crate::domain::{AccountingMode, AlarmState, CompletionRecord, NewTask, Task, TaskState};
use crate::error::EngineResult;
use crate::metrics::Span;
use chrono::{DateTime, Duration, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Engine settings fixed for the lifetime of an engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// New tasks use interval accounting; otherwise they use the legacy counter
    pub precise_intervals: bool,
    /// New tasks go straight to Ongoing
    pub auto_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precise_intervals: true,
            auto_start: true,
        }
    }
}

impl EngineConfig {
    pub fn default_mode(&self) -> AccountingMode {
        if self.precise_intervals {
            AccountingMode::Precise
        } else {
            AccountingMode::Legacy
        }
    }
}

/// Everything guarded by the engine lock
#[derive(Debug)]
pub struct EngineState {
    pub(crate) tasks: Vec<Task>,
    pub(crate) last_completion: Option<CompletionRecord>,
    pub(crate) sleep: SleepWakeCoordinator,
    pub(crate) last_tick: Option<DateTime<Utc>>,
    /// Sub-second remainder carried between ticks for legacy accrual
    pub(crate) tick_carry: Duration,
    /// Events produced by the current critical section, drained on unlock
    pub(crate) outbox: Vec<EngineEvent>,
    pub(crate) config: EngineConfig,
}

impl EngineState {
    pub fn new(config: EngineConfig, tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            last_completion: None,
            sleep: SleepWakeCoordinator::new(),
            last_tick: None,
            tick_carry: Duration::zero(),
            outbox: Vec::new(),
            config,
        }
    }
}

type TickCallback = Box<dyn Fn(&TickReport) + Send>;

/// The engine context. Independent instances share nothing.
pub struct Engine {
    state: Mutex<EngineState>,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
    tick_callbacks: Mutex<Vec<TickCallback>>,
}

impl Engine {
    /// Build an engine over a previously loaded active set
    pub fn new(config: EngineConfig, tasks: Vec<Task>) -> Self {
        info!(
            tasks = tasks.len(),
            precise = config.precise_intervals,
            "engine started"
        );
        Self {
            state: Mutex::new(EngineState::new(config, tasks)),
            subscribers: Mutex::new(Vec::new()),
            tick_callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Seed the undo slot from the store's most recent completion.
    /// Ignored if that task is already back in the active set.
    pub fn restore_last_completion(&self, record: CompletionRecord) {
        let mut st = self.state.lock();
        if st.tasks.iter().any(|t| t.id == record.task.id) {
            debug!(task = %record.task.id, "latest completion already active, not restoring");
            return;
        }
        st.last_completion = Some(record);
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Register a callback run after every tick pass, outside the engine lock
    pub fn on_tick<F>(&self, callback: F)
    where
        F: Fn(&TickReport) + Send + 'static,
    {
        self.tick_callbacks.lock().push(Box::new(callback));
    }

    /// Run one critical section and publish what it produced
    fn run<T>(&self, f: impl FnOnce(&mut EngineState) -> T) -> T {
        let mut st = self.state.lock();
        let result = f(&mut st);
        let events = std::mem::take(&mut st.outbox);
        if !events.is_empty() {
            self.publish(events);
        }
        result
    }

    fn publish(&self, events: Vec<EngineEvent>) {
        let mut subscribers = self.subscribers.lock();
        for event in events {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn create_task(&self, fields: NewTask, now: DateTime<Utc>) -> EngineResult<Uuid> {
        self.run(|st| st.create_task(fields, now))
    }

    pub fn start(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        self.run(|st| st.start(id, now))
    }

    pub fn pause(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        self.run(|st| st.pause(id, now))
    }

    pub fn resume(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        self.run(|st| st.resume(id, now))
    }

    pub fn toggle(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<TaskState> {
        self.run(|st| st.toggle(id, now))
    }

    pub fn complete(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<CompletionRecord> {
        self.run(|st| st.complete(id, now))
    }

    pub fn undo(&self, now: DateTime<Utc>) -> EngineResult<Uuid> {
        self.run(|st| st.undo(now))
    }

    pub fn undo_target(&self) -> Option<Uuid> {
        self.state.lock().undo_target()
    }

    pub fn quiet(&self) -> usize {
        self.run(|st| st.quiet())
    }

    pub fn toggle_subtask(&self, task_id: Uuid, parent_id: Uuid) -> EngineResult<Option<Uuid>> {
        self.run(|st| st.toggle_subtask(task_id, parent_id))
    }

    pub fn convert_to_precise(&self, id: Uuid) -> EngineResult<bool> {
        self.run(|st| st.convert_to_precise(id))
    }

    /// One evaluation pass over every Ongoing task
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let report = self.run(|st| st.tick(now));

        // Callbacks run unlocked so one may register another
        let callbacks = std::mem::take(&mut *self.tick_callbacks.lock());
        for callback in &callbacks {
            callback(&report);
        }
        let mut registry = self.tick_callbacks.lock();
        let added = std::mem::replace(&mut *registry, callbacks);
        registry.extend(added);
        report
    }

    /// Sleep signal. Returns the tasks paused for it.
    pub fn sleep(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.run(|st| st.sleep(now))
    }

    /// Wake signal. Returns the tasks resumed.
    pub fn wake(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.run(|st| st.wake(now))
    }

    pub fn is_asleep(&self) -> bool {
        self.state.lock().sleep.is_asleep()
    }

    /// Tasks the current sleep paused and wake will resume
    pub fn sleep_paused(&self) -> Vec<Uuid> {
        self.state.lock().sleep.sleep_paused_ids().to_vec()
    }

    pub fn elapsed_seconds(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<i64> {
        let st = self.state.lock();
        let idx = st.index_of(id)?;
        Ok(accounting::elapsed_seconds(&st.tasks[idx], now))
    }

    pub fn alarm_state(&self, id: Uuid) -> EngineResult<AlarmState> {
        let st = self.state.lock();
        let idx = st.index_of(id)?;
        Ok(st.tasks[idx].alarm)
    }

    pub fn task(&self, id: Uuid) -> EngineResult<Task> {
        let st = self.state.lock();
        let idx = st.index_of(id)?;
        Ok(st.tasks[idx].clone())
    }

    /// Copy of the active set, in display order
    pub fn snapshot(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Interval spans of the active set, for metrics computed outside the lock
    pub fn active_spans(&self) -> Vec<Span> {
        crate::metrics::spans_from_tasks(&self.state.lock().tasks)
    }

    /// Tear the engine down: silence every alarm, drop subscribers and callbacks,
    /// and hand back the active set to persist. Ongoing tasks stay Ongoing so their
    /// open intervals keep counting until the next start.
    pub fn shutdown(&self) -> Vec<Task> {
        let tasks = self.run(|st| {
            st.outbox.push(EngineEvent::SoundStop(StopScope::All));
            info!(tasks = st.tasks.len(), "engine shut down");
            st.tasks.clone()
        });
        self.subscribers.lock().clear();
        self.tick_callbacks.lock().clear();
        tasks
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.try_lock() {
            Some(st) => f
                .debug_struct("Engine")
                .field("tasks", &st.tasks.len())
                .field("asleep", &st.sleep.is_asleep())
                .finish(),
            None => f.debug_struct("Engine").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Vec::new())
    }

    #[test]
    fn test_events_arrive_in_order() {
        let engine = engine();
        let rx = engine.subscribe();
        let id = engine.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        engine.pause(id, at(10)).unwrap();

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::Transition {
                    task_id: id,
                    from: None,
                    to: TaskState::Backlog,
                    at: at(0)
                },
                EngineEvent::Transition {
                    task_id: id,
                    from: Some(TaskState::Backlog),
                    to: TaskState::Ongoing,
                    at: at(0)
                },
                EngineEvent::SoundStop(StopScope::Task(id)),
                EngineEvent::Transition {
                    task_id: id,
                    from: Some(TaskState::Ongoing),
                    to: TaskState::Paused,
                    at: at(10)
                },
            ]
        );
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let engine = engine();
        let rx = engine.subscribe();
        drop(rx);
        engine.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        assert!(engine.subscribers.lock().is_empty());
    }

    #[test]
    fn test_rejected_operation_publishes_nothing() {
        let engine = engine();
        let id = engine.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        let rx = engine.subscribe();
        assert!(matches!(
            engine.resume(id, at(5)),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_independent_instances() {
        let a = engine();
        let b = engine();
        a.create_task(NewTask::new("Only in A", 900), at(0)).unwrap();
        assert_eq!(a.snapshot().len(), 1);
        assert!(b.snapshot().is_empty());
    }

    #[test]
    fn test_tick_callbacks_run() {
        let engine = engine();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        engine.on_tick(move |report| {
            seen.fetch_add(report.evaluated, Ordering::SeqCst);
        });
        engine.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        engine.tick(at(1));
        engine.tick(at(2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tick_callback_may_register_another() {
        let engine = Arc::new(engine());
        let count = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&engine);
        let seen = Arc::clone(&count);
        engine.on_tick(move |_| {
            if let Some(engine) = weak.upgrade() {
                let seen = Arc::clone(&seen);
                engine.on_tick(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        engine.tick(at(1));
        engine.tick(at(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tick_callbacks.lock().len(), 3);
    }

    #[test]
    fn test_queries() {
        let engine = engine();
        let id = engine.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        assert_eq!(engine.elapsed_seconds(id, at(42)).unwrap(), 42);
        assert_eq!(engine.alarm_state(id).unwrap(), AlarmState::default());
        assert_eq!(engine.task(id).unwrap().name, "Write");
        assert!(matches!(
            engine.elapsed_seconds(Uuid::new_v4(), at(0)),
            Err(EngineError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_restore_last_completion_enables_undo() {
        let first = engine();
        let id = first.create_task(NewTask::new("Write", 900), at(0)).unwrap();
        let record = first.complete(id, at(60)).unwrap();

        let second = engine();
        second.restore_last_completion(record);
        assert_eq!(second.undo_target(), Some(id));
        assert_eq!(second.undo(at(100)).unwrap(), id);
        assert_eq!(second.snapshot()[0].state, TaskState::Ongoing);
    }

    #[test]
    fn test_shutdown_silences_and_disconnects() {
        let engine = engine();
        let rx = engine.subscribe();
        engine.create_task(NewTask::new("A", 900), at(0)).unwrap();
        engine.create_task(NewTask::new("B", 900), at(0)).unwrap();
        let seen = rx.try_iter().count();
        assert!(seen > 0);

        let tasks = engine.shutdown();
        assert!(tasks.iter().all(|t| t.state == TaskState::Ongoing));
        assert!(tasks.iter().all(|t| t.has_open_interval()));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::SoundStop(StopScope::All)]
        );
        assert!(rx.try_recv().is_err());
        assert!(engine.subscribers.lock().is_empty());
    }
}
