use crate::config::AppConfig;
use crate::domain::{
    flatten_tasks, format_duration, AccountingMode, CompletionRecord, FlatRow, NewTask, Task, UiMode,
};
use crate::engine::{accounting, Engine, EngineConfig, EngineEvent};
use crate::error::{EngineError, EngineResult};
use crate::metrics::{spans_from_tasks, DayWindow, Span};
use crate::notifications;
use crate::persistence::TaskStore;
use crate::sound::{self, SoundPlayer};
use crate::ticker;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use crossbeam::channel::Receiver;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Input form state for adding tasks
#[derive(Debug, Clone)]
pub struct InputFormState {
    pub name: String,
    /// Estimate in minutes
    pub minutes: String,
    /// Optional stretch target in minutes
    pub ambitious: String,
    pub editing_field: usize, // 0 = name, 1 = minutes, 2 = ambitious
}

pub const FORM_FIELDS: usize = 3;

/// A history write that has not reached the store yet
#[derive(Debug, Clone)]
enum PersistOp {
    Append(CompletionRecord),
    Retract(Uuid),
}

/// Main application state
pub struct AppState {
    pub engine: Engine,
    store: Box<dyn TaskStore>,
    player: Box<dyn SoundPlayer>,
    events: Receiver<EngineEvent>,
    pub config: AppConfig,
    /// Active set as of the last refresh, in engine order
    pub tasks: Vec<Task>,
    pub selected_index: usize,
    pub ui_mode: UiMode,
    pub input_form: Option<InputFormState>,
    pub status_message: Option<String>,
    pub needs_save: bool,
    pending: VecDeque<PersistOp>,
    last_tick_at: Option<DateTime<Utc>>,
    /// Work intervals of tasks completed since the start of the launch day
    completed_spans: Vec<Span>,
}

impl AppState {
    /// Load the active set, repair it, and start an engine over it
    pub fn new(
        config: AppConfig,
        store: Box<dyn TaskStore>,
        player: Box<dyn SoundPlayer>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut tasks = store
            .load_active_tasks()
            .context("Failed to load active tasks")?;

        let mut repaired = false;
        for task in &mut tasks {
            if let Some(fault) = accounting::repair_loaded(task, now) {
                warn!(task = %task.id, "Repaired on load: {}", fault);
                repaired = true;
            }
        }

        let engine = Engine::new(config.engine_config(), tasks);
        match store.latest_completion() {
            Ok(Some(record)) => engine.restore_last_completion(record),
            Ok(None) => {}
            Err(e) => warn!("Could not read completion history: {}", e),
        }
        let day_start = DayWindow::for_local_date(now.with_timezone(&Local).date_naive()).start;
        let completed_spans = match store.load_history() {
            Ok(history) => {
                let tasks: Vec<Task> = history.into_iter().map(|r| r.task).collect();
                spans_from_tasks(&tasks)
                    .into_iter()
                    .filter(|span| span.end.map_or(true, |end| end > day_start))
                    .collect()
            }
            Err(e) => {
                warn!("Could not read completion history: {}", e);
                Vec::new()
            }
        };

        let events = engine.subscribe();
        engine.on_tick(|report| {
            if !report.alarms.is_empty() {
                debug!(
                    evaluated = report.evaluated,
                    alarms = report.alarms.len(),
                    "tick raised alarms"
                );
            }
        });

        let mut app = Self {
            engine,
            store,
            player,
            events,
            config,
            tasks: Vec::new(),
            selected_index: 0,
            ui_mode: UiMode::Normal,
            input_form: None,
            status_message: None,
            needs_save: repaired,
            pending: VecDeque::new(),
            last_tick_at: None,
            completed_spans,
        };
        app.refresh();
        Ok(app)
    }

    /// Re-read the active set from the engine and keep the selection in range
    pub fn refresh(&mut self) {
        self.tasks = self.engine.snapshot();
        if self.selected_index >= self.tasks.len() {
            self.selected_index = self.tasks.len().saturating_sub(1);
        }
    }

    /// Rows in display order
    pub fn rows(&self) -> Vec<FlatRow> {
        flatten_tasks(&self.tasks)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let rows = self.rows();
        let row = rows.get(self.selected_index)?;
        self.tasks.get(row.task_index)
    }

    fn selected_id(&self) -> Option<Uuid> {
        self.selected_task().map(|t| t.id)
    }

    pub fn move_selection_up(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    pub fn move_selection_down(&mut self) {
        if self.selected_index + 1 < self.tasks.len() {
            self.selected_index += 1;
        }
    }

    /// Record a rejected operation in the status bar
    fn check<T>(&mut self, result: EngineResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Operation rejected: {}", e);
                self.status_message = Some(e.to_string());
                None
            }
        }
    }

    /// Publish, persist and redraw after a user action
    fn settle(&mut self) {
        self.drain_events();
        self.flush();
        self.refresh();
    }

    /// Enter / p: start, pause or resume the selected task
    pub fn toggle_selected(&mut self, now: DateTime<Utc>) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let result = self.engine.toggle(id, now);
        if let Some(state) = self.check(result) {
            self.status_message = Some(format!("Task is now {}", state));
        }
        self.settle();
    }

    pub fn complete_selected(&mut self, now: DateTime<Utc>) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let result = self.engine.complete(id, now);
        if let Some(record) = self.check(result) {
            self.status_message = Some(format!(
                "Completed {} in {} (u to undo)",
                record.task.name,
                format_duration(record.elapsed_seconds)
            ));
        }
        self.settle();
    }

    pub fn undo(&mut self, now: DateTime<Utc>) {
        let result = self.engine.undo(now);
        let restored = self.check(result);
        if let Some(id) = restored {
            self.pending.push_back(PersistOp::Retract(id));
            // The restored task's intervals are live again
            self.completed_spans.retain(|span| span.task_id != id);
            self.status_message = Some("Completion undone".to_string());
        }
        self.settle();

        if let Some(id) = restored {
            let tasks = &self.tasks;
            if let Some(pos) = self.rows().iter().position(|row| tasks[row.task_index].id == id) {
                self.selected_index = pos;
            }
        }
    }

    /// q: silence every alarm currently sounding
    pub fn quiet(&mut self) {
        let silenced = self.engine.quiet();
        if silenced > 0 {
            self.status_message = Some(format!("Silenced {} alarm(s)", silenced));
        }
        self.settle();
    }

    /// t: nest the selected task under the task above it, or un-nest it
    pub fn toggle_subtask_selected(&mut self) {
        let rows = self.rows();
        let Some(row) = rows.get(self.selected_index) else {
            return;
        };
        let task = &self.tasks[row.task_index];
        let id = task.id;

        let parent = match task.parent_id {
            Some(parent) => parent,
            None => {
                let Some(above) = self
                    .selected_index
                    .checked_sub(1)
                    .and_then(|i| rows.get(i))
                    .map(|r| &self.tasks[r.task_index])
                else {
                    self.status_message = Some("No task above to nest under".to_string());
                    return;
                };
                above.parent_id.unwrap_or(above.id)
            }
        };

        let result = self.engine.toggle_subtask(id, parent);
        if let Some(new_parent) = self.check(result) {
            self.needs_save = true;
            self.status_message = Some(match new_parent {
                Some(_) => "Nested as subtask".to_string(),
                None => "Moved to top level".to_string(),
            });
        }
        self.settle();
    }

    /// z: pause everything for a sleep, or bring it back
    pub fn toggle_sleep(&mut self, now: DateTime<Utc>) {
        if self.engine.is_asleep() {
            let resumed = self.engine.wake(now);
            self.status_message = Some(format!("Awake, resumed {} task(s)", resumed.len()));
        } else {
            let paused = self.engine.sleep(now);
            self.status_message = Some(format!("Asleep, paused {} task(s)", paused.len()));
        }
        self.settle();
    }

    /// Start adding a new task (opens input form)
    pub fn start_add_task(&mut self) {
        self.input_form = Some(InputFormState {
            name: String::new(),
            minutes: self.config.default_minutes.to_string(),
            ambitious: String::new(),
            editing_field: 0,
        });
        self.ui_mode = UiMode::AddingTask;
    }

    /// Toggle between editing fields in input form (name -> minutes -> ambitious)
    pub fn input_form_toggle_field(&mut self) {
        if let Some(form) = &mut self.input_form {
            form.editing_field = (form.editing_field + 1) % FORM_FIELDS;
        }
    }

    /// Add character to input form (current field)
    pub fn input_form_add_char(&mut self, c: char) {
        if let Some(form) = &mut self.input_form {
            match form.editing_field {
                0 => form.name.push(c),
                1 if c.is_ascii_digit() => form.minutes.push(c),
                2 if c.is_ascii_digit() => form.ambitious.push(c),
                _ => {}
            }
        }
    }

    /// Backspace in input form (current field)
    pub fn input_form_backspace(&mut self) {
        if let Some(form) = &mut self.input_form {
            match form.editing_field {
                0 => {
                    form.name.pop();
                }
                1 => {
                    form.minutes.pop();
                }
                2 => {
                    form.ambitious.pop();
                }
                _ => {}
            }
        }
    }

    /// Submit input form and create the task. An invalid form stays open.
    pub fn submit_input_form(&mut self, now: DateTime<Utc>) {
        let Some(form) = self.input_form.clone() else {
            return;
        };

        let minutes = match form.minutes.trim() {
            "" => self.config.default_minutes,
            raw => match raw.parse::<u32>() {
                Ok(m) => m,
                Err(_) => {
                    self.status_message = Some(format!("Invalid estimate: {}", raw));
                    return;
                }
            },
        };
        let mut fields = NewTask::new(form.name.trim(), i64::from(minutes) * 60);
        if let Ok(ambitious) = form.ambitious.trim().parse::<u32>() {
            fields = fields.with_ambitious(i64::from(ambitious) * 60);
        }

        let result = self.engine.create_task(fields, now);
        if self.check(result).is_none() {
            return;
        }

        self.input_form = None;
        self.ui_mode = UiMode::Normal;
        self.status_message = None;
        self.settle();
        self.selected_index = self.tasks.len().saturating_sub(1);
    }

    /// Cancel input form
    pub fn cancel_input_form(&mut self) {
        self.input_form = None;
        self.ui_mode = UiMode::Normal;
    }

    /// One front-end tick: catch missed sleeps, evaluate alarms, persist
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(prev) = self.last_tick_at {
            if let Some(gap) = ticker::sleep_gap(prev, now, self.config.sleep_gap_secs) {
                if !self.engine.is_asleep() {
                    info!(gap_secs = gap.num_seconds(), "Missed sleep detected");
                    self.engine.sleep(prev);
                    self.engine.wake(now);
                }
            }
        }
        self.last_tick_at = Some(now);

        let report = self.engine.tick(now);
        if report.legacy_accrued > 0 {
            self.needs_save = true;
        }
        if let Some(fault) = report.faults.first() {
            self.status_message = Some(fault.to_string());
        }

        self.drain_events();
        self.player.pulse(Instant::now());
        self.flush();
        self.refresh();
    }

    /// Route pending engine events to sound, notifications and persistence
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            sound::apply_event(self.player.as_mut(), &event);
            match &event {
                EngineEvent::Transition { .. } => self.needs_save = true,
                EngineEvent::SoundRequest { task_id, level } => {
                    self.needs_save = true;
                    // Skip the notification if the alarm was already silenced
                    let sounding = self
                        .engine
                        .alarm_state(*task_id)
                        .map(|alarm| alarm.sounding)
                        .unwrap_or(false);
                    if sounding {
                        if let Ok(task) = self.engine.task(*task_id) {
                            notifications::notify_overtime(&task.name, *level);
                        }
                    }
                }
                EngineEvent::Completion(record) => {
                    notifications::notify_task_completed(
                        &record.task.name,
                        record.classification,
                        &format_duration(record.elapsed_seconds),
                    );
                    self.completed_spans
                        .extend(spans_from_tasks(std::slice::from_ref(&record.task)));
                    self.pending.push_back(PersistOp::Append(record.clone()));
                }
                EngineEvent::SoundStop(_) => {}
            }
        }
    }

    /// Write queued history changes in order, then the active set. Failures are
    /// kept for the next attempt.
    pub fn flush(&mut self) {
        while let Some(op) = self.pending.front() {
            let result = match op {
                PersistOp::Append(record) => self.store.append_completion(record),
                PersistOp::Retract(id) => self.store.retract_completion(*id).map(|found| {
                    if !found {
                        warn!(task = %id, "Undone completion was not in history");
                    }
                }),
            };
            match result {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(e) => {
                    warn!("Failed to write history: {}", e);
                    self.status_message = Some(format!("Save failed: {}", e));
                    break;
                }
            }
        }

        if self.needs_save {
            let tasks = self.engine.snapshot();
            match self.store.save_active_tasks(&tasks) {
                Ok(()) => self.needs_save = false,
                Err(e) => {
                    warn!("Failed to save active tasks: {}", e);
                    self.status_message = Some(format!("Save failed: {}", e));
                }
            }
        }
    }

    /// Intervals of the active set plus those of recently completed tasks
    pub fn work_spans(&self) -> Vec<Span> {
        let mut spans = self.engine.active_spans();
        spans.extend_from_slice(&self.completed_spans);
        spans
    }

    /// Number of history writes still waiting for the store
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Tear the engine down and save what is left
    pub fn shutdown(&mut self) -> Result<()> {
        let tasks = self.engine.shutdown();
        self.drain_events();
        self.needs_save = false;
        self.flush();
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "History writes lost on exit");
        }
        self.store
            .save_active_tasks(&tasks)
            .context("Failed to save active tasks")?;
        Ok(())
    }
}

/// Result of converting one legacy task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Converted { name: String, elapsed_seconds: i64 },
    /// Ongoing tasks must be paused before converting
    SkippedOngoing { name: String },
}

/// Convert every legacy-counter task in the store to interval tracking and save
pub fn convert_legacy(store: &mut dyn TaskStore, now: DateTime<Utc>) -> Result<Vec<Conversion>> {
    let mut tasks = store
        .load_active_tasks()
        .context("Failed to load active tasks")?;
    for task in &mut tasks {
        if let Some(fault) = accounting::repair_loaded(task, now) {
            warn!(task = %task.id, "Repaired on load: {}", fault);
        }
    }

    let legacy: Vec<(Uuid, String)> = tasks
        .iter()
        .filter(|t| t.mode() == AccountingMode::Legacy)
        .map(|t| (t.id, t.name.clone()))
        .collect();
    let engine = Engine::new(EngineConfig::default(), tasks);

    let mut outcomes = Vec::new();
    for (id, name) in legacy {
        match engine.convert_to_precise(id) {
            Ok(true) => outcomes.push(Conversion::Converted {
                name,
                elapsed_seconds: engine.elapsed_seconds(id, now)?,
            }),
            Ok(false) => {}
            Err(EngineError::InvalidTransition { .. }) => {
                outcomes.push(Conversion::SkippedOngoing { name })
            }
            Err(e) => return Err(e.into()),
        }
    }

    if outcomes.iter().any(|o| matches!(o, Conversion::Converted { .. })) {
        store
            .save_active_tasks(&engine.snapshot())
            .context("Failed to save active tasks")?;
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskState;
    use crate::persistence::{JsonFileStore, MemoryStore};
    use crate::sound::testing::RecordingPlayer;
    use crate::sound::TerminalBell;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn silent() -> Box<dyn SoundPlayer> {
        Box::new(TerminalBell::silent(Duration::from_secs(3)))
    }

    fn create_test_app() -> AppState {
        AppState::new(AppConfig::default(), Box::new(MemoryStore::new()), silent(), at(0)).unwrap()
    }

    fn add(app: &mut AppState, name: &str, minutes: &str, now: DateTime<Utc>) {
        app.start_add_task();
        for c in name.chars() {
            app.input_form_add_char(c);
        }
        app.input_form_toggle_field();
        app.input_form_backspace();
        app.input_form_backspace();
        for c in minutes.chars() {
            app.input_form_add_char(c);
        }
        app.submit_input_form(now);
    }

    #[test]
    fn test_app_state_new() {
        let app = create_test_app();
        assert!(app.tasks.is_empty());
        assert_eq!(app.selected_index, 0);
        assert_eq!(app.ui_mode, UiMode::Normal);
        assert!(!app.needs_save);
    }

    #[test]
    fn test_add_task_via_form() {
        let mut app = create_test_app();
        add(&mut app, "Write", "25", at(0));

        assert_eq!(app.ui_mode, UiMode::Normal);
        assert!(app.input_form.is_none());
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].name, "Write");
        assert_eq!(app.tasks[0].estimated_seconds, 1500);
        assert_eq!(app.tasks[0].state, TaskState::Ongoing);
        assert_eq!(app.store.load_active_tasks().unwrap().len(), 1);
        assert!(!app.needs_save);
    }

    #[test]
    fn test_form_defaults_and_rejects() {
        let mut app = create_test_app();
        app.start_add_task();
        assert_eq!(app.input_form.as_ref().unwrap().minutes, "15");

        // Letters are ignored in numeric fields
        app.input_form_toggle_field();
        app.input_form_add_char('x');
        assert_eq!(app.input_form.as_ref().unwrap().minutes, "15");

        // Empty name keeps the form open
        app.submit_input_form(at(0));
        assert_eq!(app.ui_mode, UiMode::AddingTask);
        assert!(app.status_message.is_some());
        assert!(app.tasks.is_empty());

        app.cancel_input_form();
        assert_eq!(app.ui_mode, UiMode::Normal);
    }

    #[test]
    fn test_ambitious_larger_than_estimate_rejected() {
        let mut app = create_test_app();
        app.start_add_task();
        app.input_form_add_char('A');
        app.input_form_toggle_field();
        app.input_form_toggle_field();
        for c in "30".chars() {
            app.input_form_add_char(c);
        }
        app.submit_input_form(at(0));
        assert!(app.input_form.is_some());
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn test_move_selection() {
        let mut app = create_test_app();
        add(&mut app, "A", "10", at(0));
        add(&mut app, "B", "10", at(0));
        add(&mut app, "C", "10", at(0));
        assert_eq!(app.selected_index, 2);

        app.move_selection_down();
        assert_eq!(app.selected_index, 2);
        app.move_selection_up();
        app.move_selection_up();
        app.move_selection_up();
        assert_eq!(app.selected_index, 0);
        assert_eq!(app.selected_task().unwrap().name, "A");
    }

    #[test]
    fn test_toggle_selected() {
        let mut app = create_test_app();
        add(&mut app, "A", "10", at(0));

        app.toggle_selected(at(60));
        assert_eq!(app.tasks[0].state, TaskState::Paused);
        app.toggle_selected(at(120));
        assert_eq!(app.tasks[0].state, TaskState::Ongoing);
        assert_eq!(app.engine.elapsed_seconds(app.tasks[0].id, at(180)).unwrap(), 120);
    }

    #[test]
    fn test_complete_and_undo_update_history() {
        let mut app = create_test_app();
        add(&mut app, "A", "10", at(0));
        add(&mut app, "B", "10", at(0));
        app.move_selection_up();

        app.complete_selected(at(300));
        assert_eq!(app.tasks.len(), 1);
        let history = app.store.load_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.name, "A");

        app.undo(at(400));
        assert_eq!(app.tasks.len(), 2);
        assert_eq!(app.tasks[0].name, "A");
        assert_eq!(app.tasks[0].state, TaskState::Ongoing);
        assert!(app.store.load_history().unwrap().is_empty());
        assert_eq!(app.pending_writes(), 0);

        // Only one level of undo
        app.undo(at(500));
        assert!(app.status_message.is_some());
        assert_eq!(app.tasks.len(), 2);
    }

    #[test]
    fn test_failed_history_write_is_retried() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().join("data");
        let store = JsonFileStore::new(&data_dir);
        let mut app =
            AppState::new(AppConfig::default(), Box::new(store), silent(), at(0)).unwrap();

        // A plain file where the data directory should be makes every write fail
        std::fs::write(&data_dir, "blocked").unwrap();
        add(&mut app, "A", "10", at(0));
        app.complete_selected(at(60));
        assert_eq!(app.pending_writes(), 1);
        assert!(app.needs_save);
        assert!(app.status_message.as_deref().unwrap().starts_with("Save failed"));

        std::fs::remove_file(&data_dir).unwrap();
        app.flush();
        assert_eq!(app.pending_writes(), 0);
        assert!(!app.needs_save);
        assert_eq!(app.store.load_history().unwrap().len(), 1);
        assert!(app.store.load_active_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_tick_detects_missed_sleep() {
        let mut app = create_test_app();
        add(&mut app, "A", "60", at(0));
        let id = app.tasks[0].id;

        app.tick(at(1));
        app.tick(at(1000));
        assert_eq!(app.tasks[0].state, TaskState::Ongoing);
        assert!(!app.engine.is_asleep());
        assert_eq!(app.engine.elapsed_seconds(id, at(1001)).unwrap(), 2);
    }

    #[test]
    fn test_alarm_events_reach_player() {
        let recorder = RecordingPlayer::default();
        let mut app = AppState::new(
            AppConfig::default(),
            Box::new(MemoryStore::new()),
            Box::new(recorder.clone()),
            at(0),
        )
        .unwrap();
        add(&mut app, "A", "1", at(0));
        let id = app.tasks[0].id;

        app.tick(at(20));
        app.tick(at(40));
        app.tick(at(61));
        assert!(recorder.calls().contains(&format!("play {} 1", id)));

        app.quiet();
        assert_eq!(recorder.calls().last().unwrap(), "stop_all");
        assert!(!app.engine.alarm_state(id).unwrap().sounding);
    }

    #[test]
    fn test_toggle_subtask_selected() {
        let mut app = create_test_app();
        add(&mut app, "Parent", "30", at(0));
        add(&mut app, "Child", "10", at(0));
        let parent_id = app.tasks[0].id;

        app.toggle_subtask_selected();
        assert_eq!(app.tasks[1].parent_id, Some(parent_id));
        assert_eq!(app.rows()[1].depth, 1);

        app.toggle_subtask_selected();
        assert_eq!(app.tasks[1].parent_id, None);

        app.selected_index = 0;
        app.toggle_subtask_selected();
        assert_eq!(app.tasks[0].parent_id, None);
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_toggle_sleep() {
        let mut app = create_test_app();
        add(&mut app, "A", "10", at(0));
        app.toggle_sleep(at(10));
        assert!(app.engine.is_asleep());
        assert_eq!(app.tasks[0].state, TaskState::Paused);
        assert_eq!(app.engine.sleep_paused(), vec![app.tasks[0].id]);

        app.toggle_sleep(at(500));
        assert!(!app.engine.is_asleep());
        assert_eq!(app.tasks[0].state, TaskState::Ongoing);
        assert_eq!(app.engine.elapsed_seconds(app.tasks[0].id, at(510)).unwrap(), 20);
    }

    #[test]
    fn test_new_restores_undo_from_history() {
        let engine = Engine::new(EngineConfig::default(), Vec::new());
        let id = engine.create_task(NewTask::new("Old", 600), at(0)).unwrap();
        let record = engine.complete(id, at(100)).unwrap();

        let mut store = MemoryStore::new();
        store.append_completion(&record).unwrap();
        let mut app = AppState::new(AppConfig::default(), Box::new(store), silent(), at(200)).unwrap();
        assert_eq!(app.engine.undo_target(), Some(id));

        app.undo(at(300));
        assert_eq!(app.tasks.len(), 1);
        assert!(app.store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_undo_stays_single_level_across_restart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let open = |now| {
            let store = JsonFileStore::new(temp_dir.path());
            AppState::new(AppConfig::default(), Box::new(store), silent(), now).unwrap()
        };

        let mut app = open(at(0));
        add(&mut app, "A", "10", at(0));
        add(&mut app, "B", "10", at(0));
        app.move_selection_up();
        app.complete_selected(at(100));
        app.complete_selected(at(200));
        app.undo(at(300));
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].name, "B");
        app.shutdown().unwrap();

        let mut app = open(at(400));
        assert_eq!(app.engine.undo_target(), None);
        app.undo(at(500));
        assert_eq!(app.tasks.len(), 1);
        assert!(app.status_message.is_some());
        let history = app.store.load_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.name, "A");
    }

    #[test]
    fn test_new_repairs_loaded_tasks() {
        let mut task = Task::new(
            NewTask::new("Loaded", 600),
            crate::domain::AccountingMode::Precise,
            at(0),
        );
        task.state = TaskState::Ongoing;

        let mut store = MemoryStore::new();
        store.active.push(task);
        let app = AppState::new(AppConfig::default(), Box::new(store), silent(), at(50)).unwrap();
        assert!(app.needs_save);
        assert!(app.tasks[0].has_open_interval());
        assert_eq!(app.engine.elapsed_seconds(app.tasks[0].id, at(60)).unwrap(), 10);
    }

    #[test]
    fn test_shutdown_saves_ongoing_tasks() {
        let mut app = create_test_app();
        add(&mut app, "A", "10", at(0));
        app.shutdown().unwrap();

        let saved = app.store.load_active_tasks().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].state, TaskState::Ongoing);
        assert!(saved[0].has_open_interval());
    }

    #[test]
    fn test_convert_legacy() {
        let mut idle = Task::new(NewTask::new("Idle", 600), AccountingMode::Legacy, at(0));
        idle.state = TaskState::Paused;
        idle.accounting = crate::domain::Accounting::Legacy { elapsed_seconds: 120 };
        let mut running = Task::new(NewTask::new("Running", 600), AccountingMode::Legacy, at(0));
        running.state = TaskState::Ongoing;
        let precise = Task::new(NewTask::new("Precise", 600), AccountingMode::Precise, at(0));

        let mut store = MemoryStore::new();
        store.active = vec![idle, running, precise];
        let outcomes = convert_legacy(&mut store, at(500)).unwrap();

        assert_eq!(
            outcomes,
            vec![
                Conversion::Converted {
                    name: "Idle".to_string(),
                    elapsed_seconds: 120
                },
                Conversion::SkippedOngoing {
                    name: "Running".to_string()
                },
            ]
        );
        assert_eq!(store.active[0].mode(), AccountingMode::Precise);
        assert_eq!(store.active[1].mode(), AccountingMode::Legacy);
    }
}
