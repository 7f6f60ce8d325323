use super::files::{self, ACTIVE_FILE, HISTORY_FILE, UNDO_FILE};
use super::records::{StoredCompletion, StoredTask, StoredUndoSlot};
use crate::domain::{CompletionRecord, Task};
use crate::error::PersistenceError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Durable home of the active set and the completion history
pub trait TaskStore: Send {
    fn load_active_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Replace the stored active set
    fn save_active_tasks(&mut self, tasks: &[Task]) -> StoreResult<()>;

    /// Append one completion to the history
    fn append_completion(&mut self, record: &CompletionRecord) -> StoreResult<()>;

    /// Every readable completion, oldest first
    fn load_history(&self) -> StoreResult<Vec<CompletionRecord>>;

    /// Task id whose completion undo may still restore. An append sets it and a
    /// retract clears it, so it survives restarts without ever pointing further back.
    fn undo_slot(&self) -> StoreResult<Option<Uuid>>;

    /// The completion undo may still restore, if any
    fn latest_completion(&self) -> StoreResult<Option<CompletionRecord>> {
        let Some(task_id) = self.undo_slot()? else {
            return Ok(None);
        };
        Ok(self
            .load_history()?
            .into_iter()
            .rev()
            .find(|r| r.task.id == task_id))
    }

    /// Remove the most recent completion of a task after an undo, and clear the
    /// undo slot. Returns false if the history had none.
    fn retract_completion(&mut self, task_id: Uuid) -> StoreResult<bool>;
}

/// `active.json` plus an append-only `history.jsonl` in one directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn undo_path(&self) -> PathBuf {
        self.dir.join(UNDO_FILE)
    }

    fn write_undo_slot(&self, task_id: Option<Uuid>) -> StoreResult<()> {
        let json = serde_json::to_string(&StoredUndoSlot { task_id })?;
        let path = self.undo_path();
        files::atomic_write(&path, &json).map_err(|e| Self::write_failed(&path, e))
    }

    fn read(path: &Path) -> StoreResult<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write_failed(path: &Path, err: anyhow::Error) -> PersistenceError {
        PersistenceError::Write {
            path: path.to_path_buf(),
            message: format!("{:#}", err),
        }
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        files::ensure_dir(&self.dir).map_err(|e| Self::write_failed(&self.dir, e))
    }

    /// Parse history lines, skipping the ones that cannot be read
    fn parse_history(path: &Path, content: &str) -> Vec<CompletionRecord> {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<StoredCompletion>(line)
                .map_err(|e| e.to_string())
                .and_then(StoredCompletion::into_record);
            match parsed {
                Ok(record) => records.push(record),
                Err(message) => {
                    let err = PersistenceError::Corrupt {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        message,
                    };
                    warn!("{}, skipping", err);
                }
            }
        }
        records
    }
}

impl TaskStore for JsonFileStore {
    fn load_active_tasks(&self) -> StoreResult<Vec<Task>> {
        let path = self.active_path();
        let content = Self::read(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        let mut tasks = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            let parsed = serde_json::from_value::<StoredTask>(entry)
                .map_err(|e| e.to_string())
                .and_then(StoredTask::into_task);
            match parsed {
                Ok(task) if task.state.is_active() => tasks.push(task),
                Ok(task) => warn!(task = %task.id, "completed task in active set, skipping"),
                Err(message) => warn!(
                    "Corrupt task entry {} in {}: {}, skipping",
                    idx,
                    path.display(),
                    message
                ),
            }
        }

        debug!(count = tasks.len(), "loaded active tasks");
        Ok(tasks)
    }

    fn save_active_tasks(&mut self, tasks: &[Task]) -> StoreResult<()> {
        self.ensure_dir()?;
        let stored: Vec<StoredTask> = tasks.iter().map(StoredTask::from_task).collect();
        let json = serde_json::to_string_pretty(&stored)?;
        let path = self.active_path();
        files::atomic_write(&path, &json).map_err(|e| Self::write_failed(&path, e))
    }

    fn append_completion(&mut self, record: &CompletionRecord) -> StoreResult<()> {
        self.ensure_dir()?;
        // Slot first: a retry after a failed append rewrites it harmlessly
        self.write_undo_slot(Some(record.task.id))?;
        let mut line = serde_json::to_string(&StoredCompletion::from_record(record))?;
        line.push('\n');
        let path = self.history_path();
        files::append_to_file(&path, &line).map_err(|e| Self::write_failed(&path, e))
    }

    fn load_history(&self) -> StoreResult<Vec<CompletionRecord>> {
        let path = self.history_path();
        let content = Self::read(&path)?;
        Ok(Self::parse_history(&path, &content))
    }

    fn undo_slot(&self) -> StoreResult<Option<Uuid>> {
        let path = self.undo_path();
        let content = Self::read(&path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<StoredUndoSlot>(&content) {
            Ok(slot) => Ok(slot.task_id),
            Err(e) => {
                warn!("Unreadable {}: {}, undo disabled", path.display(), e);
                Ok(None)
            }
        }
    }

    fn retract_completion(&mut self, task_id: Uuid) -> StoreResult<bool> {
        let path = self.history_path();
        let content = Self::read(&path)?;
        let lines: Vec<&str> = content.lines().collect();

        // Match on the id alone so a record this build cannot fully parse still goes
        let target = lines.iter().rposition(|line| {
            serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(|s| s == task_id.to_string()))
                .unwrap_or(false)
        });
        if let Some(target) = target {
            let mut rewritten = String::with_capacity(content.len());
            for (idx, line) in lines.iter().enumerate() {
                if idx != target {
                    rewritten.push_str(line);
                    rewritten.push('\n');
                }
            }
            files::atomic_write(&path, &rewritten).map_err(|e| Self::write_failed(&path, e))?;
        }

        self.write_undo_slot(None)?;
        Ok(target.is_some())
    }
}

/// In-memory store, for tests and for running without a data directory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub active: Vec<Task>,
    pub history: Vec<CompletionRecord>,
    pub undo_target: Option<Uuid>,
    /// Fail every write while set
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            return Err(PersistenceError::Write {
                path: PathBuf::from("<memory>"),
                message: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn load_active_tasks(&self) -> StoreResult<Vec<Task>> {
        Ok(self.active.clone())
    }

    fn save_active_tasks(&mut self, tasks: &[Task]) -> StoreResult<()> {
        self.check_writable()?;
        self.active = tasks.to_vec();
        Ok(())
    }

    fn append_completion(&mut self, record: &CompletionRecord) -> StoreResult<()> {
        self.check_writable()?;
        self.undo_target = Some(record.task.id);
        self.history.push(record.clone());
        Ok(())
    }

    fn load_history(&self) -> StoreResult<Vec<CompletionRecord>> {
        Ok(self.history.clone())
    }

    fn undo_slot(&self) -> StoreResult<Option<Uuid>> {
        Ok(self.undo_target)
    }

    fn retract_completion(&mut self, task_id: Uuid) -> StoreResult<bool> {
        self.check_writable()?;
        self.undo_target = None;
        match self.history.iter().rposition(|r| r.task.id == task_id) {
            Some(idx) => {
                self.history.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
