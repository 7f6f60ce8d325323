use crate::domain::{
    Accounting, AccountingMode, AlarmState, Classification, CompletionRecord, Task, TaskState,
    WorkInterval,
};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parse an RFC 3339 timestamp, or a naive one taken as local time
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_required(field: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("bad {} timestamp '{}'", field, raw))
}

fn parse_optional(field: &str, raw: Option<&String>) -> Result<Option<DateTime<Utc>>, String> {
    raw.map(|r| parse_required(field, r)).transpose()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInterval {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// A task as written to active.json and history.jsonl.
///
/// Files from the earlier tool carry naive local timestamps, a float
/// `elapsed_seconds`, `last_alarm_level` and `parent_task_id`, and no interval log;
/// those load as legacy-mode tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTask {
    pub id: Uuid,
    pub name: String,
    pub estimated_seconds: i64,
    #[serde(default)]
    pub ambitious_seconds: Option<i64>,
    pub state: TaskState,
    #[serde(default, alias = "parent_task_id")]
    pub parent_id: Option<Uuid>,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Absent in files from before interval tracking
    #[serde(default)]
    pub mode: Option<AccountingMode>,
    #[serde(default)]
    pub intervals: Vec<StoredInterval>,
    /// Legacy counter; for precise tasks the last known elapsed value
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default, alias = "last_alarm_level")]
    pub last_alarm_level_triggered: u32,
    #[serde(default)]
    pub alarm_sounding: bool,
    #[serde(default)]
    pub accounting_fault: bool,
}

impl StoredTask {
    pub fn from_task(task: &Task) -> Self {
        let (mode, intervals, elapsed) = match &task.accounting {
            Accounting::Precise { intervals } => (
                AccountingMode::Precise,
                intervals
                    .iter()
                    .map(|i| StoredInterval {
                        start: format_timestamp(i.start),
                        end: i.end.map(format_timestamp),
                    })
                    .collect(),
                task.last_known_elapsed,
            ),
            Accounting::Legacy { elapsed_seconds } => {
                (AccountingMode::Legacy, Vec::new(), *elapsed_seconds)
            }
        };

        Self {
            id: task.id,
            name: task.name.clone(),
            estimated_seconds: task.estimated_seconds,
            ambitious_seconds: task.ambitious_seconds,
            state: task.state,
            parent_id: task.parent_id,
            created_at: format_timestamp(task.created_at),
            started_at: task.started_at.map(format_timestamp),
            completed_at: task.completed_at.map(format_timestamp),
            mode: Some(mode),
            intervals,
            elapsed_seconds: elapsed as f64,
            last_alarm_level_triggered: task.alarm.last_level,
            alarm_sounding: task.alarm.sounding,
            accounting_fault: task.accounting_fault,
        }
    }

    pub fn into_task(self) -> Result<Task, String> {
        if self.name.trim().is_empty() {
            return Err("empty name".to_string());
        }

        let mode = self.mode.unwrap_or(if self.intervals.is_empty() {
            AccountingMode::Legacy
        } else {
            AccountingMode::Precise
        });
        let legacy_elapsed = self.elapsed_seconds.max(0.0).floor() as i64;

        let accounting = match mode {
            AccountingMode::Precise => {
                let mut intervals = Vec::with_capacity(self.intervals.len());
                for raw in &self.intervals {
                    intervals.push(WorkInterval {
                        start: parse_required("interval start", &raw.start)?,
                        end: parse_optional("interval end", raw.end.as_ref())?,
                    });
                }
                Accounting::Precise { intervals }
            }
            AccountingMode::Legacy => Accounting::Legacy {
                elapsed_seconds: legacy_elapsed,
            },
        };

        Ok(Task {
            id: self.id,
            name: self.name,
            estimated_seconds: self.estimated_seconds,
            ambitious_seconds: self.ambitious_seconds,
            state: self.state,
            parent_id: self.parent_id,
            created_at: parse_required("created_at", &self.created_at)?,
            started_at: parse_optional("started_at", self.started_at.as_ref())?,
            completed_at: parse_optional("completed_at", self.completed_at.as_ref())?,
            accounting,
            alarm: AlarmState {
                last_level: self.last_alarm_level_triggered,
                // Paused tasks never sound, whatever the file says
                sounding: self.alarm_sounding && self.state == TaskState::Ongoing,
            },
            last_known_elapsed: legacy_elapsed,
            accounting_fault: self.accounting_fault,
        })
    }
}

/// Contents of undo.json: the completion undo may still restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUndoSlot {
    #[serde(default)]
    pub task_id: Option<Uuid>,
}

/// One line of history.jsonl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCompletion {
    #[serde(flatten)]
    pub task: StoredTask,
    /// Missing in legacy history, where it is derived from the elapsed time
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default)]
    pub position: usize,
}

impl StoredCompletion {
    pub fn from_record(record: &CompletionRecord) -> Self {
        let mut task = StoredTask::from_task(&record.task);
        if record.task.mode() == AccountingMode::Precise {
            task.elapsed_seconds = record.elapsed_seconds as f64;
        }
        Self {
            task,
            classification: Some(record.classification),
            position: record.position,
        }
    }

    pub fn into_record(self) -> Result<CompletionRecord, String> {
        let task = self.task.into_task()?;
        let elapsed = crate::engine::accounting::elapsed_seconds(
            &task,
            task.completed_at.unwrap_or(task.created_at),
        );
        let classification = self
            .classification
            .unwrap_or_else(|| task.classify(elapsed));
        Ok(CompletionRecord {
            task,
            classification,
            elapsed_seconds: elapsed,
            position: self.position,
        })
    }
}
