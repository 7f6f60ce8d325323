use super::enums::{AccountingMode, Classification, TaskState};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// One contiguous stretch of work on a task. An interval without an end is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl WorkInterval {
    pub fn open(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the interval, measuring an open interval up to `now`
    pub fn duration_until(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        end.signed_duration_since(self.start)
    }
}

/// How elapsed time is derived for a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accounting {
    /// Sum of work intervals, in chronological order
    Precise { intervals: Vec<WorkInterval> },
    /// Running counter for tasks created before interval tracking
    Legacy { elapsed_seconds: i64 },
}

impl Accounting {
    pub fn new(mode: AccountingMode) -> Self {
        match mode {
            AccountingMode::Precise => Accounting::Precise {
                intervals: Vec::new(),
            },
            AccountingMode::Legacy => Accounting::Legacy { elapsed_seconds: 0 },
        }
    }

    pub fn mode(&self) -> AccountingMode {
        match self {
            Accounting::Precise { .. } => AccountingMode::Precise,
            Accounting::Legacy { .. } => AccountingMode::Legacy,
        }
    }

    /// Work intervals (empty for legacy accounting)
    pub fn intervals(&self) -> &[WorkInterval] {
        match self {
            Accounting::Precise { intervals } => intervals,
            Accounting::Legacy { .. } => &[],
        }
    }
}

/// Alarm bookkeeping for a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmState {
    /// Highest multiple of the estimate that has already raised an alarm
    pub last_level: u32,
    /// Whether the alarm sound is currently requested for this task
    pub sounding: bool,
}

impl AlarmState {
    pub fn reset(&mut self) {
        self.last_level = 0;
        self.sounding = false;
    }
}

/// Fields supplied by the task creation flow
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub estimated_seconds: i64,
    pub ambitious_seconds: Option<i64>,
    pub parent_id: Option<Uuid>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, estimated_seconds: i64) -> Self {
        Self {
            name: name.into(),
            estimated_seconds,
            ambitious_seconds: None,
            parent_id: None,
        }
    }

    pub fn with_ambitious(mut self, ambitious_seconds: i64) -> Self {
        self.ambitious_seconds = Some(ambitious_seconds);
        self
    }

    #[cfg(test)]
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// A time-tracked task
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub estimated_seconds: i64,
    /// Stretch target, never above the estimate
    pub ambitious_seconds: Option<i64>,
    pub state: TaskState,
    /// Grouping parent; a non-owning reference into the active set
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// First time the task was started
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub accounting: Accounting,
    pub alarm: AlarmState,
    /// Last elapsed value computed from trustworthy data
    pub last_known_elapsed: i64,
    /// Set once the interval log was found inconsistent
    pub accounting_fault: bool,
}

impl Task {
    pub fn new(fields: NewTask, mode: AccountingMode, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            estimated_seconds: fields.estimated_seconds,
            ambitious_seconds: fields.ambitious_seconds,
            state: TaskState::Backlog,
            parent_id: fields.parent_id,
            created_at: now,
            started_at: None,
            completed_at: None,
            accounting: Accounting::new(mode),
            alarm: AlarmState::default(),
            last_known_elapsed: 0,
            accounting_fault: false,
        }
    }

    pub fn mode(&self) -> AccountingMode {
        self.accounting.mode()
    }

    pub fn intervals(&self) -> &[WorkInterval] {
        self.accounting.intervals()
    }

    /// Number of intervals without an end
    pub fn open_interval_count(&self) -> usize {
        self.intervals().iter().filter(|i| i.is_open()).count()
    }

    pub fn has_open_interval(&self) -> bool {
        self.open_interval_count() > 0
    }

    /// Append an open interval at `now` (precise mode only).
    ///
    /// The start never precedes the end of the previous interval, so a clock that
    /// stepped backwards cannot produce overlapping intervals.
    pub fn open_interval(&mut self, now: DateTime<Utc>) {
        if let Accounting::Precise { intervals } = &mut self.accounting {
            let floor = intervals.last().and_then(|i| i.end);
            let start = match floor {
                Some(end) if end > now => end,
                _ => now,
            };
            intervals.push(WorkInterval::open(start));
        }
    }

    /// Close every open interval at `now`. Returns true if anything was closed.
    pub fn close_open_intervals(&mut self, now: DateTime<Utc>) -> bool {
        let mut closed = false;
        if let Accounting::Precise { intervals } = &mut self.accounting {
            for interval in intervals.iter_mut().filter(|i| i.is_open()) {
                interval.end = Some(now.max(interval.start));
                closed = true;
            }
        }
        closed
    }

    /// Classify the task given its final elapsed seconds
    pub fn classify(&self, elapsed_seconds: i64) -> Classification {
        match self.ambitious_seconds {
            Some(ambitious) if elapsed_seconds < ambitious => Classification::Ambitious,
            _ => Classification::Normal,
        }
    }
}

/// Immutable record handed to the store when a task completes
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    /// Task as it was at completion
    pub task: Task,
    pub classification: Classification,
    pub elapsed_seconds: i64,
    /// Index the task held in the active set, used to restore it on undo
    pub position: usize,
}
