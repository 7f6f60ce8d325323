use crate::domain::{Classification, CompletionRecord, Task};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// One completed task, as shown in the report table
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRow {
    pub name: String,
    pub elapsed_seconds: i64,
    pub estimated_seconds: i64,
    /// elapsed / estimate; 1.0 means the estimate was exact
    pub accuracy: f64,
    pub overtime: bool,
    /// None when the task had no stretch target
    pub ambitious_hit: Option<bool>,
}

impl CompletedRow {
    pub fn from_record(record: &CompletionRecord) -> Self {
        let estimated = record.task.estimated_seconds;
        Self {
            name: record.task.name.clone(),
            elapsed_seconds: record.elapsed_seconds,
            estimated_seconds: estimated,
            accuracy: ratio(record.elapsed_seconds, estimated),
            overtime: record.elapsed_seconds > estimated,
            ambitious_hit: record
                .task
                .ambitious_seconds
                .map(|_| record.classification == Classification::Ambitious),
        }
    }
}

/// Summary statistics for a day's completed tasks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    pub total_tasks: usize,
    pub total_elapsed: i64,
    pub total_estimated: i64,
    /// Mean of elapsed / estimate over tasks with an estimate
    pub avg_accuracy: f64,
    pub overtime_count: usize,
    /// Tasks that had a stretch target
    pub ambitious_count: usize,
    /// Tasks that finished before their stretch target
    pub ambitious_hits: usize,
    pub ambitious_rate: f64,
}

fn ratio(elapsed: i64, estimate: i64) -> f64 {
    if estimate > 0 {
        elapsed as f64 / estimate as f64
    } else {
        0.0
    }
}

/// Whether a task belongs to `date`: by completion time, else by creation time,
/// both taken in local time
pub fn belongs_to_day(task: &Task, date: NaiveDate) -> bool {
    let stamp = task.completed_at.unwrap_or(task.created_at);
    stamp.with_timezone(&Local).date_naive() == date
}

/// Times of day of the distractions logged on `date`. Lines that are not
/// "YYYY-MM-DD HH:MM:SS" local timestamps are ignored.
pub fn distractions_on(content: &str, date: NaiveDate) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = content
        .lines()
        .filter_map(|line| NaiveDateTime::parse_from_str(line.trim(), "%Y-%m-%d %H:%M:%S").ok())
        .filter(|dt| dt.date() == date)
        .map(|dt| dt.time())
        .collect();
    times.sort();
    times
}

/// Calculate summary statistics over completed rows
pub fn calculate_summary(rows: &[CompletedRow]) -> SummaryStats {
    let accuracies: Vec<f64> = rows
        .iter()
        .filter(|r| r.estimated_seconds > 0)
        .map(|r| r.accuracy)
        .collect();
    let avg_accuracy = if accuracies.is_empty() {
        0.0
    } else {
        accuracies.iter().sum::<f64>() / accuracies.len() as f64
    };

    let ambitious_count = rows.iter().filter(|r| r.ambitious_hit.is_some()).count();
    let ambitious_hits = rows.iter().filter(|r| r.ambitious_hit == Some(true)).count();
    let ambitious_rate = if ambitious_count > 0 {
        ambitious_hits as f64 / ambitious_count as f64
    } else {
        0.0
    };

    SummaryStats {
        total_tasks: rows.len(),
        total_elapsed: rows.iter().map(|r| r.elapsed_seconds).sum(),
        total_estimated: rows.iter().map(|r| r.estimated_seconds).sum(),
        avg_accuracy,
        overtime_count: rows.iter().filter(|r| r.overtime).count(),
        ambitious_count,
        ambitious_hits,
        ambitious_rate,
    }
}
