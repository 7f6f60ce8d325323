//! Elapsed-time accounting.
//!
//! Precise tasks derive elapsed time from their interval log; legacy tasks carry a
//! counter that the tick driver advances. Reading elapsed time never mutates a task.
//! The only writers are [`settle`], which records the last trusted value, and the
//! explicit [`convert_to_precise`] administrative operation.

use crate::domain::{Accounting, Task, TaskState, WorkInterval};
use crate::error::EngineError;
use chrono::{DateTime, Duration, Utc};

/// Elapsed seconds for a task at `now`.
///
/// Falls back to the last trusted value once the task's interval log has been found
/// inconsistent, or if it is inconsistent right now.
pub fn elapsed_seconds(task: &Task, now: DateTime<Utc>) -> i64 {
    if task.accounting_fault {
        return task.last_known_elapsed;
    }
    match &task.accounting {
        Accounting::Legacy { elapsed_seconds } => (*elapsed_seconds).max(0),
        Accounting::Precise { intervals } => {
            precise_elapsed(intervals, now).unwrap_or(task.last_known_elapsed)
        }
    }
}

/// Sum an interval log, validating its invariants
pub fn precise_elapsed(intervals: &[WorkInterval], now: DateTime<Utc>) -> Result<i64, String> {
    check_intervals(intervals)?;

    let total = intervals
        .iter()
        .map(|i| i.duration_until(now).max(Duration::zero()))
        .fold(Duration::zero(), |acc, d| acc + d);

    Ok(total.num_seconds().max(0))
}

/// Check that at most one interval is open, that it is the last one, and that the
/// intervals are ordered and non-overlapping.
pub fn check_intervals(intervals: &[WorkInterval]) -> Result<(), String> {
    let open = intervals.iter().filter(|i| i.is_open()).count();
    if open > 1 {
        return Err(format!("{} open intervals", open));
    }
    if let Some(pos) = intervals.iter().position(|i| i.is_open()) {
        if pos + 1 != intervals.len() {
            return Err(format!("open interval at position {} is not the last", pos));
        }
    }

    let mut previous_end: Option<DateTime<Utc>> = None;
    for (pos, interval) in intervals.iter().enumerate() {
        if let Some(end) = interval.end {
            if end < interval.start {
                return Err(format!("interval {} ends before it starts", pos));
            }
        }
        if let Some(prev) = previous_end {
            if interval.start < prev {
                return Err(format!("interval {} overlaps the previous one", pos));
            }
        }
        previous_end = interval.end;
    }

    Ok(())
}

/// Result of re-reading a task's elapsed time
#[derive(Debug)]
pub struct Settled {
    pub elapsed: i64,
    /// Set only on the reading that first detected an inconsistency
    pub fault: Option<EngineError>,
}

/// Recompute elapsed time and remember it as the last trusted value.
///
/// A newly detected interval inconsistency marks the task as faulted and reports it
/// once; afterwards the task keeps reporting its last trusted value.
pub fn settle(task: &mut Task, now: DateTime<Utc>) -> Settled {
    if task.accounting_fault {
        return Settled {
            elapsed: task.last_known_elapsed,
            fault: None,
        };
    }

    let computed = match &task.accounting {
        Accounting::Legacy { elapsed_seconds } => Ok((*elapsed_seconds).max(0)),
        Accounting::Precise { intervals } => precise_elapsed(intervals, now),
    };

    match computed {
        Ok(elapsed) => {
            task.last_known_elapsed = elapsed;
            Settled {
                elapsed,
                fault: None,
            }
        }
        Err(detail) => {
            task.accounting_fault = true;
            Settled {
                elapsed: task.last_known_elapsed,
                fault: Some(EngineError::InvariantViolation {
                    task_id: task.id,
                    detail,
                }),
            }
        }
    }
}

/// Advance a legacy counter by whole seconds. Precise tasks are untouched.
pub fn accrue_legacy(task: &mut Task, seconds: i64) -> bool {
    match &mut task.accounting {
        Accounting::Legacy { elapsed_seconds } if seconds > 0 => {
            *elapsed_seconds += seconds;
            true
        }
        _ => false,
    }
}

/// Translate a legacy counter into a single closed interval starting at creation time.
///
/// Returns false when the task already uses precise accounting.
pub fn convert_to_precise(task: &mut Task) -> bool {
    let elapsed = match task.accounting {
        Accounting::Legacy { elapsed_seconds } => elapsed_seconds.max(0),
        Accounting::Precise { .. } => return false,
    };

    let intervals = if elapsed > 0 {
        vec![WorkInterval::closed(
            task.created_at,
            task.created_at + Duration::seconds(elapsed),
        )]
    } else {
        Vec::new()
    };

    task.accounting = Accounting::Precise { intervals };
    task.last_known_elapsed = elapsed;
    true
}

/// Bring a task read from storage back in line with its state.
///
/// Stray open intervals (on a task that is not Ongoing, before the last interval, or
/// starting in the future) are closed at their own start so no unobserved time is
/// credited. An Ongoing precise task without an open interval gets one at `now`.
/// Returns what was repaired.
pub fn repair_loaded(task: &mut Task, now: DateTime<Utc>) -> Option<EngineError> {
    let ongoing = task.state == TaskState::Ongoing;
    let state = task.state;
    let Accounting::Precise { intervals } = &mut task.accounting else {
        return None;
    };

    let mut problems = Vec::new();
    let last = intervals.len().saturating_sub(1);
    for (pos, interval) in intervals.iter_mut().enumerate() {
        if !interval.is_open() {
            continue;
        }
        if interval.start > now {
            problems.push(format!("open interval {} starts in the future", pos));
        } else if !ongoing {
            problems.push(format!("open interval {} on a {} task", pos, state));
        } else if pos != last {
            problems.push(format!("open interval {} is not the last", pos));
        } else {
            continue;
        }
        interval.end = Some(interval.start);
    }

    if ongoing && !task.has_open_interval() {
        problems.push("ongoing task had no open interval".to_string());
        task.open_interval(now);
    }

    if problems.is_empty() {
        return None;
    }
    Some(EngineError::InvariantViolation {
        task_id: task.id,
        detail: problems.join("; "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountingMode, NewTask};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn precise_task() -> Task {
        Task::new(NewTask::new("Test", 900), AccountingMode::Precise, at(0))
    }

    #[test]
    fn test_precise_elapsed_sums_closed_and_open() {
        let mut task = precise_task();
        task.accounting = Accounting::Precise {
            intervals: vec![
                WorkInterval::closed(at(0), at(100)),
                WorkInterval::closed(at(200), at(250)),
                WorkInterval::open(at(300)),
            ],
        };
        assert_eq!(elapsed_seconds(&task, at(310)), 160);
        // Reading twice gives the same answer
        assert_eq!(elapsed_seconds(&task, at(310)), 160);
    }

    #[test]
    fn test_precise_elapsed_clamps_future_open_interval() {
        let mut task = precise_task();
        task.accounting = Accounting::Precise {
            intervals: vec![WorkInterval::open(at(500))],
        };
        assert_eq!(elapsed_seconds(&task, at(100)), 0);
    }

    #[test]
    fn test_legacy_elapsed_reads_counter() {
        let mut task = Task::new(NewTask::new("Old", 900), AccountingMode::Legacy, at(0));
        assert!(accrue_legacy(&mut task, 42));
        assert_eq!(elapsed_seconds(&task, at(10_000)), 42);
    }

    #[test]
    fn test_accrue_legacy_ignores_precise() {
        let mut task = precise_task();
        assert!(!accrue_legacy(&mut task, 5));
    }

    #[test]
    fn test_check_intervals_rejects_two_open() {
        let intervals = vec![WorkInterval::open(at(0)), WorkInterval::open(at(10))];
        assert!(check_intervals(&intervals).is_err());
    }

    #[test]
    fn test_check_intervals_rejects_overlap() {
        let intervals = vec![
            WorkInterval::closed(at(0), at(100)),
            WorkInterval::closed(at(50), at(150)),
        ];
        assert!(check_intervals(&intervals).is_err());
    }

    #[test]
    fn test_check_intervals_accepts_touching() {
        let intervals = vec![
            WorkInterval::closed(at(0), at(100)),
            WorkInterval::open(at(100)),
        ];
        assert!(check_intervals(&intervals).is_ok());
    }

    #[test]
    fn test_settle_faults_once_and_freezes() {
        let mut task = precise_task();
        task.accounting = Accounting::Precise {
            intervals: vec![WorkInterval::closed(at(0), at(60))],
        };
        let first = settle(&mut task, at(100));
        assert_eq!(first.elapsed, 60);
        assert!(first.fault.is_none());

        // Corrupt the log: two open intervals
        task.accounting = Accounting::Precise {
            intervals: vec![WorkInterval::open(at(100)), WorkInterval::open(at(200))],
        };
        let second = settle(&mut task, at(300));
        assert_eq!(second.elapsed, 60);
        assert!(matches!(
            second.fault,
            Some(EngineError::InvariantViolation { .. })
        ));

        let third = settle(&mut task, at(400));
        assert_eq!(third.elapsed, 60);
        assert!(third.fault.is_none());
        assert_eq!(elapsed_seconds(&task, at(500)), 60);
    }

    #[test]
    fn test_convert_to_precise() {
        let mut task = Task::new(NewTask::new("Old", 900), AccountingMode::Legacy, at(0));
        accrue_legacy(&mut task, 300);

        assert!(convert_to_precise(&mut task));
        assert_eq!(task.mode(), AccountingMode::Precise);
        assert_eq!(task.intervals(), &[WorkInterval::closed(at(0), at(300))]);
        assert_eq!(elapsed_seconds(&task, at(10_000)), 300);

        assert!(!convert_to_precise(&mut task));
    }

    #[test]
    fn test_convert_empty_legacy_counter() {
        let mut task = Task::new(NewTask::new("Old", 900), AccountingMode::Legacy, at(0));
        assert!(convert_to_precise(&mut task));
        assert!(task.intervals().is_empty());
        assert_eq!(elapsed_seconds(&task, at(50)), 0);
    }

    #[test]
    fn test_repair_future_open_interval() {
        let mut task = precise_task();
        task.state = TaskState::Ongoing;
        task.accounting = Accounting::Precise {
            intervals: vec![WorkInterval::closed(at(0), at(50)), WorkInterval::open(at(500))],
        };

        let fault = repair_loaded(&mut task, at(100));
        assert!(matches!(fault, Some(EngineError::InvariantViolation { .. })));
        assert_eq!(task.open_interval_count(), 1);
        assert_eq!(task.intervals()[1], WorkInterval::closed(at(500), at(500)));
        // Reopened after the closed future interval, never overlapping it
        assert_eq!(task.intervals()[2], WorkInterval::open(at(500)));
        assert!(check_intervals(task.intervals()).is_ok());
    }

    #[test]
    fn test_repair_open_interval_on_paused_task() {
        let mut task = precise_task();
        task.state = TaskState::Paused;
        task.accounting = Accounting::Precise {
            intervals: vec![WorkInterval::open(at(10))],
        };
        assert!(repair_loaded(&mut task, at(100)).is_some());
        assert!(!task.has_open_interval());
        assert_eq!(elapsed_seconds(&task, at(100)), 0);
    }

    #[test]
    fn test_repair_leaves_consistent_task_alone() {
        let mut task = precise_task();
        task.state = TaskState::Ongoing;
        task.open_interval(at(10));
        let before = task.clone();
        assert!(repair_loaded(&mut task, at(100)).is_none());
        assert_eq!(task, before);

        let mut legacy = Task::new(NewTask::new("Old", 900), AccountingMode::Legacy, at(0));
        legacy.state = TaskState::Ongoing;
        assert!(repair_loaded(&mut legacy, at(100)).is_none());
    }
}

