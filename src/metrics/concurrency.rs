use crate::domain::Task;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A copied work interval, detached from its task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub task_id: Uuid,
    pub start: DateTime<Utc>,
    /// None while the work is still running
    pub end: Option<DateTime<Utc>>,
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Local midnight to the following local midnight
    pub fn for_local_date(date: NaiveDate) -> Self {
        let start = local_midnight(date);
        let end = date
            .succ_opt()
            .map(local_midnight)
            .unwrap_or(start + Duration::days(1));
        Self { start, end }
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Concurrency level from `at` until the next point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepPoint {
    pub at: DateTime<Utc>,
    pub level: u32,
}

/// Step function of how many tasks were running at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrencyTimeline {
    pub steps: Vec<StepPoint>,
    pub peak: u32,
}

impl ConcurrencyTimeline {
    /// Seconds during which at least `level` tasks were running
    pub fn seconds_at_least(&self, level: u32) -> i64 {
        self.steps
            .windows(2)
            .filter(|pair| pair[0].level >= level)
            .map(|pair| pair[1].at.signed_duration_since(pair[0].at).num_seconds())
            .sum()
    }
}

/// Collect the interval spans of a set of tasks. Legacy tasks have none.
pub fn spans_from_tasks(tasks: &[Task]) -> Vec<Span> {
    tasks
        .iter()
        .flat_map(|task| {
            task.intervals().iter().map(move |interval| Span {
                task_id: task.id,
                start: interval.start,
                end: interval.end,
            })
        })
        .collect()
}

/// Sweep the spans clipped to `window`. Open spans run until `now`.
///
/// At equal timestamps ends are processed before starts, so back-to-back intervals
/// never count as overlapping. A step is recorded after each timestamp whose events
/// changed the level.
pub fn concurrency_timeline(spans: &[Span], window: DayWindow, now: DateTime<Utc>) -> ConcurrencyTimeline {
    let mut events: Vec<(DateTime<Utc>, i32)> = Vec::with_capacity(spans.len() * 2);
    for span in spans {
        let start = span.start.max(window.start);
        let end = span.end.unwrap_or(now).min(window.end);
        if start >= end {
            continue;
        }
        events.push((start, 1));
        events.push((end, -1));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut timeline = ConcurrencyTimeline::default();
    let mut level: i64 = 0;
    let mut i = 0;
    while i < events.len() {
        let at = events[i].0;
        while i < events.len() && events[i].0 == at {
            level += i64::from(events[i].1);
            let current = u32::try_from(level).unwrap_or(0);
            timeline.peak = timeline.peak.max(current);
            i += 1;
        }

        let current = u32::try_from(level).unwrap_or(0);
        if timeline.steps.last().map(|s| s.level) != Some(current) {
            timeline.steps.push(StepPoint { at, level: current });
        }
    }

    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountingMode, NewTask, WorkInterval};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn span(start: i64, end: Option<i64>) -> Span {
        Span {
            task_id: Uuid::new_v4(),
            start: at(start),
            end: end.map(at),
        }
    }

    fn window() -> DayWindow {
        DayWindow::new(at(0), at(86_400))
    }

    #[test]
    fn test_back_to_back_intervals_peak_one() {
        let spans = [span(0, Some(10)), span(10, Some(20))];
        let timeline = concurrency_timeline(&spans, window(), at(100));
        assert_eq!(timeline.peak, 1);
        assert_eq!(
            timeline.steps,
            vec![
                StepPoint { at: at(0), level: 1 },
                StepPoint { at: at(20), level: 0 },
            ]
        );
    }

    #[test]
    fn test_overlap_counts_two() {
        let spans = [span(0, Some(30)), span(10, Some(20)), span(25, Some(40))];
        let timeline = concurrency_timeline(&spans, window(), at(100));
        assert_eq!(timeline.peak, 2);
        assert_eq!(
            timeline.steps,
            vec![
                StepPoint { at: at(0), level: 1 },
                StepPoint { at: at(10), level: 2 },
                StepPoint { at: at(20), level: 1 },
                StepPoint { at: at(25), level: 2 },
                StepPoint { at: at(30), level: 1 },
                StepPoint { at: at(40), level: 0 },
            ]
        );
        assert_eq!(timeline.seconds_at_least(2), 15);
        assert_eq!(timeline.seconds_at_least(1), 40);
    }

    #[test]
    fn test_open_span_runs_until_now_and_clips() {
        let w = DayWindow::new(at(100), at(200));
        let spans = [span(50, Some(150)), span(180, None)];
        let timeline = concurrency_timeline(&spans, w, at(500));
        assert_eq!(
            timeline.steps,
            vec![
                StepPoint { at: at(100), level: 1 },
                StepPoint { at: at(150), level: 0 },
                StepPoint { at: at(180), level: 1 },
                StepPoint { at: at(200), level: 0 },
            ]
        );
    }

    #[test]
    fn test_spans_outside_window_are_ignored() {
        let w = DayWindow::new(at(100), at(200));
        let spans = [span(0, Some(100)), span(200, Some(300)), span(150, Some(150))];
        let timeline = concurrency_timeline(&spans, w, at(500));
        assert_eq!(timeline, ConcurrencyTimeline::default());
    }

    #[test]
    fn test_spans_from_tasks_skips_legacy() {
        let mut precise = Task::new(NewTask::new("P", 900), AccountingMode::Precise, at(0));
        precise.open_interval(at(0));
        precise.close_open_intervals(at(10));
        precise.open_interval(at(20));
        let legacy = Task::new(NewTask::new("L", 900), AccountingMode::Legacy, at(0));

        let spans = spans_from_tasks(&[precise.clone(), legacy]);
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.task_id == precise.id));
        assert_eq!(precise.intervals()[1], WorkInterval::open(at(20)));
        assert_eq!(spans[1].end, None);
    }

    #[test]
    fn test_local_day_window_is_a_day_long() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let w = DayWindow::for_local_date(date);
        let hours = w.end.signed_duration_since(w.start).num_hours();
        assert!((23..=25).contains(&hours));
    }
}
