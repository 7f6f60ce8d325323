use crate::domain::{format_duration, CompletionRecord, Task, TaskState};
use crate::engine::accounting;
use crate::metrics::{concurrency_timeline, spans_from_tasks, DayWindow};
use crate::persistence::{atomic_write, read_file, report_file, TaskStore};
use crate::report::stats::{belongs_to_day, calculate_summary, distractions_on, CompletedRow};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Format a ratio as a percentage with 1 decimal place
fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Build the markdown report for `date` from completion history and the active set.
/// `distractions` is None when no distraction log is configured.
pub fn build_report(
    date: NaiveDate,
    history: &[CompletionRecord],
    active: &[Task],
    distractions: Option<&[NaiveTime]>,
    now: DateTime<Utc>,
) -> String {
    let completed: Vec<&CompletionRecord> = history
        .iter()
        .filter(|r| belongs_to_day(&r.task, date))
        .collect();
    let rows: Vec<CompletedRow> = completed.iter().map(|r| CompletedRow::from_record(r)).collect();
    let summary = calculate_summary(&rows);

    let mut report = String::new();
    report.push_str(&format!("# etime report - {}\n\n", date));

    // Summary Section
    report.push_str("## Summary\n\n");
    report.push_str(&format!("- **Completed Tasks:** {}\n", summary.total_tasks));
    report.push_str(&format!(
        "- **Total Time:** {} / {} estimated\n",
        format_duration(summary.total_elapsed),
        format_duration(summary.total_estimated)
    ));
    report.push_str(&format!(
        "- **Average Accuracy:** {} of estimate\n",
        format_percent(summary.avg_accuracy)
    ));
    report.push_str(&format!("- **Over Estimate:** {}\n", summary.overtime_count));
    report.push_str(&format!(
        "- **Ambitious Targets:** {} hit of {} ({})\n",
        summary.ambitious_hits,
        summary.ambitious_count,
        format_percent(summary.ambitious_rate)
    ));
    if let Some(times) = distractions {
        let listed: Vec<String> = times.iter().map(|t| t.format("%H:%M").to_string()).collect();
        report.push_str(&format!("- **Distractions:** {}", times.len()));
        if !listed.is_empty() {
            report.push_str(&format!(" ({})", listed.join(", ")));
        }
        report.push('\n');
    }
    report.push('\n');

    // Completed table
    report.push_str("## Completed\n\n");
    if rows.is_empty() {
        report.push_str("_No tasks completed._\n\n");
    } else {
        report.push_str("| Task | Elapsed | Estimate | Accuracy | Overtime | Ambitious |\n");
        report.push_str("|------|---------|----------|----------|----------|-----------|\n");
        for row in &rows {
            let ambitious = match row.ambitious_hit {
                Some(hit) => if hit { "hit" } else { "missed" },
                None => "-",
            };
            report.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                row.name.replace('|', "\\|"),
                format_duration(row.elapsed_seconds),
                format_duration(row.estimated_seconds),
                format_percent(row.accuracy),
                yes_no(row.overtime),
                ambitious
            ));
        }
        report.push('\n');
    }

    // Active Tasks
    if !active.is_empty() {
        report.push_str("## Active Tasks\n\n");
        for task in active {
            let status_icon = match task.state {
                TaskState::Ongoing => "▶",
                TaskState::Paused => "⏸",
                _ => " ",
            };
            report.push_str(&format!(
                "- [{}] **{}** ({} / {})\n",
                status_icon,
                task.name,
                format_duration(accounting::elapsed_seconds(task, now)),
                format_duration(task.estimated_seconds)
            ));
        }
        report.push('\n');
    }

    // Concurrency: every interval touching the day counts, wherever its task ended up
    let window = DayWindow::for_local_date(date);
    let mut tasks: Vec<Task> = history.iter().map(|r| r.task.clone()).collect();
    tasks.extend(active.iter().cloned());
    let timeline = concurrency_timeline(&spans_from_tasks(&tasks), window, now);

    report.push_str("## Concurrency\n\n");
    report.push_str(&format!("- **Peak Parallel Tasks:** {}\n", timeline.peak));
    report.push_str(&format!(
        "- **Time With 2+ Tasks Running:** {}\n\n",
        format_duration(timeline.seconds_at_least(2))
    ));
    if !timeline.steps.is_empty() {
        report.push_str("| From | Running |\n");
        report.push_str("|------|---------|\n");
        for step in &timeline.steps {
            report.push_str(&format!(
                "| {} | {} |\n",
                step.at.with_timezone(&Local).format("%H:%M:%S"),
                step.level
            ));
        }
        report.push('\n');
    }

    report
}

/// Generate a daily report for the specified date
pub fn generate_report(
    store: &dyn TaskStore,
    dir: &Path,
    date: Option<NaiveDate>,
    output_path: Option<PathBuf>,
    distraction_file: Option<&Path>,
) -> Result<PathBuf> {
    let report_date = date.unwrap_or_else(|| Local::now().date_naive());

    let history = store.load_history().context("Failed to load completion history")?;
    let active = store.load_active_tasks().context("Failed to load active tasks")?;
    let distractions = match distraction_file {
        Some(path) => Some(distractions_on(&read_file(path)?, report_date)),
        None => None,
    };
    let report = build_report(report_date, &history, &active, distractions.as_deref(), Utc::now());

    let output = output_path.unwrap_or_else(|| report_file(dir, report_date));
    atomic_write(&output, &report)?;
    info!(path = %output.display(), "report written");

    Ok(output)
}
