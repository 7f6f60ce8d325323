use crate::app::AppState;
use crate::domain::{format_duration, TaskState};
use crate::engine::accounting;
use crate::metrics::{concurrency_timeline, DayWindow};
use crate::ui::styles::{hint_style, status_style};
use chrono::{DateTime, Local, Utc};
use ratatui::{layout::Rect, text::Span, widgets::Paragraph, Frame};

/// Summary shown when there is no status message
pub fn summary_line(app: &AppState, now: DateTime<Utc>) -> String {
    let count = |state: TaskState| app.tasks.iter().filter(|t| t.state == state).count();
    let total: i64 = app
        .tasks
        .iter()
        .map(|t| accounting::elapsed_seconds(t, now))
        .sum();

    let mut line = format!(
        " {} ongoing · {} paused · {} backlog · {} tracked",
        count(TaskState::Ongoing),
        count(TaskState::Paused),
        count(TaskState::Backlog),
        format_duration(total)
    );
    let today = now.with_timezone(&Local).date_naive();
    let timeline = concurrency_timeline(&app.work_spans(), DayWindow::for_local_date(today), now);
    if timeline.peak > 1 {
        line.push_str(&format!(" · peak {} in parallel", timeline.peak));
    }
    if app.pending_writes() > 0 {
        line.push_str(&format!(" · {} unsaved", app.pending_writes()));
    }
    if app.engine.undo_target().is_some() {
        line.push_str(" · u to undo last completion");
    }
    line
}

/// Render the bottom status line
pub fn render_status_bar(f: &mut Frame, app: &AppState, area: Rect, now: DateTime<Utc>) {
    let span = match &app.status_message {
        Some(message) => Span::styled(format!(" {}", message), status_style()),
        None => Span::styled(summary_line(app, now), hint_style()),
    };
    f.render_widget(Paragraph::new(span), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::MemoryStore;
    use crate::sound::TerminalBell;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_summary_line_counts_states() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut app = AppState::new(
            AppConfig::default(),
            Box::new(MemoryStore::new()),
            Box::new(TerminalBell::silent(Duration::from_secs(3))),
            now,
        )
        .unwrap();
        for name in ["A", "B"] {
            app.start_add_task();
            app.input_form_add_char(name.chars().next().unwrap());
            app.submit_input_form(now);
        }

        let line = summary_line(&app, now + chrono::Duration::seconds(600));
        assert!(line.contains("2 ongoing"));
        assert!(line.contains("0 paused"));
        assert!(line.contains("20m tracked"));
        assert!(line.contains("peak 2 in parallel"));
        assert!(!line.contains("undo"));
    }

    #[test]
    fn test_peak_survives_completion() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut app = AppState::new(
            AppConfig::default(),
            Box::new(MemoryStore::new()),
            Box::new(TerminalBell::silent(Duration::from_secs(3))),
            now,
        )
        .unwrap();
        for name in ["A", "B"] {
            app.start_add_task();
            app.input_form_add_char(name.chars().next().unwrap());
            app.submit_input_form(now);
        }

        let later = now + chrono::Duration::seconds(600);
        app.complete_selected(later);
        assert_eq!(app.tasks.len(), 1);
        app.status_message = None;

        let line = summary_line(&app, later + chrono::Duration::seconds(60));
        assert!(line.contains("1 ongoing"));
        assert!(line.contains("peak 2 in parallel"));

        // Undo puts the task back in the active set without counting it twice
        app.undo(later + chrono::Duration::seconds(120));
        assert_eq!(app.work_spans().len(), 3);
    }
}
