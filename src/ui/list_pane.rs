use crate::app::AppState;
use crate::domain::{format_clock, format_duration, progress_glyph, status_badge, tree_connector, Task};
use crate::engine::accounting;
use crate::ui::styles::{
    alarm_style, ambitious_style, default_style, elapsed_style, fault_style, frame_style,
    selected_style, state_style, title_style, tree_style,
};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Render the active task list
pub fn render_list_pane(f: &mut Frame, app: &AppState, area: Rect, now: DateTime<Utc>) {
    let sleep_paused = app.engine.sleep_paused();
    let items: Vec<ListItem> = app
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let task = &app.tasks[row.task_index];
            let elapsed = accounting::elapsed_seconds(task, now);
            let mut line = create_task_line(task, elapsed, row.depth, row.is_last, app.config.use_emoji);
            if sleep_paused.contains(&task.id) {
                line.spans.push(Span::styled(" 💤".to_string(), tree_style()));
            }
            let style = if idx == app.selected_index {
                selected_style()
            } else {
                default_style()
            };

            ListItem::new(line).style(style)
        })
        .collect();

    let date = now.with_timezone(&Local).format("%a %b %d");
    let asleep = app.engine.is_asleep();
    let sleeping = if asleep { " · 💤 asleep" } else { "" };
    let title = format!(" etime ({}) · {} active{} ", date, app.tasks.len(), sleeping);

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(frame_style(asleep))
            .title(Span::styled(title, title_style())),
    );

    f.render_widget(list, area);
}

/// Create a single line for a task
/// Format: [🌿] Write proposal  ⏱ 12:30 / 25m ⏱ ONGOING 🎯 15m 🔔2
pub fn create_task_line(task: &Task, elapsed: i64, depth: usize, is_last: bool, use_emoji: bool) -> Line<'static> {
    let mut spans = Vec::new();

    // Indentation and tree connector for subtasks
    if depth > 0 {
        spans.push(Span::styled("   ".repeat(depth), tree_style()));
        spans.push(Span::styled(tree_connector(is_last).to_string(), tree_style()));
        spans.push(Span::raw(" ".to_string()));
    }

    let ratio = if task.estimated_seconds > 0 {
        elapsed as f64 / task.estimated_seconds as f64
    } else {
        0.0
    };
    spans.push(Span::raw(format!("[{}] ", progress_glyph(ratio, use_emoji))));
    spans.push(Span::raw(task.name.clone()));
    spans.push(Span::raw("  ".to_string()));

    let time_str = format!(
        "⏱ {} / {} ",
        format_clock(elapsed),
        format_duration(task.estimated_seconds)
    );
    spans.push(Span::styled(time_str, elapsed_style(elapsed, task.estimated_seconds)));
    spans.push(Span::styled(status_badge(task.state).to_string(), state_style(task.state)));

    if let Some(ambitious) = task.ambitious_seconds {
        spans.push(Span::styled(
            format!(" 🎯 {}", format_duration(ambitious)),
            ambitious_style(),
        ));
    }

    if task.alarm.sounding {
        spans.push(Span::styled(
            format!(" 🔔{}", task.alarm.last_level),
            alarm_style(task.alarm.last_level),
        ));
    }

    if task.accounting_fault {
        spans.push(Span::styled(" ⚠ time frozen".to_string(), fault_style()));
    }

    Line::from(spans)
}
