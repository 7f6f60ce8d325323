use crate::domain::TaskState;
use ratatui::style::{Color, Modifier, Style};

/// Share of the estimate after which the clock turns amber
const NEAR_ESTIMATE: f64 = 0.8;

pub fn default_style() -> Style {
    Style::default().fg(Color::White)
}

/// Selected row highlight style
pub fn selected_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::LightCyan)
        .add_modifier(Modifier::BOLD)
}

/// Badge color for a task state
pub fn state_style(state: TaskState) -> Style {
    match state {
        TaskState::Ongoing => Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
        TaskState::Paused => Style::default().fg(Color::Yellow),
        TaskState::Backlog => Style::default().fg(Color::Gray),
        TaskState::Completed => Style::default().fg(Color::Green),
    }
}

/// Clock color: plain under the estimate, amber close to it, red past it
pub fn elapsed_style(elapsed_seconds: i64, estimated_seconds: i64) -> Style {
    if estimated_seconds <= 0 {
        return Style::default();
    }
    let ratio = elapsed_seconds as f64 / estimated_seconds as f64;
    if ratio >= 1.0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if ratio >= NEAR_ESTIMATE {
        Style::default().fg(Color::LightYellow)
    } else {
        Style::default()
    }
}

/// Bell marker, louder with every multiple of the estimate
pub fn alarm_style(level: u32) -> Style {
    match level {
        0 | 1 => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        2 => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        _ => Style::default()
            .fg(Color::White)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD),
    }
}

/// Tree connectors and the sleep marker
pub fn tree_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn title_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

/// List border, dimmed to blue while the engine is asleep
pub fn frame_style(asleep: bool) -> Style {
    if asleep {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::Gray)
    }
}

pub fn form_style() -> Style {
    Style::default().bg(Color::DarkGray).fg(Color::White)
}

/// Form title, field values and cursor
pub fn form_accent_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

pub fn hint_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn ambitious_style() -> Style {
    Style::default().fg(Color::Green)
}

pub fn status_style() -> Style {
    Style::default().fg(Color::Cyan)
}

/// Tasks whose clock stopped after an accounting fault
pub fn fault_style() -> Style {
    Style::default()
        .fg(Color::LightRed)
        .add_modifier(Modifier::ITALIC)
}
