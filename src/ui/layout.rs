use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Areas of the main screen
pub struct MainLayout {
    pub keybindings_area: Rect,
    pub list_area: Rect,
    pub status_area: Rect,
}

/// Key hints on top, the task tree in the middle, one status line at the bottom
pub fn create_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    MainLayout {
        keybindings_area: chunks[0],
        list_area: chunks[1],
        status_area: chunks[2],
    }
}

/// A box `width_percent` wide and `height` rows tall, centered in `area`.
/// Shrinks to fit small terminals.
pub fn centered_rect(area: Rect, width_percent: u16, height: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(width_percent.min(100)) / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
