use crate::ui::styles::hint_style;
use ratatui::{layout::Rect, text::{Line, Span}, widgets::Paragraph, Frame};

/// Render the keybindings hint bar
pub fn render_keybindings(f: &mut Frame, area: Rect) {
    let hints = Line::from(vec![
        Span::raw(" ↑/↓ select   "),
        Span::raw("n new   "),
        Span::raw("Enter/p start/pause   "),
        Span::raw("c complete   "),
        Span::raw("u undo   "),
        Span::raw("q quiet   "),
        Span::raw("t subtask   "),
        Span::raw("z sleep   "),
        Span::raw("Esc/Q exit"),
    ]);

    let paragraph = Paragraph::new(hints).style(hint_style());
    f.render_widget(paragraph, area);
}
