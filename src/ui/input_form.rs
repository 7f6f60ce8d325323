use crate::app::AppState;
use crate::ui::{
    layout::centered_rect,
    styles::{form_accent_style, form_style},
};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// One labeled input field, with a cursor when it is being edited
fn field_lines<'a>(label: &'a str, value: &'a str, editing: bool) -> [Line<'a>; 3] {
    let label = if editing {
        Line::raw(format!("{} (editing)", label))
    } else {
        Line::raw(label)
    };
    let value = Line::from(vec![
        Span::raw("> "),
        Span::styled(value, form_accent_style()),
        if editing {
            Span::styled("█", form_accent_style()) // Cursor
        } else {
            Span::raw("")
        },
    ]);
    [label, value, Line::raw("")]
}

/// Render the input form for adding tasks
pub fn render_input_form(f: &mut Frame, app: &AppState, area: Rect) {
    if let Some(form) = &app.input_form {
        let mut lines = vec![Line::raw("")];
        lines.extend(field_lines("Name:", &form.name, form.editing_field == 0));
        lines.extend(field_lines("Estimate (minutes):", &form.minutes, form.editing_field == 1));
        lines.extend(field_lines(
            "Ambitious target (minutes, optional):",
            &form.ambitious,
            form.editing_field == 2,
        ));

        lines.push(Line::raw("Tab to switch fields  ·  Enter to submit  ·  Esc to cancel"));
        if let Some(message) = &app.status_message {
            lines.push(Line::styled(message.clone(), form_accent_style()));
        }

        // Lines plus the border
        let modal_area = centered_rect(area, 60, lines.len() as u16 + 2);
        f.render_widget(Clear, modal_area);

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(" New Task ", form_accent_style()))
                    .style(form_style()),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, modal_area);
    }
}
