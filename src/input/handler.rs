use crate::app::AppState;
use crate::domain::UiMode;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};

/// Handle keyboard input events. Returns true when the app should exit.
pub fn handle_key(app: &mut AppState, key: KeyEvent, now: DateTime<Utc>) -> bool {
    match app.ui_mode {
        UiMode::Normal => handle_normal_mode(app, key, now),
        UiMode::AddingTask => handle_input_form_mode(app, key, now),
    }
}

/// Handle keys in normal mode
fn handle_normal_mode(app: &mut AppState, key: KeyEvent, now: DateTime<Utc>) -> bool {
    // Any key clears the previous message
    app.status_message = None;

    match key.code {
        KeyCode::Up => app.move_selection_up(),
        KeyCode::Down => app.move_selection_down(),

        KeyCode::Char('n') | KeyCode::Char('N') => app.start_add_task(),

        // Start / pause / resume
        KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('P') => app.toggle_selected(now),

        KeyCode::Char('c') | KeyCode::Char('C') => app.complete_selected(now),
        KeyCode::Char('u') | KeyCode::Char('U') => app.undo(now),

        // Silence alarms; lowercase only, capital Q exits
        KeyCode::Char('q') => app.quiet(),

        KeyCode::Char('t') | KeyCode::Char('T') => app.toggle_subtask_selected(),
        KeyCode::Char('z') | KeyCode::Char('Z') => app.toggle_sleep(now),

        KeyCode::Esc | KeyCode::Char('Q') => return true,

        _ => {}
    }
    false
}

/// Handle keys in input form mode
fn handle_input_form_mode(app: &mut AppState, key: KeyEvent, now: DateTime<Utc>) -> bool {
    match key.code {
        KeyCode::Enter => app.submit_input_form(now),
        KeyCode::Esc => app.cancel_input_form(),
        KeyCode::Tab => app.input_form_toggle_field(),
        KeyCode::Backspace => app.input_form_backspace(),
        KeyCode::Char(c) => app.input_form_add_char(c),
        _ => {}
    }
    false
}
