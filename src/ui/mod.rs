pub mod input_form;
pub mod keybindings;
pub mod layout;
pub mod list_pane;
pub mod status_bar;
pub mod styles;

use crate::app::AppState;
use chrono::{DateTime, Utc};
use input_form::render_input_form;
use keybindings::render_keybindings;
use layout::create_layout;
use list_pane::render_list_pane;
use ratatui::Frame;
use status_bar::render_status_bar;

/// Main render function - draws the entire UI
pub fn render(f: &mut Frame, app: &AppState, now: DateTime<Utc>) {
    let size = f.size();
    let layout = create_layout(size);

    render_keybindings(f, layout.keybindings_area);
    render_list_pane(f, app, layout.list_area, now);
    render_status_bar(f, app, layout.status_area, now);

    // Render input form if active
    if app.input_form.is_some() {
        render_input_form(f, app, size);
    }
}
