pub mod enums;
pub mod task;
pub mod views;

pub use enums::{AccountingMode, Action, Classification, TaskState, UiMode};
pub use task::{Accounting, AlarmState, CompletionRecord, NewTask, Task, WorkInterval};
pub use views::{
    flatten_tasks, format_clock, format_duration, progress_glyph, status_badge, tree_connector,
    FlatRow,
};
