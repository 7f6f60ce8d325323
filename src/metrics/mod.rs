pub mod concurrency;

pub use concurrency::{concurrency_timeline, spans_from_tasks, DayWindow, Span};
