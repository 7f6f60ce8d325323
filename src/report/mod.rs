pub mod generator;
pub mod stats;

pub use generator::{build_report, generate_report};
