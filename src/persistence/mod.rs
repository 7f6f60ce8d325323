pub mod files;
pub mod records;
pub mod store;

pub use files::{
    atomic_write, config_file, ensure_etime_dir, get_etime_dir, init_local_etime, log_file,
    read_file, report_file,
};
pub use store::{JsonFileStore, MemoryStore, TaskStore};
