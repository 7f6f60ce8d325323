use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DIR_NAME: &str = ".etime";
pub const ACTIVE_FILE: &str = "active.json";
pub const HISTORY_FILE: &str = "history.jsonl";
pub const UNDO_FILE: &str = "undo.json";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "etime.log";

/// Get the etime directory - checks for local .etime first, then falls back to global ~/.etime
pub fn get_etime_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    if let Some(local_dir) = find_local_etime(&current_dir) {
        return Ok(local_dir);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DIR_NAME))
}

/// Find local .etime directory by walking up the directory tree
fn find_local_etime(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let etime_dir = current.join(DIR_NAME);
        if etime_dir.is_dir() {
            return Some(etime_dir);
        }
        current = current.parent()?;
    }
}

/// Ensure the etime directory exists
pub fn ensure_etime_dir() -> Result<PathBuf> {
    let dir = get_etime_dir()?;
    ensure_dir(&dir)?;
    Ok(dir)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Initialize a local .etime directory in the current directory
pub fn init_local_etime() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    init_etime_in(&current_dir)
}

fn init_etime_in(parent: &Path) -> Result<PathBuf> {
    let etime_dir = parent.join(DIR_NAME);
    if etime_dir.exists() {
        anyhow::bail!("etime directory already exists: {}", etime_dir.display());
    }

    fs::create_dir_all(&etime_dir)
        .with_context(|| format!("Failed to create directory: {}", etime_dir.display()))?;

    Ok(etime_dir)
}

pub fn config_file(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

pub fn log_file(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// Default report path (report-YYYY-MM-DD.md)
pub fn report_file(dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    dir.join(format!("report-{}.md", date.format("%Y-%m-%d")))
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    // A bare file name has an empty parent; the temp file goes next to it
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => anyhow::bail!("Not a file path: {}", path.display()),
    };

    let mut temp_file = NamedTempFile::new_in(dir)
        .context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, return empty string if file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Append content to a file and sync it (for history.jsonl)
pub fn append_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open file for appending: {}", path.display()))?;

    file.write_all(content.as_bytes())
        .context("Failed to append to file")?;

    file.sync_all().context("Failed to sync file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_etime_dir() {
        let dir = get_etime_dir().unwrap();
        assert!(dir.to_string_lossy().contains(".etime"));
    }

    #[test]
    fn test_find_local_etime_walks_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let created = init_etime_in(temp_dir.path()).unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_local_etime(&nested), Some(created));
    }

    #[test]
    fn test_init_twice_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_etime_in(temp_dir.path()).unwrap();
        assert!(init_etime_in(temp_dir.path()).is_err());
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("active.json");

        atomic_write(&test_file, "[]").unwrap();
        assert_eq!(read_file(&test_file).unwrap(), "[]");

        atomic_write(&test_file, "[1]").unwrap();
        assert_eq!(read_file(&test_file).unwrap(), "[1]");
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nonexistent.json");
        assert_eq!(read_file(&test_file).unwrap(), "");
    }

    #[test]
    fn test_append_to_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("history.jsonl");

        append_to_file(&test_file, "{\"a\":1}\n").unwrap();
        append_to_file(&test_file, "{\"a\":2}\n").unwrap();

        assert_eq!(read_file(&test_file).unwrap(), "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn test_report_file_name() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let path = report_file(Path::new("/tmp/x"), date);
        assert_eq!(path, PathBuf::from("/tmp/x/report-2024-05-02.md"));
    }
}
