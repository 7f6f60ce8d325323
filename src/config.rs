use crate::engine::EngineConfig;
use crate::persistence::{atomic_write, read_file};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User settings stored in config.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tick interval of the front end, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Track new tasks with work intervals instead of the legacy counter
    #[serde(default = "default_true")]
    pub precise_intervals: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    /// Estimate prefilled in the new-task form
    #[serde(default = "default_minutes")]
    pub default_minutes: u32,
    /// A gap between ticks longer than this counts as a missed sleep
    #[serde(default = "default_sleep_gap_secs")]
    pub sleep_gap_secs: u64,
    /// How often a looping alarm rings again
    #[serde(default = "default_alarm_repeat_secs")]
    pub alarm_repeat_secs: u64,
    #[serde(default = "default_true")]
    pub use_emoji: bool,
    /// Ring the terminal bell for alarms
    #[serde(default = "default_true")]
    pub sound: bool,
    /// Optional file of "YYYY-MM-DD HH:MM:SS" lines, one per distraction, counted in reports
    #[serde(default)]
    pub distraction_file: Option<PathBuf>,
}

fn default_tick_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_minutes() -> u32 {
    15
}
fn default_sleep_gap_secs() -> u64 {
    30
}
fn default_alarm_repeat_secs() -> u64 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            precise_intervals: true,
            auto_start: true,
            default_minutes: default_minutes(),
            sleep_gap_secs: default_sleep_gap_secs(),
            alarm_repeat_secs: default_alarm_repeat_secs(),
            use_emoji: true,
            sound: true,
            distraction_file: None,
        }
    }
}

impl AppConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            precise_intervals: self.precise_intervals,
            auto_start: self.auto_start,
        }
    }
}

/// Load config.json, falling back to defaults when the file does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let content = read_file(path)?;
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

/// Save config.json atomically
pub fn save_config<P: AsRef<Path>>(path: P, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    atomic_write(path, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = tempdir().unwrap();
        let config = load_config(temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tick_ms, 1000);
        assert_eq!(config.sleep_gap_secs, 30);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"precise_intervals": false, "default_minutes": 25}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.precise_intervals);
        assert_eq!(config.default_minutes, 25);
        assert!(config.auto_start);
        assert_eq!(config.alarm_repeat_secs, 3);
        assert!(config.sound);
        assert_eq!(config.distraction_file, None);
        assert!(!config.engine_config().precise_intervals);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.auto_start = false;
        config.tick_ms = 250;
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(load_config(&path).is_err());
    }
}
