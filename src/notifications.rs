/// Desktop notification support
/// Currently only implements macOS notifications

use crate::domain::Classification;
#[cfg(target_os = "macos")]
use std::process::Command;

#[cfg(target_os = "macos")]
fn display(title: &str, body: &str) {
    let script = format!(
        r#"display notification "{}" with title "{}""#,
        body.replace('"', "\\\""),
        title.replace('"', "\\\"")
    );

    if let Err(e) = Command::new("osascript").arg("-e").arg(&script).output() {
        tracing::warn!("Failed to send notification: {}", e);
    }
}

/// Notification title and body for a completed task
pub fn completion_message(task_name: &str, classification: Classification, elapsed: &str) -> (String, String) {
    match classification {
        Classification::Ambitious => (
            "etime - Ambitious target hit".to_string(),
            format!("🚀 {} done in {}", task_name, elapsed),
        ),
        Classification::Normal => (
            "etime - Task completed".to_string(),
            format!("{} done in {}", task_name, elapsed),
        ),
    }
}

/// Send a notification when a task is completed
pub fn notify_task_completed(task_name: &str, classification: Classification, elapsed: &str) {
    let (title, body) = completion_message(task_name, classification, elapsed);

    #[cfg(target_os = "macos")]
    display(&title, &body);

    #[cfg(not(target_os = "macos"))]
    {
        // No-op on other platforms
        let _ = (title, body);
    }
}

/// Send a notification when a task reaches a new multiple of its estimate
pub fn notify_overtime(task_name: &str, level: u32) {
    let body = format!("⏰ {} is at {}x its estimate", task_name, level);

    #[cfg(target_os = "macos")]
    display("etime - Overtime", &body);

    #[cfg(not(target_os = "macos"))]
    {
        let _ = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_message_distinguishes_ambitious() {
        let (title, body) = completion_message("Write", Classification::Ambitious, "8m");
        assert!(title.contains("Ambitious"));
        assert!(body.contains("Write"));

        let (title, _) = completion_message("Write", Classification::Normal, "20m");
        assert!(title.contains("completed"));
    }
}
