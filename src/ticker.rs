use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default tick interval in milliseconds
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Smallest tick the front end will run at
const MIN_TICK_MS: u64 = 50;

/// Get tick duration for a configured interval
pub fn tick_duration(tick_ms: u64) -> Duration {
    Duration::from_millis(tick_ms.max(MIN_TICK_MS))
}

/// Time between two ticks, if it is long enough to mean the machine was asleep
pub fn sleep_gap(
    previous: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_secs: u64,
) -> Option<chrono::Duration> {
    let gap = now.signed_duration_since(previous);
    let threshold = chrono::Duration::seconds(threshold_secs.min(u64::from(u32::MAX)) as i64);
    if threshold_secs > 0 && gap > threshold {
        Some(gap)
    } else {
        None
    }
}
