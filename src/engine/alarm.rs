//! Overtime alarm escalation.
//!
//! A task's alarm level is the whole number of estimates its elapsed time has
//! reached. Each new level raises the alarm once; Pause, Complete and Quiet silence
//! it without lowering the level, so only a higher level can ring again. Resume is
//! the exception: a task resumed while overtime rings again at its current level.

use crate::domain::Task;

/// Alarm level for an elapsed time against an estimate.
pub fn current_level(elapsed_seconds: i64, estimated_seconds: i64) -> u32 {
    if estimated_seconds <= 0 || elapsed_seconds < estimated_seconds {
        return 0;
    }
    u32::try_from(elapsed_seconds / estimated_seconds).unwrap_or(u32::MAX)
}

/// Tick evaluation for an Ongoing task. Returns the new level if an alarm was raised.
pub fn escalate(task: &mut Task, elapsed_seconds: i64) -> Option<u32> {
    let level = current_level(elapsed_seconds, task.estimated_seconds);
    if level > task.alarm.last_level {
        task.alarm.last_level = level;
        task.alarm.sounding = true;
        Some(level)
    } else {
        None
    }
}

/// Silence on pause. The level is kept.
pub fn suppress(task: &mut Task) {
    task.alarm.sounding = false;
}

/// Re-arm on resume. Returns the level to ring, if the task is still overtime.
pub fn rearm(task: &mut Task, elapsed_seconds: i64) -> Option<u32> {
    let level = current_level(elapsed_seconds, task.estimated_seconds);
    if level >= 1 {
        task.alarm.last_level = level;
        task.alarm.sounding = true;
        Some(level)
    } else {
        task.alarm.reset();
        None
    }
}

/// Silence a sounding alarm. Returns true if it was sounding.
pub fn quiet(task: &mut Task) -> bool {
    let was_sounding = task.alarm.sounding;
    task.alarm.sounding = false;
    was_sounding
}
