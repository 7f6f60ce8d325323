use crate::domain::Classification;
use crate::engine::{EngineEvent, StopScope};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Turns engine sound requests into noise. Stop requests may arrive any number of
/// times and must be harmless when nothing is playing.
pub trait SoundPlayer: Send {
    /// Start (or keep) looping the alarm for a task
    fn play_loop(&mut self, task_id: Uuid, level: u32);

    fn stop(&mut self, task_id: Uuid);

    fn stop_all(&mut self);

    /// One-shot sound for a completed task
    fn celebrate(&mut self, _classification: Classification) {}

    /// Called from the front-end loop so looping alarms can repeat
    fn pulse(&mut self, _now: Instant) {}
}

/// Route an engine event to the player
pub fn apply_event(player: &mut dyn SoundPlayer, event: &EngineEvent) {
    match event {
        EngineEvent::SoundRequest { task_id, level } => player.play_loop(*task_id, *level),
        EngineEvent::SoundStop(StopScope::Task(id)) => player.stop(*id),
        EngineEvent::SoundStop(StopScope::All) => player.stop_all(),
        EngineEvent::Completion(record) => player.celebrate(record.classification),
        EngineEvent::Transition { .. } => {}
    }
}

#[cfg(target_os = "macos")]
fn play_system_sound(name: &str) {
    let path = format!("/System/Library/Sounds/{}.aiff", name);
    if let Err(e) = std::process::Command::new("afplay").arg(&path).spawn() {
        warn!("Failed to play {}: {}", path, e);
    }
}

/// Rings the terminal bell while any alarm is looping
#[derive(Debug)]
pub struct TerminalBell {
    looping: BTreeMap<Uuid, u32>,
    repeat: Duration,
    last_ring: Option<Instant>,
    audible: bool,
}

impl TerminalBell {
    pub fn new(repeat: Duration) -> Self {
        Self {
            looping: BTreeMap::new(),
            repeat,
            last_ring: None,
            audible: true,
        }
    }

    /// A bell that keeps the bookkeeping but makes no noise
    pub fn silent(repeat: Duration) -> Self {
        Self {
            audible: false,
            ..Self::new(repeat)
        }
    }

    pub fn is_ringing(&self) -> bool {
        !self.looping.is_empty()
    }

    /// Highest level among looping alarms
    pub fn loudest(&self) -> Option<u32> {
        self.looping.values().copied().max()
    }

    fn ring(&mut self, now: Instant) {
        self.last_ring = Some(now);
        if !self.audible {
            return;
        }
        // One bell per escalation level, capped at three
        let bells = self.loudest().unwrap_or(1).clamp(1, 3) as usize;
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout
            .write_all(&b"\x07".repeat(bells))
            .and_then(|_| stdout.flush())
        {
            warn!("Failed to ring terminal bell: {}", e);
        }
        #[cfg(target_os = "macos")]
        play_system_sound("Ping");
    }

    /// Whether a looping alarm is due to ring again
    fn due(&self, now: Instant) -> bool {
        self.is_ringing()
            && self
                .last_ring
                .map_or(true, |last| now.duration_since(last) >= self.repeat)
    }
}

impl SoundPlayer for TerminalBell {
    fn play_loop(&mut self, task_id: Uuid, level: u32) {
        debug!(task = %task_id, level, "alarm loop started");
        self.looping.insert(task_id, level);
        self.ring(Instant::now());
    }

    fn stop(&mut self, task_id: Uuid) {
        if self.looping.remove(&task_id).is_some() {
            debug!(task = %task_id, "alarm loop stopped");
        }
    }

    fn stop_all(&mut self) {
        self.looping.clear();
    }

    fn celebrate(&mut self, classification: Classification) {
        if !self.audible {
            return;
        }
        #[cfg(target_os = "macos")]
        match classification {
            Classification::Ambitious => play_system_sound("Purr"),
            Classification::Normal => play_system_sound("Hero"),
        }
        #[cfg(not(target_os = "macos"))]
        let _ = classification;
    }

    fn pulse(&mut self, now: Instant) {
        if self.due(now) {
            self.ring(now);
        }
    }
}
