use super::accounting;
use super::alarm;
use super::events::EngineEvent;
use super::EngineState;
use crate::domain::TaskState;
use crate::error::EngineError;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

/// What one tick pass did
#[derive(Debug, Default)]
pub struct TickReport {
    /// Ongoing tasks evaluated
    pub evaluated: usize,
    /// Alarms raised this pass, as (task, level)
    pub alarms: Vec<(Uuid, u32)>,
    /// Accounting faults detected this pass
    pub faults: Vec<EngineError>,
    /// Legacy tasks whose counter advanced
    pub legacy_accrued: usize,
}

impl EngineState {
    /// Whole seconds since the previous tick, carrying the remainder forward
    fn seconds_since_last_tick(&mut self, now: DateTime<Utc>) -> i64 {
        let gap = match self.last_tick {
            Some(prev) => now.signed_duration_since(prev).max(Duration::zero()),
            None => Duration::zero(),
        };
        self.last_tick = Some(now);

        let total = gap + self.tick_carry;
        let whole = total.num_seconds();
        self.tick_carry = total - Duration::seconds(whole);
        whole
    }

    /// Evaluate every Ongoing task. A fault on one task never stops the others.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let seconds = self.seconds_since_last_tick(now);
        let mut report = TickReport::default();

        for task in self.tasks.iter_mut().filter(|t| t.state == TaskState::Ongoing) {
            report.evaluated += 1;
            if accounting::accrue_legacy(task, seconds) {
                report.legacy_accrued += 1;
            }

            let settled = accounting::settle(task, now);
            if let Some(fault) = settled.fault {
                error!("{}", fault);
                report.faults.push(fault);
            }

            if let Some(level) = alarm::escalate(task, settled.elapsed) {
                info!(task = %task.id, name = %task.name, level, "overtime alarm");
                report.alarms.push((task.id, level));
                self.outbox.push(EngineEvent::SoundRequest {
                    task_id: task.id,
                    level,
                });
            }
        }

        report
    }
}
