//! Free-form per-step timers.
//!
//! Unlike [`StepTimer`](crate::step_timer::StepTimer) these are not ordered:
//! any step can be started directly, and stopping it records that step alone.

use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{since, Clock};
use crate::error::StoreResult;
use crate::record::StepDrillRecord;
use crate::runtime::{TickScheduler, TickSubscription};
use crate::step_timer::CfopStep;
use crate::store::{self, KeyValueStore, STEP_DRILLS_KEY};
use crate::util::mean_duration;

#[derive(Debug)]
struct ActiveDrill {
    step: CfopStep,
    started: Duration,
    _tick: TickSubscription,
}

#[derive(Debug)]
pub struct StepDrill<C: Clock> {
    clock: C,
    ticks: TickScheduler,
    active: Option<ActiveDrill>,
}

impl<C: Clock> StepDrill<C> {
    pub fn new(clock: C, ticks: TickScheduler) -> Self {
        Self {
            clock,
            ticks,
            active: None,
        }
    }

    pub fn active_step(&self) -> Option<CfopStep> {
        self.active.as_ref().map(|a| a.step)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Stop `step` if it is the one running, otherwise start it.
    /// A different running step is abandoned without a record.
    pub fn toggle(&mut self, step: CfopStep) -> Option<StepDrillRecord> {
        if self.active_step() == Some(step) {
            return self.stop();
        }

        if let Some(abandoned) = self.active_step() {
            debug!(%abandoned, %step, "switching drill step");
        }
        self.active = Some(ActiveDrill {
            step,
            started: self.clock.now(),
            _tick: self.ticks.subscribe(),
        });
        None
    }

    pub fn stop(&mut self) -> Option<StepDrillRecord> {
        let active = self.active.take()?;
        let record = StepDrillRecord::new(active.step, since(active.started, self.clock.now()));
        info!(
            step = %record.step,
            elapsed_ms = record.elapsed.as_millis() as u64,
            "drill recorded"
        );
        Some(record)
    }

    pub fn reset(&mut self) {
        self.active = None;
    }

    pub fn elapsed(&self) -> Duration {
        self.active
            .as_ref()
            .map(|a| since(a.started, self.clock.now()))
            .unwrap_or_default()
    }
}

/// Persisted list of drill results
#[derive(Debug, Clone, Default)]
pub struct DrillLog {
    records: Vec<StepDrillRecord>,
}

impl DrillLog {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        Self {
            records: store::load_each(store, STEP_DRILLS_KEY),
        }
    }

    pub fn persist<S: KeyValueStore + ?Sized>(&self, store: &S) -> StoreResult<()> {
        store::save_as(store, STEP_DRILLS_KEY, &self.records)
    }

    pub fn records(&self) -> &[StepDrillRecord] {
        &self.records
    }

    pub fn push(&mut self, record: StepDrillRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn count(&self, step: CfopStep) -> usize {
        self.records.iter().filter(|r| r.step == step).count()
    }

    fn times(&self, step: CfopStep) -> Vec<Duration> {
        self.records
            .iter()
            .filter(|r| r.step == step)
            .map(|r| r.elapsed)
            .collect()
    }

    pub fn step_average(&self, step: CfopStep) -> Option<Duration> {
        mean_duration(&self.times(step))
    }

    pub fn step_best(&self, step: CfopStep) -> Option<Duration> {
        self.times(step).into_iter().min()
    }
}
