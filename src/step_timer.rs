use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{since, Clock};
use crate::record::{StepSolveRecord, StepSplit};
use crate::runtime::{TickScheduler, TickSubscription};

/// The four phases of a CFOP solve, in solving order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum CfopStep {
    Cross,
    #[serde(rename = "F2L")]
    #[strum(serialize = "F2L")]
    F2l,
    #[serde(rename = "OLL")]
    #[strum(serialize = "OLL")]
    Oll,
    #[serde(rename = "PLL")]
    #[strum(serialize = "PLL")]
    Pll,
}

impl CfopStep {
    pub const ALL: [CfopStep; 4] = [CfopStep::Cross, CfopStep::F2l, CfopStep::Oll, CfopStep::Pll];

    pub fn label(self) -> &'static str {
        match self {
            CfopStep::Cross => "Cross",
            CfopStep::F2l => "F2L (First Two Layers)",
            CfopStep::Oll => "OLL (Orient Last Layer)",
            CfopStep::Pll => "PLL (Permute Last Layer)",
        }
    }

    pub fn index(self) -> usize {
        match self {
            CfopStep::Cross => 0,
            CfopStep::F2l => 1,
            CfopStep::Oll => 2,
            CfopStep::Pll => 3,
        }
    }
}

#[derive(Debug)]
struct RunningStep {
    started: Duration,
    _tick: TickSubscription,
}

/// Sequential Cross → F2L → OLL → PLL timer
#[derive(Debug)]
pub struct StepTimer<C: Clock> {
    clock: C,
    ticks: TickScheduler,
    current: usize,
    completed: Vec<StepSplit>,
    running: Option<RunningStep>,
    display: Duration,
}

impl<C: Clock> StepTimer<C> {
    pub fn new(clock: C, ticks: TickScheduler) -> Self {
        Self {
            clock,
            ticks,
            current: 0,
            completed: Vec::with_capacity(CfopStep::ALL.len()),
            running: None,
            display: Duration::ZERO,
        }
    }

    pub fn current_step(&self) -> CfopStep {
        CfopStep::ALL[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn completed(&self) -> &[StepSplit] {
        &self.completed
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Nothing started and nothing recorded for the current solve
    pub fn is_idle(&self) -> bool {
        self.running.is_none() && self.completed.is_empty()
    }

    /// Begin timing the current step. No-op while a step is running.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        self.running = Some(RunningStep {
            started: self.clock.now(),
            _tick: self.ticks.subscribe(),
        });
        self.display = Duration::ZERO;
        debug!(step = %self.current_step(), "step started");
    }

    /// Stop the running step. Returns the finished solve once PLL completes.
    pub fn complete(&mut self) -> Option<StepSolveRecord> {
        let running = self.running.take()?;
        let elapsed = since(running.started, self.clock.now());
        let step = self.current_step();
        self.completed.push(StepSplit::new(step, elapsed));
        self.display = elapsed;
        debug!(%step, elapsed_ms = elapsed.as_millis() as u64, "step completed");

        if self.current + 1 < CfopStep::ALL.len() {
            self.current += 1;
            return None;
        }

        let splits: [StepSplit; 4] = std::mem::take(&mut self.completed).try_into().ok()?;
        let record = StepSolveRecord::new(splits);
        info!(total_ms = record.total().as_millis() as u64, "step solve finished");
        self.reset();
        Some(record)
    }

    /// Single-key binding: complete when running, start otherwise
    pub fn advance(&mut self) -> Option<StepSolveRecord> {
        if self.is_running() {
            self.complete()
        } else {
            self.start();
            None
        }
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.completed.clear();
        self.running = None;
        self.display = Duration::ZERO;
    }

    /// Recompute the displayed time of the running step from the clock
    pub fn on_tick(&mut self) {
        if let Some(running) = &self.running {
            self.display = since(running.started, self.clock.now());
        }
    }

    /// Elapsed on the step being timed as of the last tick, or the last
    /// finished step
    pub fn current_elapsed(&self) -> Duration {
        self.display
    }

    /// Completed splits plus the running step as of the last tick
    pub fn running_total(&self) -> Duration {
        let done: Duration = self.completed.iter().map(|s| s.elapsed).sum();
        if self.is_running() {
            done + self.display
        } else {
            done
        }
    }
}
