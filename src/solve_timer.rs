use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{since, Clock};
use crate::config::InspectionConfig;
use crate::record::{SolveRecord, INSPECTION_PENALTY};
use crate::runtime::{TickScheduler, TickSubscription};

/// Observable phase of the solve timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePhase {
    Idle,
    Inspecting,
    Running,
}

/// Snapshot of an inspection countdown for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectionStatus {
    pub elapsed: Duration,
    pub remaining: Duration,
    /// Remaining time is inside the warning threshold (only when warnings are shown)
    pub warning: bool,
    /// The limit has passed; starting now earns the penalty
    pub overtime: bool,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Inspecting {
        started: Duration,
        config: InspectionConfig,
        _tick: TickSubscription,
    },
    Running {
        started: Duration,
        /// Inspection elapsed when the solve started, with the limit in force
        inspection: Option<(Duration, Duration)>,
        _tick: TickSubscription,
    },
}

/// Idle → (Inspecting →) Running → Idle stopwatch with the inspection penalty rule
#[derive(Debug)]
pub struct SolveTimer<C: Clock> {
    clock: C,
    ticks: TickScheduler,
    config: InspectionConfig,
    phase: Phase,
    display: Duration,
}

impl<C: Clock> SolveTimer<C> {
    pub fn new(clock: C, config: InspectionConfig, ticks: TickScheduler) -> Self {
        Self {
            clock,
            ticks,
            config,
            phase: Phase::Idle,
            display: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    /// Takes effect from the next solve; an inspection or solve in progress
    /// keeps the settings it started with
    pub fn set_config(&mut self, config: InspectionConfig) {
        self.config = config;
    }

    pub fn phase(&self) -> SolvePhase {
        match self.phase {
            Phase::Idle => SolvePhase::Idle,
            Phase::Inspecting { .. } => SolvePhase::Inspecting,
            Phase::Running { .. } => SolvePhase::Running,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Idle → Inspecting (inspection on) or Running; Inspecting → Running.
    /// Ignored while running.
    pub fn start_or_inspect(&mut self) {
        let now = self.clock.now();
        match &self.phase {
            Phase::Idle if self.config.enabled => {
                self.phase = Phase::Inspecting {
                    started: now,
                    config: self.config,
                    _tick: self.ticks.subscribe(),
                };
                self.display = Duration::ZERO;
                debug!(limit_secs = self.config.duration_seconds, "inspection started");
            }
            Phase::Idle => {
                self.phase = Phase::Running {
                    started: now,
                    inspection: None,
                    _tick: self.ticks.subscribe(),
                };
                self.display = Duration::ZERO;
                debug!("solve started");
            }
            Phase::Inspecting {
                started, config, ..
            } => {
                let inspected = since(*started, now);
                let limit = config.duration();
                self.phase = Phase::Running {
                    started: now,
                    inspection: Some((inspected, limit)),
                    _tick: self.ticks.subscribe(),
                };
                self.display = Duration::ZERO;
                debug!(
                    inspected_ms = inspected.as_millis() as u64,
                    "solve started after inspection"
                );
            }
            Phase::Running { .. } => {}
        }
    }

    /// Running → Idle, producing the record. Ignored in any other phase.
    pub fn stop(&mut self) -> Option<SolveRecord> {
        let Phase::Running {
            started,
            inspection,
            ..
        } = &self.phase
        else {
            return None;
        };
        let (started, inspection) = (*started, *inspection);
        self.phase = Phase::Idle;

        let raw = since(started, self.clock.now());
        let penalty = match inspection {
            Some((inspected, limit)) if inspected > limit => INSPECTION_PENALTY,
            _ => Duration::ZERO,
        };

        let record = SolveRecord::new(raw, penalty, None);
        self.display = record.elapsed;
        info!(
            elapsed_ms = record.elapsed.as_millis() as u64,
            penalty_ms = penalty.as_millis() as u64,
            "solve finished"
        );
        Some(record)
    }

    /// Single-key binding: stop when running, otherwise start or inspect
    pub fn toggle(&mut self) -> Option<SolveRecord> {
        if self.phase() == SolvePhase::Running {
            self.stop()
        } else {
            self.start_or_inspect();
            None
        }
    }

    /// Back to Idle from anywhere; nothing is recorded
    pub fn reset(&mut self) {
        if !self.is_idle() {
            debug!(phase = ?self.phase(), "solve timer reset");
        }
        self.phase = Phase::Idle;
        self.display = Duration::ZERO;
    }

    /// Recompute the displayed value from the clock. While inspecting this is
    /// the inspection elapsed, while running the solve elapsed.
    pub fn on_tick(&mut self) {
        match &self.phase {
            Phase::Inspecting { started, .. } | Phase::Running { started, .. } => {
                self.display = since(*started, self.clock.now());
            }
            Phase::Idle => {}
        }
    }

    /// Solve time as of the last tick while running, the last result while
    /// idle, zero while inspecting
    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            Phase::Inspecting { .. } => Duration::ZERO,
            Phase::Running { .. } | Phase::Idle => self.display,
        }
    }

    /// Countdown state as of the last tick, only while inspecting
    pub fn inspection(&self) -> Option<InspectionStatus> {
        let Phase::Inspecting { config, .. } = &self.phase else {
            return None;
        };

        let elapsed = self.display;
        let limit = config.duration();
        let remaining = limit.saturating_sub(elapsed);
        Some(InspectionStatus {
            elapsed,
            remaining,
            warning: config.show_warnings && remaining <= config.warning_threshold(),
            overtime: elapsed > limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::clock::ManualClock;

    fn inspection_on() -> InspectionConfig {
        InspectionConfig {
            enabled: true,
            ..InspectionConfig::default()
        }
    }

    fn timer(config: InspectionConfig) -> (SolveTimer<ManualClock>, ManualClock, TickScheduler) {
        let clock = ManualClock::new();
        let ticks = TickScheduler::new();
        (
            SolveTimer::new(clock.clone(), config, ticks.clone()),
            clock,
            ticks,
        )
    }

    #[test]
    fn plain_solve_without_inspection() {
        let (mut t, clock, ticks) = timer(InspectionConfig::default());
        t.start_or_inspect();
        assert_eq!(t.phase(), SolvePhase::Running);
        assert!(ticks.is_active());

        clock.advance_ms(12_340);
        let record = t.stop().unwrap();
        assert_eq!(record.elapsed, Duration::from_millis(12_340));
        assert!(!record.has_penalty());
        assert_eq!(t.phase(), SolvePhase::Idle);
        assert!(!ticks.is_active());
        assert_eq!(t.elapsed(), Duration::from_millis(12_340));
    }

    #[test]
    fn late_start_after_inspection_adds_two_seconds() {
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        assert_eq!(t.phase(), SolvePhase::Inspecting);

        clock.advance_secs(16);
        t.start_or_inspect();
        clock.advance_ms(10_000);

        let record = t.stop().unwrap();
        assert_eq!(record.elapsed, Duration::from_millis(12_000));
        assert_eq!(record.penalty, INSPECTION_PENALTY);
    }

    #[test]
    fn start_within_inspection_has_no_penalty() {
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        clock.advance_secs(14);
        t.start_or_inspect();
        clock.advance_ms(10_000);

        let record = t.stop().unwrap();
        assert_eq!(record.elapsed, Duration::from_millis(10_000));
        assert!(!record.has_penalty());
    }

    #[test]
    fn start_exactly_at_the_limit_has_no_penalty() {
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        clock.advance_ms(15_000);
        t.on_tick();
        assert!(!t.inspection().unwrap().overtime);
        t.start_or_inspect();
        clock.advance_ms(8_000);
        assert!(!t.stop().unwrap().has_penalty());

        t.start_or_inspect();
        clock.advance_ms(15_001);
        t.start_or_inspect();
        clock.advance_ms(8_000);
        assert!(t.stop().unwrap().has_penalty());
    }

    #[test]
    fn waiting_after_start_does_not_earn_penalty() {
        // Judged on inspection elapsed when the solve begins, not at stop.
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        clock.advance_secs(14);
        t.start_or_inspect();
        clock.advance_secs(40);
        assert!(!t.stop().unwrap().has_penalty());
    }

    #[test]
    fn inspection_status_warns_and_flags_overtime() {
        let (mut t, clock, _) = timer(inspection_on());
        assert_eq!(t.inspection(), None);
        t.start_or_inspect();

        clock.advance_secs(11);
        t.on_tick();
        let status = t.inspection().unwrap();
        assert_eq!(status.remaining, Duration::from_secs(4));
        assert!(!status.warning);
        assert!(!status.overtime);

        clock.advance_secs(1);
        t.on_tick();
        assert!(t.inspection().unwrap().warning);

        clock.advance_secs(4);
        t.on_tick();
        let status = t.inspection().unwrap();
        assert!(status.overtime);
        assert_eq!(status.remaining, Duration::ZERO);
        assert_eq!(t.phase(), SolvePhase::Inspecting);
    }

    #[test]
    fn warnings_can_be_hidden() {
        let config = InspectionConfig {
            show_warnings: false,
            ..inspection_on()
        };
        let (mut t, clock, _) = timer(config);
        t.start_or_inspect();
        clock.advance_secs(14);
        t.on_tick();
        assert!(!t.inspection().unwrap().warning);
    }

    #[test]
    fn illegal_transitions_are_noops() {
        let (mut t, clock, _) = timer(inspection_on());
        assert!(t.stop().is_none());

        t.start_or_inspect();
        assert!(t.stop().is_none());
        assert_eq!(t.phase(), SolvePhase::Inspecting);

        t.start_or_inspect();
        clock.advance_ms(300);
        t.start_or_inspect();
        assert_eq!(t.phase(), SolvePhase::Running);
        clock.advance_ms(700);
        assert_eq!(t.stop().unwrap().elapsed, Duration::from_millis(1000));
    }

    #[test]
    fn reset_twice_from_idle_is_harmless() {
        let (mut t, _, ticks) = timer(InspectionConfig::default());
        t.reset();
        t.reset();
        assert_eq!(t.phase(), SolvePhase::Idle);
        assert_eq!(t.elapsed(), Duration::ZERO);
        assert!(t.stop().is_none());
        assert!(!ticks.is_active());
    }

    #[test]
    fn reset_mid_solve_cancels_tick_and_records_nothing() {
        let (mut t, clock, ticks) = timer(inspection_on());
        t.start_or_inspect();
        assert!(ticks.is_active());
        t.start_or_inspect();
        clock.advance_secs(3);

        t.reset();
        assert!(!ticks.is_active());
        assert_matches!(t.stop(), None);
    }

    #[test]
    fn config_change_applies_to_next_solve() {
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        t.set_config(InspectionConfig {
            duration_seconds: 30,
            ..inspection_on()
        });

        clock.advance_secs(16);
        t.start_or_inspect();
        clock.advance_secs(1);
        assert!(t.stop().unwrap().has_penalty());

        t.start_or_inspect();
        clock.advance_secs(16);
        t.start_or_inspect();
        clock.advance_secs(1);
        assert!(!t.stop().unwrap().has_penalty());
    }

    #[test]
    fn toggle_drives_the_full_cycle() {
        let (mut t, clock, _) = timer(InspectionConfig::default());
        assert!(t.toggle().is_none());
        clock.advance_ms(5_000);
        t.on_tick();
        assert_eq!(t.elapsed(), Duration::from_millis(5_000));
        assert_eq!(t.toggle().unwrap().elapsed, Duration::from_millis(5_000));
    }

    #[test]
    fn displayed_time_follows_ticks() {
        let (mut t, clock, _) = timer(inspection_on());
        t.start_or_inspect();
        clock.advance_secs(3);
        assert_eq!(t.inspection().unwrap().remaining, Duration::from_secs(15));
        t.on_tick();
        assert_eq!(t.inspection().unwrap().remaining, Duration::from_secs(12));

        t.start_or_inspect();
        clock.advance_ms(2_500);
        assert_eq!(t.elapsed(), Duration::ZERO);
        t.on_tick();
        assert_eq!(t.elapsed(), Duration::from_millis(2_500));
    }
}
