use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{InspectionConfig, InspectionConfigPatch};
use crate::drill::{DrillLog, StepDrill};
use crate::error::{ConfigError, StoreResult};
use crate::history::{History, HistoryKeys};
use crate::record::{SolveRecord, StepDrillRecord, StepSolveRecord};
use crate::runtime::TickScheduler;
use crate::scramble::{self, Scramble};
use crate::solve_timer::SolveTimer;
use crate::step_timer::{CfopStep, StepTimer};
use crate::store::{
    self, KeyValueStore, INSPECTION_CONFIG_KEY, SOLVES_KEY, SOLVES_NEXT_ID_KEY, STEP_SOLVES_KEY,
    STEP_SOLVES_NEXT_ID_KEY,
};

pub const SOLVE_KEYS: HistoryKeys = HistoryKeys {
    records: SOLVES_KEY,
    next_id: SOLVES_NEXT_ID_KEY,
};

pub const STEP_SOLVE_KEYS: HistoryKeys = HistoryKeys {
    records: STEP_SOLVES_KEY,
    next_id: STEP_SOLVES_NEXT_ID_KEY,
};

/// Which timer currently has a measurement in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTimer {
    Solve,
    Steps,
    Drill,
}

/// Owns the timers, histories and store, and exposes every user intent.
///
/// Each mutation of a collection is written through to the store before the
/// call returns. Write failures never undo the in-memory change; they are
/// logged and kept for the caller to show (see [`Session::take_warning`]).
pub struct Session<C: Clock + Clone, S: KeyValueStore> {
    store: S,
    config: InspectionConfig,
    solve_timer: SolveTimer<C>,
    step_timer: StepTimer<C>,
    drill: StepDrill<C>,
    solves: History<SolveRecord>,
    step_solves: History<StepSolveRecord>,
    drills: DrillLog,
    scramble: Scramble,
    /// Scramble shown when the solve in progress left Idle
    solve_scramble: Option<String>,
    warning: Option<String>,
}

impl<C: Clock + Clone, S: KeyValueStore> Session<C, S> {
    pub fn open(store: S, clock: C, ticks: TickScheduler) -> Self {
        let config = load_config(&store);
        let solves = History::load(&store, SOLVE_KEYS);
        let step_solves = History::load(&store, STEP_SOLVE_KEYS);
        let drills = DrillLog::load(&store);
        info!(
            solves = solves.len(),
            step_solves = step_solves.len(),
            drills = drills.records().len(),
            inspection = config.enabled,
            "session opened"
        );

        Self {
            solve_timer: SolveTimer::new(clock.clone(), config, ticks.clone()),
            step_timer: StepTimer::new(clock.clone(), ticks.clone()),
            drill: StepDrill::new(clock, ticks),
            store,
            config,
            solves,
            step_solves,
            drills,
            scramble: scramble::generate(),
            solve_scramble: None,
            warning: None,
        }
    }

    // -- solve timer -----------------------------------------------------

    pub fn start_or_inspect(&mut self) {
        self.capture_scramble();
        self.solve_timer.start_or_inspect();
    }

    /// Stop a running solve and record it with the scramble it was solved from
    pub fn stop(&mut self) -> Option<SolveRecord> {
        let record = self.solve_timer.stop()?;
        Some(self.record_solve(record))
    }

    /// Space bar: start, begin the solve after inspection, or stop
    pub fn toggle_solve(&mut self) -> Option<SolveRecord> {
        self.capture_scramble();
        let record = self.solve_timer.toggle()?;
        Some(self.record_solve(record))
    }

    pub fn reset_solve_timer(&mut self) {
        self.solve_timer.reset();
        self.solve_scramble = None;
    }

    fn capture_scramble(&mut self) {
        if self.solve_timer.is_idle() {
            self.solve_scramble = Some(self.scramble.to_string());
        }
    }

    fn record_solve(&mut self, mut record: SolveRecord) -> SolveRecord {
        record.scramble = self
            .solve_scramble
            .take()
            .or_else(|| Some(self.scramble.to_string()));
        let stored = self.solves.append(record).clone();
        let result = self.solves.persist(&self.store);
        self.report(SOLVES_KEY, result);
        self.scramble = scramble::generate();
        stored
    }

    // -- step timer ------------------------------------------------------

    pub fn start_step(&mut self) {
        self.step_timer.start();
    }

    pub fn complete_step(&mut self) -> Option<StepSolveRecord> {
        let record = self.step_timer.complete()?;
        Some(self.record_step_solve(record))
    }

    /// Enter key: start the current step or complete it
    pub fn advance_step(&mut self) -> Option<StepSolveRecord> {
        let record = self.step_timer.advance()?;
        Some(self.record_step_solve(record))
    }

    pub fn reset_step_timer(&mut self) {
        self.step_timer.reset();
    }

    fn record_step_solve(&mut self, record: StepSolveRecord) -> StepSolveRecord {
        let stored = self.step_solves.append(record).clone();
        let result = self.step_solves.persist(&self.store);
        self.report(STEP_SOLVES_KEY, result);
        stored
    }

    // -- drill timers ----------------------------------------------------

    pub fn toggle_drill(&mut self, step: CfopStep) -> Option<StepDrillRecord> {
        let record = self.drill.toggle(step)?;
        self.drills.push(record.clone());
        let result = self.drills.persist(&self.store);
        self.report(store::STEP_DRILLS_KEY, result);
        Some(record)
    }

    pub fn reset_drill(&mut self) {
        self.drill.reset();
    }

    pub fn clear_drill_records(&mut self) {
        self.drills.clear();
        let result = self.drills.persist(&self.store);
        self.report(store::STEP_DRILLS_KEY, result);
    }

    // -- shared ----------------------------------------------------------

    /// Timers with a measurement in progress
    pub fn active_timers(&self) -> Vec<ActiveTimer> {
        let mut active = Vec::new();
        if !self.solve_timer.is_idle() {
            active.push(ActiveTimer::Solve);
        }
        if !self.step_timer.is_idle() {
            active.push(ActiveTimer::Steps);
        }
        if self.drill.is_running() {
            active.push(ActiveTimer::Drill);
        }
        active
    }

    /// Escape: reset whichever timers are in progress
    pub fn reset_active(&mut self) {
        for timer in self.active_timers() {
            match timer {
                ActiveTimer::Solve => self.reset_solve_timer(),
                ActiveTimer::Steps => self.reset_step_timer(),
                ActiveTimer::Drill => self.reset_drill(),
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.solve_timer.on_tick();
        self.step_timer.on_tick();
    }

    pub fn generate_scramble(&mut self) -> &Scramble {
        self.scramble = scramble::generate();
        &self.scramble
    }

    pub fn scramble(&self) -> &Scramble {
        &self.scramble
    }

    // -- history ---------------------------------------------------------

    pub fn delete_solve(&mut self, id: u64) -> bool {
        if !self.solves.delete(id) {
            return false;
        }
        let result = self.solves.persist(&self.store);
        self.report(SOLVES_KEY, result);
        true
    }

    pub fn delete_step(&mut self, id: u64) -> bool {
        if !self.step_solves.delete(id) {
            return false;
        }
        let result = self.step_solves.persist(&self.store);
        self.report(STEP_SOLVES_KEY, result);
        true
    }

    pub fn clear_all_solves(&mut self) {
        self.solves.clear_all();
        let result = self.solves.persist(&self.store);
        self.report(SOLVES_KEY, result);
    }

    pub fn clear_all_steps(&mut self) {
        self.step_solves.clear_all();
        let result = self.step_solves.persist(&self.store);
        self.report(STEP_SOLVES_KEY, result);
    }

    // -- configuration ---------------------------------------------------

    /// Apply and persist a partial inspection update. Unrecognized values are
    /// rejected and nothing changes.
    pub fn update_inspection_config(
        &mut self,
        patch: InspectionConfigPatch,
    ) -> Result<&InspectionConfig, ConfigError> {
        self.config.apply(patch)?;
        self.solve_timer.set_config(self.config);
        let result = store::save_as(&self.store, INSPECTION_CONFIG_KEY, &self.config);
        self.report(INSPECTION_CONFIG_KEY, result);
        info!(config = ?self.config, "inspection settings updated");
        Ok(&self.config)
    }

    pub fn inspection_config(&self) -> &InspectionConfig {
        &self.config
    }

    // -- accessors -------------------------------------------------------

    pub fn solve_timer(&self) -> &SolveTimer<C> {
        &self.solve_timer
    }

    pub fn step_timer(&self) -> &StepTimer<C> {
        &self.step_timer
    }

    pub fn drill(&self) -> &StepDrill<C> {
        &self.drill
    }

    pub fn solves(&self) -> &History<SolveRecord> {
        &self.solves
    }

    pub fn step_solves(&self) -> &History<StepSolveRecord> {
        &self.step_solves
    }

    pub fn drills(&self) -> &DrillLog {
        &self.drills
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The most recent persistence failure, if any, cleared on read
    pub fn take_warning(&mut self) -> Option<String> {
        self.warning.take()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    fn report(&mut self, key: &str, result: StoreResult<()>) {
        if let Err(err) = result {
            warn!(key, error = %err, "failed to persist, keeping in-memory state");
            self.warning = Some(format!("could not save {}: {}", key, err));
        }
    }
}

fn load_config<S: KeyValueStore>(store: &S) -> InspectionConfig {
    let config: InspectionConfig =
        store::load_or(store, INSPECTION_CONFIG_KEY, InspectionConfig::default());
    match config.validate() {
        Ok(()) => config,
        Err(err) => {
            warn!(error = %err, "stored inspection settings rejected, using defaults");
            InspectionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn session() -> (Session<ManualClock, MemoryStore>, ManualClock, TickScheduler) {
        let clock = ManualClock::new();
        let ticks = TickScheduler::new();
        (
            Session::open(MemoryStore::new(), clock.clone(), ticks.clone()),
            clock,
            ticks,
        )
    }

    #[test]
    fn solve_is_recorded_with_its_scramble() {
        let (mut s, clock, _) = session();
        let scramble = s.scramble().to_string();

        s.start_or_inspect();
        clock.advance_ms(8_000);
        let record = s.stop().unwrap();

        assert_eq!(record.id, 1);
        assert!(record.is_personal_best);
        assert_eq!(record.scramble.as_deref(), Some(scramble.as_str()));
        assert_eq!(s.solves().len(), 1);
        assert!(s.store().raw(SOLVES_KEY).is_some());
        assert_eq!(s.store().raw(SOLVES_NEXT_ID_KEY).as_deref(), Some("2"));
    }

    #[test]
    fn new_scramble_mid_solve_keeps_the_one_solved() {
        let (mut s, clock, _) = session();
        let solved = s.scramble().to_string();

        s.start_or_inspect();
        let replacement = s.generate_scramble().to_string();
        assert_ne!(replacement, solved);
        clock.advance_ms(1_000);
        let record = s.stop().unwrap();
        assert_eq!(record.scramble.as_deref(), Some(solved.as_str()));

        s.update_inspection_config(InspectionConfigPatch::enabled(true))
            .unwrap();
        let solved = s.scramble().to_string();
        s.toggle_solve();
        s.generate_scramble();
        s.toggle_solve();
        s.generate_scramble();
        clock.advance_ms(1_000);
        let record = s.toggle_solve().unwrap();
        assert_eq!(record.scramble.as_deref(), Some(solved.as_str()));
    }

    #[test]
    fn config_update_reaches_the_timer_and_store() {
        let (mut s, clock, _) = session();
        s.update_inspection_config(InspectionConfigPatch::enabled(true))
            .unwrap();
        assert!(s.solve_timer().config().enabled);

        s.start_or_inspect();
        clock.advance_secs(16);
        s.start_or_inspect();
        clock.advance_ms(5_000);
        assert_eq!(s.stop().unwrap().elapsed, Duration::from_millis(7_000));

        let stored: InspectionConfig =
            store::load_or(s.store(), INSPECTION_CONFIG_KEY, InspectionConfig::default());
        assert!(stored.enabled);
    }

    #[test]
    fn invalid_config_update_is_rejected() {
        let (mut s, _, _) = session();
        assert_eq!(
            s.update_inspection_config(InspectionConfigPatch::duration_seconds(7)),
            Err(ConfigError::UnsupportedDuration(7))
        );
        assert!(s.store().raw(INSPECTION_CONFIG_KEY).is_none());
    }

    #[test]
    fn write_failure_is_a_warning_not_a_rollback() {
        let (mut s, clock, _) = session();
        s.store().set_fail_writes(true);

        s.start_or_inspect();
        clock.advance_ms(1_000);
        assert!(s.stop().is_some());

        assert_eq!(s.solves().len(), 1);
        let warning = s.take_warning().unwrap();
        assert!(warning.contains(SOLVES_KEY));
        assert!(s.take_warning().is_none());
    }

    #[test]
    fn escape_resets_whatever_is_running() {
        let (mut s, _, ticks) = session();
        s.start_or_inspect();
        s.start_step();
        s.toggle_drill(CfopStep::Oll);
        assert_eq!(s.active_timers().len(), 3);

        s.reset_active();
        assert!(s.active_timers().is_empty());
        assert!(!ticks.is_active());
        assert!(s.solves().is_empty());
    }

    #[test]
    fn delete_and_clear_persist() {
        let (mut s, clock, _) = session();
        for ms in [1000, 1500, 1200] {
            s.start_or_inspect();
            clock.advance_ms(ms);
            s.stop();
        }

        assert!(s.delete_solve(1));
        assert!(!s.delete_solve(1));
        assert_eq!(
            s.solves().personal_best().map(|r| r.elapsed),
            Some(Duration::from_millis(1200))
        );

        s.clear_all_solves();
        assert_eq!(s.store().raw(SOLVES_KEY).as_deref(), Some("[]"));
        assert_eq!(s.store().raw(SOLVES_NEXT_ID_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn step_solve_flow() {
        let (mut s, clock, _) = session();
        let mut finished = None;
        for ms in [1200, 3400, 800, 600] {
            s.start_step();
            clock.advance_ms(ms);
            finished = s.complete_step();
        }
        let record = finished.unwrap();
        assert_eq!(record.total(), Duration::from_millis(6000));
        assert!(record.is_personal_best);

        assert!(s.delete_step(record.id));
        s.clear_all_steps();
        assert!(s.step_solves().is_empty());
    }

    #[test]
    fn drills_are_logged_and_cleared() {
        let (mut s, clock, _) = session();
        s.toggle_drill(CfopStep::Cross);
        clock.advance_ms(2_000);
        assert!(s.toggle_drill(CfopStep::Cross).is_some());
        assert_eq!(s.drills().records().len(), 1);

        s.clear_drill_records();
        assert!(s.drills().records().is_empty());
    }

    #[test]
    fn malformed_stored_config_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.save_raw(INSPECTION_CONFIG_KEY, r#"{"enabled":true,"durationSeconds":11}"#);
        let s = Session::open(store, ManualClock::new(), TickScheduler::new());
        assert_eq!(*s.inspection_config(), InspectionConfig::default());
    }
}
