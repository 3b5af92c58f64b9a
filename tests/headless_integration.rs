use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use twisty::{
    clock::ManualClock,
    config::InspectionConfigPatch,
    record::INSPECTION_PENALTY,
    runtime::{FixedTicker, Runner, TestEventSource, TickScheduler, TimerEvent},
    session::Session,
    step_timer::CfopStep,
    store::MemoryStore,
};

fn key(c: char) -> TimerEvent {
    TimerEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Headless solve driven through Runner/TestEventSource without a TTY.
// The clock is manual; ticks only arrive while a timer holds a subscription.
#[test]
fn headless_solve_flow_records_a_solve() {
    let clock = ManualClock::new();
    let ticks = TickScheduler::new();
    let mut session = Session::open(MemoryStore::new(), clock.clone(), ticks.clone());

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
        ticks.clone(),
    );

    tx.send(key(' ')).unwrap();
    match runner.step() {
        Some(TimerEvent::Key(_)) => {
            session.toggle_solve();
        }
        other => panic!("expected key, got {:?}", other),
    }
    assert!(ticks.is_active());

    // No input pending: the runner yields ticks while the solve runs
    clock.advance_ms(11_230);
    assert!(matches!(runner.step(), Some(TimerEvent::Tick)));
    session.on_tick();

    tx.send(key(' ')).unwrap();
    let record = match runner.step() {
        Some(TimerEvent::Key(_)) => session.toggle_solve(),
        other => panic!("expected key, got {:?}", other),
    }
    .expect("stopping records a solve");

    assert_eq!(record.elapsed, Duration::from_millis(11_230));
    assert!(record.is_personal_best);
    assert!(!ticks.is_active(), "idle timers release their tick");

    // Idle: step blocks on input, so a closed channel ends the loop
    drop(tx);
    assert!(runner.step().is_none());
}

#[test]
fn headless_overlong_inspection_adds_penalty() {
    let clock = ManualClock::new();
    let ticks = TickScheduler::new();
    let mut session = Session::open(MemoryStore::new(), clock.clone(), ticks.clone());
    session
        .update_inspection_config(InspectionConfigPatch::enabled(true))
        .unwrap();

    session.toggle_solve(); // inspect
    clock.advance_secs(16);
    session.on_tick();
    let status = session.solve_timer().inspection().unwrap();
    assert!(status.overtime);

    session.toggle_solve(); // start
    clock.advance_ms(9_000);
    let record = session.toggle_solve().unwrap();

    assert_eq!(record.penalty, INSPECTION_PENALTY);
    assert_eq!(record.elapsed, Duration::from_millis(11_000));
}

#[test]
fn headless_step_and_drill_timers_run_side_by_side() {
    let clock = ManualClock::new();
    let ticks = TickScheduler::new();
    let mut session = Session::open(MemoryStore::new(), clock.clone(), ticks.clone());

    session.toggle_drill(CfopStep::Cross);
    for ms in [1_000, 5_000, 2_000, 1_500] {
        session.advance_step();
        clock.advance_ms(ms);
        session.advance_step();
    }
    let drill = session.toggle_drill(CfopStep::Cross).unwrap();

    assert_eq!(session.step_solves().len(), 1);
    let solve = session.step_solves().last().unwrap();
    assert_eq!(solve.total(), Duration::from_millis(9_500));
    assert_eq!(drill.elapsed, Duration::from_millis(9_500));
    assert!(session.active_timers().is_empty());
    assert_eq!(ticks.active_count(), 0);
}
