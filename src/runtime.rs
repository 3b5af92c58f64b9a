use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::debug;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum TimerEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait TimerEventSource: Send + 'static {
    /// Block until an event arrives.
    fn recv(&self) -> Result<TimerEvent, RecvError>;

    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<TimerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                // Windows reports releases too; only presses are intents.
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(TimerEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(TimerEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEventSource for CrosstermEventSource {
    fn recv(&self) -> Result<TimerEvent, RecvError> {
        self.rx.recv()
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Hands out tick subscriptions and reports whether any is still alive.
///
/// Clones share the same subscription count.
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    active: Rc<Cell<usize>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking until the returned guard is dropped
    pub fn subscribe(&self) -> TickSubscription {
        self.active.set(self.active.get() + 1);
        debug!(active = self.active.get(), "tick subscription acquired");
        TickSubscription {
            active: Rc::clone(&self.active),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get() > 0
    }

    pub fn active_count(&self) -> usize {
        self.active.get()
    }
}

/// Keeps the display tick running while held
#[derive(Debug)]
pub struct TickSubscription {
    active: Rc<Cell<usize>>,
}

impl Drop for TickSubscription {
    fn drop(&mut self) {
        self.active.set(self.active.get().saturating_sub(1));
        debug!(active = self.active.get(), "tick subscription released");
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<TimerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TimerEvent>) -> Self {
        Self { rx }
    }
}

impl TimerEventSource for TestEventSource {
    fn recv(&self) -> Result<TimerEvent, RecvError> {
        self.rx.recv()
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: TimerEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    scheduler: TickScheduler,
}

impl<E: TimerEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T, scheduler: TickScheduler) -> Self {
        Self {
            event_source,
            ticker,
            scheduler,
        }
    }

    /// Returns the next event. While a tick subscription is alive this blocks
    /// at most one tick interval and yields Tick on timeout; otherwise it waits
    /// for input. Returns None once the event source is gone.
    pub fn step(&self) -> Option<TimerEvent> {
        if self.scheduler.is_active() {
            match self.event_source.recv_timeout(self.ticker.interval()) {
                Ok(ev) => Some(ev),
                Err(RecvTimeoutError::Timeout) => Some(TimerEvent::Tick),
                Err(RecvTimeoutError::Disconnected) => None,
            }
        } else {
            self.event_source.recv().ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout_while_subscribed() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let scheduler = TickScheduler::new();
        let runner = Runner::new(es, ticker, scheduler.clone());

        let _sub = scheduler.subscribe();
        match runner.step() {
            Some(TimerEvent::Tick) => {}
            _ => panic!("expected Tick on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(TimerEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker, TickScheduler::new());

        match runner.step() {
            Some(TimerEvent::Resize) => {}
            _ => panic!("expected Resize event"),
        }
    }

    #[test]
    fn step_without_subscription_does_not_tick() {
        let (tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker, TickScheduler::new());

        drop(tx);
        assert!(runner.step().is_none());
    }

    #[test]
    fn dropping_subscription_cancels_ticking() {
        let scheduler = TickScheduler::new();
        let first = scheduler.subscribe();
        let second = scheduler.subscribe();
        assert_eq!(scheduler.active_count(), 2);

        drop(first);
        assert!(scheduler.is_active());
        drop(second);
        assert!(!scheduler.is_active());
    }
}
