mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};
use twisty::{
    app_dirs::AppDirs,
    clock::{Clock, MonotonicClock},
    config::InspectionConfigPatch,
    logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner, TickScheduler, TimerEvent},
    scramble,
    session::Session,
    step_timer::CfopStep,
    store::{KeyValueStore, MemoryStore, SqliteStore},
};

/// Roughly one refresh per display frame
const TICK_RATE_MS: u64 = 16;

/// sleek speedcubing timer with inspection, cfop splits and rolling averages
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal speedcubing timer with WCA-style inspection, CFOP step splits, random-state-style scrambles and Ao5/Ao12 statistics over a persisted history."
)]
pub struct Cli {
    /// path of the history database (defaults to ~/.local/state/twisty/twisty.db)
    #[clap(long)]
    db: Option<PathBuf>,

    /// keep history in memory only; nothing is saved
    #[clap(long, conflicts_with = "db")]
    memory: bool,

    /// turn inspection on (saved for later sessions)
    #[clap(long, conflicts_with = "no_inspection")]
    inspection: bool,

    /// turn inspection off (saved for later sessions)
    #[clap(long)]
    no_inspection: bool,

    /// inspection length in seconds: 10, 15, 20 or 30
    #[clap(long)]
    inspection_secs: Option<u32>,

    /// log level written to twisty.log (error, warn, info, debug, trace)
    #[clap(long)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print scrambles and exit
    Scramble {
        /// how many scrambles to print
        #[clap(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// seed for reproducible scrambles
        #[clap(long)]
        seed: Option<u64>,
    },
}

impl Cli {
    fn inspection_patch(&self) -> Option<InspectionConfigPatch> {
        let enabled = if self.inspection {
            Some(true)
        } else if self.no_inspection {
            Some(false)
        } else {
            None
        };

        if enabled.is_none() && self.inspection_secs.is_none() {
            return None;
        }

        Some(InspectionConfigPatch {
            enabled,
            duration_seconds: self.inspection_secs,
            ..InspectionConfigPatch::default()
        })
    }

    /// Open the configured store. A database that cannot be opened degrades to
    /// an in-memory store so timing still works; the reason is returned.
    fn open_store(&self) -> (Box<dyn KeyValueStore>, Option<String>) {
        if self.memory {
            return (Box::new(MemoryStore::new()), None);
        }

        let opened = match &self.db {
            Some(path) => SqliteStore::with_path(path),
            None => SqliteStore::new(),
        };

        match opened {
            Ok(store) => (Box::new(store), None),
            Err(err) => {
                warn!(error = %err, "history database unavailable, using memory");
                (
                    Box::new(MemoryStore::new()),
                    Some(format!("history will not be saved: {}", err)),
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Timer,
    Steps,
    Drills,
    History,
}

impl Screen {
    pub const ALL: [Screen; 4] = [Screen::Timer, Screen::Steps, Screen::Drills, Screen::History];

    pub fn title(self) -> &'static str {
        match self {
            Screen::Timer => "Timer",
            Screen::Steps => "CFOP Steps",
            Screen::Drills => "Step Drills",
            Screen::History => "History",
        }
    }

    fn index(self) -> usize {
        Screen::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    fn next(self) -> Screen {
        Screen::ALL[(self.index() + 1) % Screen::ALL.len()]
    }

    fn previous(self) -> Screen {
        Screen::ALL[(self.index() + Screen::ALL.len() - 1) % Screen::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<C: Clock + Clone> {
    pub session: Session<C, Box<dyn KeyValueStore>>,
    pub screen: Screen,
    /// Set after `X`; the next `y` clears the current screen's collection
    pub confirm_clear: bool,
    pub status: Option<String>,
}

impl<C: Clock + Clone> App<C> {
    pub fn new(session: Session<C, Box<dyn KeyValueStore>>) -> Self {
        Self {
            session,
            screen: Screen::Timer,
            confirm_clear: false,
            status: None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        if self.confirm_clear {
            self.confirm_clear = false;
            if key.code == KeyCode::Char('y') {
                self.clear_current();
            } else {
                self.status = Some("clear cancelled".to_string());
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Tab => self.screen = self.screen.next(),
            KeyCode::BackTab => self.screen = self.screen.previous(),
            KeyCode::Esc => self.session.reset_active(),
            KeyCode::Char(' ') => {
                self.screen = Screen::Timer;
                if self.session.solve_timer().is_idle() {
                    self.status = None;
                }
                if let Some(record) = self.session.toggle_solve() {
                    self.status = Some(if record.has_penalty() {
                        format!("solve #{} saved with +2 penalty", record.id)
                    } else {
                        format!("solve #{} saved", record.id)
                    });
                }
            }
            KeyCode::Enter => {
                self.screen = Screen::Steps;
                if self.session.step_timer().is_idle() {
                    self.status = None;
                }
                if let Some(record) = self.session.advance_step() {
                    self.status = Some(format!("step solve #{} saved", record.id));
                }
            }
            KeyCode::Char(c @ ('c' | 'f' | 'o' | 'p')) => {
                self.screen = Screen::Drills;
                if !self.session.drill().is_running() {
                    self.status = None;
                }
                let step = match c {
                    'c' => CfopStep::Cross,
                    'f' => CfopStep::F2l,
                    'o' => CfopStep::Oll,
                    _ => CfopStep::Pll,
                };
                if let Some(record) = self.session.toggle_drill(step) {
                    self.status = Some(format!("{} drill saved", record.step));
                }
            }
            KeyCode::Char('n') => {
                self.session.generate_scramble();
            }
            KeyCode::Char('i') => {
                let enabled = !self.session.inspection_config().enabled;
                self.update_inspection(InspectionConfigPatch::enabled(enabled));
            }
            KeyCode::Char(']') => {
                let secs = self.session.inspection_config().next_duration();
                self.update_inspection(InspectionConfigPatch::duration_seconds(secs));
            }
            KeyCode::Char('[') => {
                let secs = self.session.inspection_config().previous_duration();
                self.update_inspection(InspectionConfigPatch::duration_seconds(secs));
            }
            KeyCode::Char('w') => {
                let show = !self.session.inspection_config().show_warnings;
                self.update_inspection(InspectionConfigPatch::show_warnings(show));
            }
            KeyCode::Char('t') => {
                let secs = self.session.inspection_config().next_warning_threshold();
                self.update_inspection(InspectionConfigPatch::warning_threshold_seconds(secs));
            }
            KeyCode::Char('d') => self.delete_latest(),
            KeyCode::Char('X') => {
                self.confirm_clear = true;
                self.status = Some(format!(
                    "clear all {}? press y to confirm",
                    self.clear_target()
                ));
            }
            _ => {}
        }

        if let Some(warning) = self.session.take_warning() {
            self.status = Some(warning);
        }
        Flow::Continue
    }

    fn update_inspection(&mut self, patch: InspectionConfigPatch) {
        if let Err(err) = self.session.update_inspection_config(patch) {
            self.status = Some(err.to_string());
        }
    }

    fn clear_target(&self) -> &'static str {
        match self.screen {
            Screen::Timer | Screen::History => "solves",
            Screen::Steps => "step solves",
            Screen::Drills => "drill records",
        }
    }

    fn clear_current(&mut self) {
        match self.screen {
            Screen::Timer | Screen::History => self.session.clear_all_solves(),
            Screen::Steps => self.session.clear_all_steps(),
            Screen::Drills => self.session.clear_drill_records(),
        }
        self.status = Some(format!("cleared {}", self.clear_target()));
        if let Some(warning) = self.session.take_warning() {
            self.status = Some(warning);
        }
    }

    fn delete_latest(&mut self) {
        let deleted = match self.screen {
            Screen::Timer | Screen::History => {
                let id = self.session.solves().last().map(|r| r.id);
                id.filter(|id| self.session.delete_solve(*id))
                    .map(|id| format!("deleted solve #{}", id))
            }
            Screen::Steps => {
                let id = self.session.step_solves().last().map(|r| r.id);
                id.filter(|id| self.session.delete_step(*id))
                    .map(|id| format!("deleted step solve #{}", id))
            }
            Screen::Drills => None,
        };
        self.status = deleted.or_else(|| Some("nothing to delete".to_string()));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(Command::Scramble { count, seed }) = cli.command {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for _ in 0..count {
            println!("{}", scramble::generate_with(&mut rng));
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(&log_path, cli.log_level.as_deref());
    }

    let (store, store_warning) = cli.open_store();
    let ticks = TickScheduler::new();
    let mut session = Session::open(store, MonotonicClock::new(), ticks.clone());
    if let Some(patch) = cli.inspection_patch() {
        if let Err(err) = session.update_inspection_config(patch) {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, err.to_string()).exit();
        }
    }

    let mut app = App::new(session);
    app.status = store_warning;
    info!("twisty started");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
        ticks,
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("twisty exiting");
    result
}

fn start_tui<B: Backend, C: Clock + Clone>(
    terminal: &mut Terminal<B>,
    app: &mut App<C>,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let Some(event) = runner.step() else {
            break;
        };

        match event {
            TimerEvent::Tick => app.session.on_tick(),
            TimerEvent::Resize => {}
            TimerEvent::Key(key) => {
                if app.on_key(key) == Flow::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}
