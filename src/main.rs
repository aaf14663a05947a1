pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use cubestats::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    error::CubeError,
    runtime::{CrosstermEventSource, FixedTicker, Runner, Ticker, TimerEvent, TimerEventSource},
    scramble::{CubeType, ScrambleGenerator, MAX_SCRAMBLE_LENGTH, MIN_SCRAMBLE_LENGTH},
    session::{parse_solve_number, LiveSession},
    solve::Penalty,
    store::SolveStore,
    timer::HoldTimer,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

/// speedcubing timer tui with rolling averages and session history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A hold-to-start speedcubing timer for the terminal. Solves are stored per session in a local database together with rolling trimmed averages (ao5, ao12) and session bests."
)]
pub struct Cli {
    /// solve database to use (default: ~/.local/state/cubestats/cubestats.db)
    #[clap(long)]
    db: Option<PathBuf>,

    /// session to open
    #[clap(short = 's', long)]
    session: Option<String>,

    /// puzzle to generate scrambles for
    #[clap(short = 'c', long, value_enum)]
    cube_type: Option<CubeType>,

    /// number of moves per scramble
    #[clap(short = 'l', long, value_parser = clap::value_parser!(u64).range(MIN_SCRAMBLE_LENGTH as u64..=MAX_SCRAMBLE_LENGTH as u64))]
    scramble_length: Option<u64>,

    /// milliseconds the space bar must be held before the timer arms
    #[clap(long)]
    hold_ms: Option<u64>,

    /// hide the running time while solving
    #[clap(short = 'f', long)]
    focus: bool,
}

impl Cli {
    /// Overlay command line flags on the stored configuration
    fn apply_to(&self, config: &mut Config) {
        if let Some(cube_type) = self.cube_type {
            config.cube_type = cube_type;
        }
        if let Some(length) = self.scramble_length {
            config.set_scramble_length(length as usize);
        }
        if let Some(hold_ms) = self.hold_ms {
            config.hold_threshold_ms = hold_ms;
        }
        if self.focus {
            config.show_time = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Timing,
    Modify { input: String },
    NewSession { input: String },
    ConfirmDelete,
    Options { cursor: usize },
}

/// Rows of the options screen: cube type, scramble length, show time
pub const OPTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitType {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub live: LiveSession,
    pub timer: HoldTimer,
    pub config: Config,
    pub scramble: String,
    pub state: AppState,
    pub status: String,
    /// Set once the options screen changed something worth saving
    pub options_changed: bool,
}

impl App {
    pub fn new(live: LiveSession, config: Config, release_events: bool) -> Self {
        let timer = HoldTimer::new(
            Duration::from_millis(config.hold_threshold_ms),
            release_events,
        );
        let mut app = Self {
            live,
            timer,
            config,
            scramble: String::new(),
            state: AppState::Timing,
            status: String::new(),
            options_changed: false,
        };
        app.new_scramble();
        app.refresh_status();
        app
    }

    pub fn new_scramble(&mut self) {
        self.scramble =
            ScrambleGenerator::new(self.config.cube_type, self.config.scramble_length).generate();
    }

    pub fn refresh_status(&mut self) {
        self.status = if self.live.solves().is_empty() {
            "Do your first solve".to_string()
        } else {
            self.live.status_line()
        };
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.timer.on_tick(now);
    }

    /// Something on screen changes every tick
    pub fn is_animating(&self) -> bool {
        self.timer.is_running() || self.timer.is_arming()
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> ExitType {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ExitType::Quit;
        }
        if self.state == AppState::Timing {
            return self.timing_key(key, now);
        }
        if key.kind != KeyEventKind::Release {
            match self.state {
                AppState::Modify { .. } => self.modify_key(key),
                AppState::NewSession { .. } => self.new_session_key(key),
                AppState::ConfirmDelete => self.confirm_delete_key(key),
                AppState::Options { cursor } => self.options_key(key, cursor),
                AppState::Timing => {}
            }
        }
        ExitType::Continue
    }

    fn timing_key(&mut self, key: KeyEvent, now: Instant) -> ExitType {
        if self.timer.is_running() {
            // any key stops a running solve
            if key.kind == KeyEventKind::Press {
                if let Some(ms) = self.timer.on_press(now) {
                    self.finish_solve(ms);
                }
            }
            return ExitType::Continue;
        }

        match (key.code, key.kind) {
            (KeyCode::Char(' '), KeyEventKind::Press) => {
                self.timer.on_press(now);
            }
            (KeyCode::Char(' '), KeyEventKind::Release) => self.timer.on_release(now),
            (_, KeyEventKind::Release) | (_, KeyEventKind::Repeat) => {}
            (KeyCode::Esc, _) if self.timer.is_arming() => self.timer.cancel(),
            (KeyCode::Esc, _) => return ExitType::Quit,
            _ if self.timer.is_arming() => {}
            (KeyCode::Char('m'), _) => {
                self.state = AppState::Modify {
                    input: String::new(),
                }
            }
            (KeyCode::Char('2'), _) => self.penalize_last(Penalty::PlusTwo),
            (KeyCode::Char('d'), _) => self.penalize_last(Penalty::DidNotFinish),
            (KeyCode::Char('o'), _) => self.penalize_last(Penalty::None),
            (KeyCode::Char('x'), _) => self.remove_last(),
            (KeyCode::Tab, _) | (KeyCode::Right, _) => self.cycle_session(true),
            (KeyCode::BackTab, _) | (KeyCode::Left, _) => self.cycle_session(false),
            (KeyCode::Char('n'), _) => {
                self.state = AppState::NewSession {
                    input: String::new(),
                }
            }
            (KeyCode::Char('D'), _) => self.state = AppState::ConfirmDelete,
            (KeyCode::Char('p'), _) => self.state = AppState::Options { cursor: 0 },
            (KeyCode::Char('c'), _) => {
                self.config.cube_type = self.config.cube_type.next();
                self.new_scramble();
            }
            (KeyCode::Char('f'), _) => self.config.show_time = !self.config.show_time,
            (KeyCode::Char('s'), _) => self.new_scramble(),
            _ => {}
        }
        ExitType::Continue
    }

    fn finish_solve(&mut self, ms: u64) {
        match self.live.record_solve(ms, &self.scramble) {
            Ok(report) => {
                self.status = match (&report.persist_error, report.announcement()) {
                    (Some(err), _) => format!("Solve not saved: {err}"),
                    (None, Some(announcement)) => announcement,
                    (None, None) => self.live.status_line(),
                };
            }
            Err(err) => self.status = err.to_string(),
        }
        self.new_scramble();
    }

    fn show_result(&mut self, result: cubestats::Result<()>, done: impl FnOnce(&Self) -> String) {
        self.status = match result {
            Ok(()) => done(self),
            Err(err) => {
                tracing::warn!("{err}");
                err.to_string()
            }
        };
    }

    fn penalize_last(&mut self, penalty: Penalty) {
        if self.live.solves().is_empty() {
            self.status = "No solves yet".to_string();
            return;
        }
        let number = self.live.solves().len();
        let result = self.live.apply_penalty_last(penalty);
        self.show_result(result, |app| {
            format!("Solve #{number} set to {penalty}. {}", app.live.status_line())
        });
    }

    fn remove_last(&mut self) {
        if self.live.solves().is_empty() {
            self.status = "No solves yet".to_string();
            return;
        }
        let result = self.live.remove_last();
        self.show_result(result, |app| format!("Last solve removed. {}", app.live.status_line()));
    }

    fn cycle_session(&mut self, forward: bool) {
        let result = self.live.cycle_session(forward);
        self.show_result(result, |app| app.live.status_line());
    }

    fn modify_key(&mut self, key: KeyEvent) {
        let AppState::Modify { input } = &mut self.state else {
            return;
        };
        let action = match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                input.push(c);
                return;
            }
            KeyCode::Backspace => {
                input.pop();
                return;
            }
            KeyCode::Esc => {
                self.state = AppState::Timing;
                return;
            }
            KeyCode::Char('p') | KeyCode::Char('+') => Some(Penalty::PlusTwo),
            KeyCode::Char('d') => Some(Penalty::DidNotFinish),
            KeyCode::Char('o') => Some(Penalty::None),
            KeyCode::Char('x') | KeyCode::Delete => None,
            _ => return,
        };

        let number = match parse_solve_number(input) {
            Ok(number) => number,
            Err(err) => {
                self.status = err.to_string();
                return;
            }
        };
        let result = match action {
            Some(penalty) => self.live.apply_penalty(number, penalty),
            None => self.live.remove_solve(number),
        };
        if let Err(err @ CubeError::InvalidSolveNumber(_)) = &result {
            self.status = err.to_string();
            return;
        }
        self.state = AppState::Timing;
        self.show_result(result, |app| match action {
            Some(penalty) => format!("Solve #{number} set to {penalty}. {}", app.live.status_line()),
            None => format!("Solve #{number} removed. {}", app.live.status_line()),
        });
    }

    fn new_session_key(&mut self, key: KeyEvent) {
        let AppState::NewSession { input } = &mut self.state else {
            return;
        };
        match key.code {
            KeyCode::Char(c) if !c.is_control() => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.state = AppState::Timing,
            KeyCode::Enter => {
                let name = input.trim().to_string();
                self.state = AppState::Timing;
                if name.is_empty() {
                    return;
                }
                let result = self.live.create_session(&name);
                self.show_result(result, |app| app.live.status_line());
            }
            _ => {}
        }
    }

    fn confirm_delete_key(&mut self, key: KeyEvent) {
        self.state = AppState::Timing;
        if key.code == KeyCode::Char('y') {
            let name = self.live.name().to_string();
            let result = self.live.delete_current_session();
            self.show_result(result, |app| {
                format!("Deleted session \"{name}\". {}", app.live.status_line())
            });
        }
    }

    fn options_key(&mut self, key: KeyEvent, cursor: usize) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.state = AppState::Options {
                    cursor: (cursor + OPTION_COUNT - 1) % OPTION_COUNT,
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.state = AppState::Options {
                    cursor: (cursor + 1) % OPTION_COUNT,
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.change_option(cursor, false),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
                self.change_option(cursor, true)
            }
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('p') => self.state = AppState::Timing,
            _ => {}
        }
    }

    fn change_option(&mut self, cursor: usize, increase: bool) {
        match cursor {
            0 => {
                self.config.cube_type = self.config.cube_type.next();
                self.new_scramble();
            }
            1 => {
                let length = if increase {
                    self.config.scramble_length + 1
                } else {
                    self.config.scramble_length.saturating_sub(1)
                };
                self.config.set_scramble_length(length);
                self.new_scramble();
            }
            _ => self.config.show_time = !self.config.show_time,
        }
        self.options_changed = true;
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        if fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    // the alternate screen owns stdout, so logs go to a file without colour codes
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

/// Persist the open session, plus options screen changes. Command line
/// overrides are not written back.
fn save_config<S: ConfigStore>(store: &S, app: &App) {
    let mut stored = store.load();
    stored.last_session = Some(app.live.name().to_string());
    if app.options_changed {
        stored.cube_type = app.config.cube_type;
        stored.scramble_length = app.config.scramble_length;
        stored.show_time = app.config.show_time;
    }
    if let Err(err) = store.save(&stored) {
        tracing::warn!("could not save config: {err}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging();
    tracing::info!("cubestats v{} starting", env!("CARGO_PKG_VERSION"));

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);

    let store = match &cli.db {
        Some(path) => SolveStore::open(path)?,
        None => SolveStore::new()?,
    };
    let preferred = cli.session.clone().or_else(|| config.last_session.clone());
    let live = LiveSession::open(store, config.stats_config(), preferred.as_deref())?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let release_events = supports_keyboard_enhancement().unwrap_or(false);
    if release_events {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    tracing::info!(release_events, "terminal ready");
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(live, config, release_events);
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let result = start_tui(&mut terminal, &mut app, &runner);

    if release_events {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    save_config(&config_store, &app);
    result
}

fn start_tui<B: Backend, E: TimerEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            TimerEvent::Tick => {
                let was_animating = app.is_animating();
                app.on_tick(Instant::now());
                if was_animating || app.is_animating() {
                    terminal.draw(|f| ui(app, f))?;
                }
            }
            TimerEvent::Resize => {
                terminal.draw(|f| ui(app, f))?;
            }
            TimerEvent::Key(key, read_at) => {
                if app.handle_key(key, read_at) == ExitType::Quit {
                    break;
                }
                terminal.draw(|f| ui(app, f))?;
            }
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
