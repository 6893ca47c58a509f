mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Rect, Size},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::{Duration, Instant},
};

use skeet::events::GameEvent;
use skeet::game::Game;
use skeet::history::HistoryDb;
use skeet::pacing::Difficulty;
use skeet::powerups::PowerUpKind;
use skeet::runtime::{CrosstermInputSource, FixedTicker, InputEvent, Runner};
use skeet::session::{Phase, SessionSummary};
use skeet::store::{Config, ConfigStore, FileConfigStore, FileHighScoreStore};
use skeet::timer::Millis;

const TICK_RATE_MS: u64 = 100;
const NOTICE_TTL_MS: Millis = 2500;

/// terminal target-shooting arcade with timed sessions and power-ups
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal target-shooting arcade. Targets spawn faster as the session levels up; click them before they expire, spend rapid-fire and time-freeze charges wisely, and chase the high score."
)]
pub struct Cli {
    /// difficulty for this run (overrides the saved preference)
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<ArgDifficulty>,

    /// finished sessions listed on the results screen
    #[clap(short = 'r', long, default_value_t = 5)]
    recent: usize,

    /// skip reading and writing the session history database
    #[clap(long)]
    no_history: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
pub enum ArgDifficulty {
    Easy,
    Medium,
    Hard,
}

impl ArgDifficulty {
    fn as_difficulty(&self) -> Difficulty {
        match self {
            ArgDifficulty::Easy => Difficulty::Easy,
            ArgDifficulty::Medium => Difficulty::Medium,
            ArgDifficulty::Hard => Difficulty::Hard,
        }
    }
}

/// Transient HUD message standing in for the arcade's sounds and flashes.
#[derive(Debug)]
pub struct Notice {
    pub text: String,
    until: Millis,
}

#[derive(Debug)]
pub struct App {
    pub game: Game,
    pub notices: Vec<Notice>,
    pub last_summary: Option<SessionSummary>,
    pub now: Millis,
    pub recent_limit: usize,
}

impl App {
    pub fn new(game: Game, recent_limit: usize) -> Self {
        Self {
            game,
            notices: Vec::new(),
            last_summary: None,
            now: 0,
            recent_limit,
        }
    }

    pub fn push_notice(&mut self, now: Millis, text: String) {
        self.notices.push(Notice {
            text,
            until: now + NOTICE_TTL_MS,
        });
    }

    /// Drops notices past their display window and advances the render clock.
    pub fn sync(&mut self, now: Millis) {
        self.now = now;
        self.notices.retain(|n| n.until > now);
    }

    /// Turns core events into HUD notices; spawns and hits are reflected by
    /// rendering the registry directly.
    pub fn absorb_events(&mut self, now: Millis) {
        for event in self.game.drain_events() {
            match event {
                GameEvent::LevelUp { level } => {
                    self.push_notice(now, format!("LEVEL {level}!"));
                }
                GameEvent::PowerUpChanged { kind, active, .. } => {
                    if active {
                        self.push_notice(now, format!("{kind} active"));
                    } else {
                        self.push_notice(now, format!("{kind} worn off"));
                    }
                }
                GameEvent::SessionEnded { summary } => {
                    self.last_summary = Some(summary);
                }
                GameEvent::StateUpdated { .. }
                | GameEvent::TargetSpawned { .. }
                | GameEvent::TargetResolved { .. } => {}
            }
        }
    }
}

/// Monotonic session clock; the core only ever sees these milliseconds.
struct WallClock {
    origin: Instant,
}

impl WallClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty.as_difficulty();
        let _ = config_store.save(&config);
    }

    let history = if cli.no_history {
        None
    } else {
        HistoryDb::new().ok()
    };
    let game = Game::new(
        config.difficulty,
        Box::new(FileHighScoreStore::new()),
        history,
    );
    let mut app = App::new(game, cli.recent);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &config_store);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    config_store: &impl ConfigStore,
) -> Result<(), Box<dyn Error>> {
    let clock = WallClock::new();
    let runner = Runner::new(
        CrosstermInputSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        let now = clock.now_ms();
        app.game.advance(now);
        app.absorb_events(now);
        app.sync(now);
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            InputEvent::Tick | InputEvent::Resize => {}
            InputEvent::Key(key) => {
                if handle_key(app, key, clock.now_ms(), config_store) {
                    break;
                }
            }
            InputEvent::Mouse(mouse) => {
                handle_mouse(app, mouse, terminal.size()?);
            }
        }
    }

    Ok(())
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent, now: Millis, config_store: &impl ConfigStore) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => return true,
        KeyCode::Char('s') | KeyCode::Enter => {
            if matches!(app.game.phase(), Phase::Idle | Phase::Ended) {
                app.last_summary = None;
                app.game.start(now);
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => match app.game.phase() {
            Phase::Running => app.game.pause(now),
            Phase::Paused => app.game.resume(now),
            _ => {}
        },
        KeyCode::Char('d') => {
            let next = next_difficulty(app.game.state().difficulty);
            if app.game.set_difficulty(next) {
                let _ = config_store.save(&Config { difficulty: next });
                app.push_notice(now, format!("difficulty: {next}"));
            }
        }
        KeyCode::Char('1') => {
            app.game.activate_power_up(PowerUpKind::RapidFire, now);
        }
        KeyCode::Char('2') => {
            app.game.activate_power_up(PowerUpKind::TimeFreeze, now);
        }
        _ => {}
    }
    false
}

fn handle_mouse(app: &mut App, mouse: MouseEvent, size: Size) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    let area = Rect::new(0, 0, size.width, size.height);
    let inner = ui::arena_inner(area);
    if let Some((x, y)) = ui::cell_to_logical(inner, mouse.column, mouse.row) {
        if let Some(id) = app.game.target_at(x, y) {
            app.game.trigger_hit(id);
        }
    }
}

fn next_difficulty(difficulty: Difficulty) -> Difficulty {
    match difficulty {
        Difficulty::Easy => Difficulty::Medium,
        Difficulty::Medium => Difficulty::Hard,
        Difficulty::Hard => Difficulty::Easy,
    }
}
