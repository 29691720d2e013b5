mod ui;

use crate::ui::screen::current_screen;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing_subscriber::EnvFilter;
use turnwise::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{ConfigStore, FileConfigStore},
    engine::{Submission, SubmitOutcome},
    level::Level,
    library::StepField,
    runtime::{CrosstermEventSource, FixedTicker, Runner, TrainerEvent},
    script::StepId,
    store::SqliteStore,
    util::iso_millis,
    Trainer, TrainerError,
};

const TICK_RATE_MS: u64 = 100;

/// conversational turn-taking trainer with fading support levels
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal trainer for conversational turn-taking. Scripted conversations are answered with fading support (two choices, four choices, fill-in-the-blank, free text), every response is timed, and each session ends with a clinical summary and a level recommendation."
)]
pub struct Cli {
    /// scenario id to start with
    #[clap(short = 's', long)]
    scenario: Option<String>,

    /// support level to start at: 1 two choices, 2 four choices, 3 fill-in, 4 free text
    #[clap(short = 'l', long, value_parser = clap::value_parser!(u8).range(1..=4))]
    level: Option<u8>,

    /// turn locked mode on: scenario and level cannot be changed (persisted)
    #[clap(long, conflicts_with = "unlock")]
    locked: bool,

    /// turn locked mode off (persisted)
    #[clap(long)]
    unlock: bool,

    /// state database holding scenarios, settings and session history
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file with engine and analysis tunables
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// list scenarios
    Scenarios,
    /// replace all scenarios with a JSON array read from a file
    Import { file: PathBuf },
    /// write all scenarios as JSON
    ExportScenarios {
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// create a scenario from the template
    AddScenario,
    /// delete a scenario
    RemoveScenario { id: String },
    /// change a scenario's title
    RenameScenario { id: String, title: String },
    /// append a template step to a scenario
    AddStep { scenario: String },
    /// delete a step from a scenario
    RemoveStep { scenario: String, step: StepId },
    /// set where a step leads: END, a step id, or {"0": id, "1": id}
    SetNext {
        scenario: String,
        step: StepId,
        next: String,
    },
    /// replace a step's text; list fields take one entry per line
    SetStepField {
        scenario: String,
        step: StepId,
        #[clap(value_enum)]
        field: StepField,
        text: String,
    },
    /// list finalized sessions with their recommendation
    History,
    /// write responses as CSV, for one session or the whole history
    ExportCsv {
        #[clap(long)]
        session: Option<String>,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// write one session as JSON
    ExportJson {
        #[clap(long)]
        session: String,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// delete every archived session
    ClearHistory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Conversation,
    Summary,
    History,
}

#[derive(Debug, Default)]
pub struct HistoryState {
    pub scroll_offset: usize,
}

pub struct App {
    pub trainer: Trainer,
    pub state: AppState,
    /// Fill-in blank or free text being typed
    pub input: String,
    /// Highlighted choice, or fill (0) / other option (1) at level 3
    pub selected: usize,
    pub chip_cursor: usize,
    pub history_state: HistoryState,
    pub status: Option<String>,
}

impl App {
    pub fn new(trainer: Trainer) -> Self {
        Self {
            trainer,
            state: AppState::Conversation,
            input: String::new(),
            selected: 0,
            chip_cursor: 0,
            history_state: HistoryState::default(),
            status: None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        let mut screen = current_screen(&self.state);
        screen.on_key(key, self)
    }

    /// Returns whether the screen needs redrawing
    pub fn tick(&mut self) -> bool {
        self.trainer.tick()
    }

    pub fn submit(&mut self, submission: Submission) {
        match self.trainer.submit(submission) {
            Ok(SubmitOutcome::Rejected) => {
                self.status = Some("Choose or type a reply first.".to_string());
            }
            Ok(SubmitOutcome::Busy) => {}
            Ok(SubmitOutcome::Advancing { .. }) => self.clear_reply(),
            Ok(SubmitOutcome::Ended(_)) | Ok(SubmitOutcome::Closed) => {
                self.clear_reply();
                self.state = AppState::Summary;
            }
            Err(err) => self.report(err),
        }
    }

    pub fn restart(&mut self) {
        let result = self.trainer.restart();
        self.after_switch(result);
    }

    pub fn next_scenario(&mut self) {
        let scripts = self.trainer.library().scripts();
        let current = self.trainer.engine().script().id();
        let position = scripts.iter().position(|s| s.id() == current);
        let next = match position {
            Some(i) => &scripts[(i + 1) % scripts.len()],
            None => self.trainer.library().first(),
        };
        let id = next.id().to_string();
        let result = self.trainer.select_scenario(&id);
        self.after_switch(result);
    }

    pub fn cycle_level(&mut self) {
        let result = self.trainer.set_level(self.trainer.level().cycle());
        self.after_switch(result);
    }

    pub fn apply_recommendation(&mut self) {
        match self.trainer.apply_recommendation() {
            Ok(Some(level)) => {
                self.after_switch(Ok(()));
                self.status = Some(format!("Now practicing at level {level}."));
            }
            Ok(None) => self.status = Some("No finished session to take a level from.".to_string()),
            Err(err) => self.report(err),
        }
    }

    pub fn leave_history(&mut self) {
        self.history_state = HistoryState::default();
        self.state = if self.trainer.engine().is_ended() && self.trainer.last_finalized().is_some()
        {
            AppState::Summary
        } else {
            AppState::Conversation
        };
    }

    fn after_switch(&mut self, result: Result<(), TrainerError>) {
        match result {
            Ok(()) => {
                self.clear_reply();
                self.status = None;
                self.state = AppState::Conversation;
            }
            Err(err) => self.report(err),
        }
    }

    fn clear_reply(&mut self) {
        self.input.clear();
        self.selected = 0;
        self.chip_cursor = 0;
        self.status = None;
    }

    fn report(&mut self, err: TrainerError) {
        tracing::debug!(%err, "action refused");
        self.status = Some(err.to_string());
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let config = match &cli.config {
        Some(path) => FileConfigStore::with_path(path).load(),
        None => FileConfigStore::new().load(),
    };
    let store = open_store(cli.db.as_deref())?;
    let mut trainer = Trainer::new(config, Box::new(store), Arc::new(SystemClock))?;

    if let Err(err) = apply_flags(&cli, &mut trainer) {
        Cli::command().error(ErrorKind::InvalidValue, err).exit();
    }

    if let Some(command) = &cli.command {
        let mut stdout = io::stdout().lock();
        if let Err(err) = run_command(command, &mut trainer, &mut stdout) {
            Cli::command().error(ErrorKind::InvalidValue, err).exit();
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(trainer);
    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.trainer.shutdown()?;
    result
}

/// Logs go to a file under the state directory since the TUI owns stdout
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("turnwise=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn open_store(db: Option<&Path>) -> Result<SqliteStore, turnwise::error::StoreError> {
    let path = db
        .map(Path::to_path_buf)
        .or_else(AppDirs::db_path)
        .unwrap_or_else(|| PathBuf::from("turnwise.db"));
    SqliteStore::open(path)
}

/// Lock flags first, so a scenario or level given together with --unlock applies
fn apply_flags(cli: &Cli, trainer: &mut Trainer) -> Result<(), TrainerError> {
    if cli.locked {
        trainer.set_locked(true)?;
    }
    if cli.unlock {
        trainer.set_locked(false)?;
    }
    if let Some(id) = &cli.scenario {
        trainer.select_scenario(id)?;
    }
    if let Some(level) = cli.level.and_then(Level::new) {
        trainer.set_level(level)?;
    }
    Ok(())
}

fn run_command<W: Write>(
    command: &Command,
    trainer: &mut Trainer,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Scenarios => {
            for script in trainer.library().scripts() {
                writeln!(
                    out,
                    "{}\t{}\t{} steps",
                    script.id(),
                    script.title(),
                    script.steps().len()
                )?;
            }
        }
        Command::Import { file } => {
            let text = fs::read_to_string(file)?;
            let count = trainer.import_scenarios(&text)?;
            writeln!(out, "imported {count} scenarios")?;
        }
        Command::ExportScenarios { output } => {
            let json = trainer.export_scenarios()?;
            write_output(output.as_deref(), &json, out)?;
        }
        Command::AddScenario => {
            let id = trainer.add_scenario()?;
            writeln!(out, "{id}")?;
        }
        Command::RemoveScenario { id } => trainer.remove_scenario(id)?,
        Command::RenameScenario { id, title } => trainer.rename_scenario(id, title)?,
        Command::AddStep { scenario } => {
            let id = trainer.add_step(scenario)?;
            writeln!(out, "{id}")?;
        }
        Command::RemoveStep { scenario, step } => trainer.remove_step(scenario, *step)?,
        Command::SetNext {
            scenario,
            step,
            next,
        } => trainer.set_step_next(scenario, *step, next)?,
        Command::SetStepField {
            scenario,
            step,
            field,
            text,
        } => trainer.patch_step(scenario, *step, *field, text)?,
        Command::History => {
            for session in trainer.history().iter().rev() {
                let recommendation = session
                    .analysis
                    .as_ref()
                    .map_or_else(|| "—".to_string(), |a| a.headline());
                writeln!(
                    out,
                    "{}\t{}\t{}\tL{}\t{} responses\t{}\t{}",
                    session.session_id,
                    iso_millis(session.started_at),
                    session.script_title,
                    session.level_at_start,
                    session.events.len(),
                    session
                        .end_reason
                        .map_or_else(|| "—".to_string(), |r| r.to_string()),
                    recommendation
                )?;
            }
        }
        Command::ExportCsv { session, output } => {
            let csv = trainer.export_csv(session.as_deref())?;
            write_output(output.as_deref(), &csv, out)?;
        }
        Command::ExportJson { session, output } => {
            let json = trainer.export_json(session)?;
            write_output(output.as_deref(), &json, out)?;
        }
        Command::ClearHistory => {
            trainer.clear_history()?;
            writeln!(out, "history cleared")?;
        }
    }
    Ok(())
}

fn write_output<W: Write>(output: Option<&Path>, text: &str, out: &mut W) -> io::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            writeln!(out, "wrote {}", path.display())
        }
        None => {
            out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            TrainerEvent::Tick => {
                if app.tick() {
                    terminal.draw(|f| ui(app, f))?;
                }
            }
            TrainerEvent::Resize => {
                terminal.draw(|f| ui(app, f))?;
            }
            TrainerEvent::Key(key) => {
                if is_quit(&key) {
                    break;
                }
                app.on_key(key);
                terminal.draw(|f| ui(app, f))?;
            }
        }
    }

    Ok(())
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
}

fn ui(app: &mut App, f: &mut Frame) {
    let screen = current_screen(&app.state);
    screen.render(app, f);
}

#[cfg(test)]
pub(crate) fn test_app() -> (App, Arc<turnwise::clock::ManualClock>) {
    use turnwise::{clock::ManualClock, config::Config, store::MemoryStore};

    let clock = Arc::new(ManualClock::new(1_000));
    let trainer =
        Trainer::new(Config::default(), Box::new(MemoryStore::new()), clock.clone()).unwrap();
    (App::new(trainer), clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use turnwise::session::EndReason;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.on_key(key(code))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["turnwise"]);
        assert_eq!(cli.scenario, None);
        assert_eq!(cli.level, None);
        assert!(!cli.locked);
        assert!(!cli.unlock);
        assert_eq!(cli.db, None);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cli_level_range() {
        let cli = Cli::parse_from(["turnwise", "-l", "3", "-s", "casa_mae"]);
        assert_eq!(cli.level, Some(3));
        assert_eq!(cli.scenario.as_deref(), Some("casa_mae"));
        assert!(Cli::try_parse_from(["turnwise", "--level", "5"]).is_err());
        assert!(Cli::try_parse_from(["turnwise", "--level", "0"]).is_err());
    }

    #[test]
    fn test_cli_lock_flags_conflict() {
        assert!(Cli::try_parse_from(["turnwise", "--locked", "--unlock"]).is_err());
        assert!(Cli::parse_from(["turnwise", "--locked"]).locked);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::parse_from(["turnwise", "export-csv", "--session", "s1", "--db", "x.db"]);
        assert_eq!(
            cli.command,
            Some(Command::ExportCsv {
                session: Some("s1".into()),
                output: None
            })
        );
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));

        let cli = Cli::parse_from(["turnwise", "set-next", "casa_mae", "2", "END"]);
        assert_eq!(
            cli.command,
            Some(Command::SetNext {
                scenario: "casa_mae".into(),
                step: 2,
                next: "END".into()
            })
        );
        let cli = Cli::parse_from(["turnwise", "set-step-field", "casa_mae", "1", "options-l2", "a\nb"]);
        assert_eq!(
            cli.command,
            Some(Command::SetStepField {
                scenario: "casa_mae".into(),
                step: 1,
                field: StepField::OptionsL2,
                text: "a\nb".into()
            })
        );
        assert!(Cli::try_parse_from(["turnwise", "set-step-field", "casa_mae", "1", "title", "x"]).is_err());
        assert!(Cli::try_parse_from(["turnwise", "export-json"]).is_err());
    }

    #[test]
    fn test_command_factory_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_digit_submits_choice() {
        let (mut app, clock) = test_app();
        clock.advance(1_500);
        assert!(press(&mut app, KeyCode::Char('2')));
        let session = app.trainer.engine().session();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].option_index, Some(1));
        assert_eq!(session.events[0].latency_ms, 1_500);
        assert!(app.trainer.engine().is_typing());
    }

    #[test]
    fn test_out_of_range_digit_is_ignored() {
        let (mut app, _) = test_app();
        assert!(!press(&mut app, KeyCode::Char('9')));
        assert_eq!(app.trainer.engine().session().attempts_invalid, 0);
    }

    #[test]
    fn test_arrows_and_enter() {
        let (mut app, _) = test_app();
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        // two choices at level 1
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Enter);
        assert_eq!(
            app.trainer.engine().session().events[0].option_index,
            Some(1)
        );
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_fill_in_flow() {
        let (mut app, _) = test_app();
        app.trainer.set_level(Level::THREE).unwrap();

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.trainer.engine().session().attempts_invalid, 1);
        assert!(app.status.is_some());

        type_text(&mut app, "Ana");
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "a");
        press(&mut app, KeyCode::Enter);
        let event = &app.trainer.engine().session().events[0];
        assert_eq!(event.response_text, "Oi, Ana!");
        assert_eq!(event.option_index, Some(0));
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_fill_in_other_option() {
        let (mut app, _) = test_app();
        app.trainer.set_level(Level::THREE).unwrap();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Enter);
        let event = &app.trainer.engine().session().events[0];
        assert_eq!(event.response_text, "Olá! 🙂");
        assert_eq!(event.option_index, Some(1));
    }

    #[test]
    fn test_free_text_chips_prefill() {
        let (mut app, _) = test_app();
        app.trainer.set_level(Level::FOUR).unwrap();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input, "Oi!");
        assert!(app.trainer.engine().session().events.is_empty());
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input, "Oi! Olá 🙂");
        type_text(&mut app, " tudo bem?");
        press(&mut app, KeyCode::Enter);
        assert_eq!(
            app.trainer.engine().session().events[0].response_text,
            "Oi! Olá 🙂 tudo bem?"
        );
    }

    #[test]
    fn test_function_keys_switch_scenario_and_level() {
        let (mut app, _) = test_app();
        press(&mut app, KeyCode::F(3));
        assert_eq!(app.trainer.engine().script().id(), "escola_amigo");
        press(&mut app, KeyCode::F(4));
        assert_eq!(app.trainer.level(), Level::TWO);
        press(&mut app, KeyCode::F(5));
        assert_eq!(app.state, AppState::History);
        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.state, AppState::Conversation);
    }

    #[test]
    fn test_locked_refuses_switching_with_status() {
        let (mut app, _) = test_app();
        app.trainer.set_locked(true).unwrap();
        press(&mut app, KeyCode::F(3));
        assert_eq!(app.trainer.engine().script().id(), "cumprimentos");
        assert!(app.status.as_deref().unwrap_or_default().contains("locked"));
        press(&mut app, KeyCode::F(2));
        assert!(app.status.is_none());
        assert_eq!(
            app.trainer.history().latest().unwrap().end_reason,
            Some(EndReason::ManualReset)
        );
    }

    #[test]
    fn test_full_conversation_reaches_summary() {
        let (mut app, clock) = test_app();
        for _ in 0..20 {
            if app.state == AppState::Summary {
                break;
            }
            clock.advance(1_000);
            app.tick();
            press(&mut app, KeyCode::Char('1'));
        }
        assert_eq!(app.state, AppState::Summary);
        assert_eq!(app.trainer.history().len(), 1);

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.state, AppState::History);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.state, AppState::Summary);

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.state, AppState::Conversation);
        assert_eq!(app.trainer.level(), Level::TWO);
    }

    #[test]
    fn test_summary_restart() {
        let (mut app, _) = test_app();
        app.restart();
        app.state = AppState::Summary;
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state, AppState::Conversation);
        assert_eq!(app.trainer.history().len(), 2);
    }

    #[test]
    fn test_history_scroll_is_clamped_on_render() {
        let (mut app, _) = test_app();
        for _ in 0..3 {
            app.restart();
        }
        app.state = AppState::History;
        for _ in 0..5 {
            press(&mut app, KeyCode::PageDown);
        }
        assert_eq!(app.history_state.scroll_offset, 50);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(&mut app, f)).unwrap();
        assert_eq!(app.history_state.scroll_offset, 0);

        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Session history (3 of 400 kept)"));
    }

    #[test]
    fn test_ui_renders_every_state() {
        let (mut app, _) = test_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        for state in [AppState::Conversation, AppState::Summary, AppState::History] {
            app.state = state;
            terminal.draw(|f| ui(&mut app, f)).unwrap();
        }
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit(&key(KeyCode::Esc)));
        assert!(is_quit(&KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
        assert!(!is_quit(&key(KeyCode::Char('c'))));
    }

    #[test]
    fn test_run_command_scenarios_and_history() {
        let (mut app, _) = test_app();
        let mut out = Vec::new();
        run_command(&Command::Scenarios, &mut app.trainer, &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert_eq!(listing.lines().count(), 5);
        assert!(listing.starts_with("cumprimentos\tCumprimentos e continuidade\t7 steps"));

        app.restart();
        let mut out = Vec::new();
        run_command(&Command::History, &mut app.trainer, &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(listing.contains("manual_reset"));
        assert!(listing.contains("0 responses"));
    }

    #[test]
    fn test_run_command_editing() {
        let (mut app, _) = test_app();
        let mut out = Vec::new();
        run_command(&Command::AddScenario, &mut app.trainer, &mut out).unwrap();
        let id = String::from_utf8(out).unwrap().trim().to_string();

        let mut out = Vec::new();
        run_command(
            &Command::AddStep {
                scenario: id.clone(),
            },
            &mut app.trainer,
            &mut out,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "2");

        run_command(
            &Command::SetNext {
                scenario: id.clone(),
                step: 1,
                next: "2".into(),
            },
            &mut app.trainer,
            &mut Vec::new(),
        )
        .unwrap();
        assert!(run_command(
            &Command::SetNext {
                scenario: id.clone(),
                step: 1,
                next: "later".into(),
            },
            &mut app.trainer,
            &mut Vec::new(),
        )
        .is_err());

        run_command(
            &Command::SetStepField {
                scenario: id.clone(),
                step: 2,
                field: StepField::Incoming,
                text: "Quer pão?".into(),
            },
            &mut app.trainer,
            &mut Vec::new(),
        )
        .unwrap();
        let script = app.trainer.library().get(&id).unwrap();
        assert_eq!(script.step(2).unwrap().incoming, "Quer pão?");

        run_command(
            &Command::RenameScenario {
                id: id.clone(),
                title: "Padaria".into(),
            },
            &mut app.trainer,
            &mut Vec::new(),
        )
        .unwrap();
        assert_eq!(app.trainer.library().get(&id).unwrap().title(), "Padaria");

        run_command(
            &Command::RemoveScenario { id: id.clone() },
            &mut app.trainer,
            &mut Vec::new(),
        )
        .unwrap();
        assert!(app.trainer.library().get(&id).is_none());
    }

    #[test]
    fn test_run_command_export_csv_to_file() {
        let (mut app, clock) = test_app();
        clock.advance(900);
        press(&mut app, KeyCode::Char('1'));
        app.restart();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        let mut out = Vec::new();
        run_command(
            &Command::ExportCsv {
                session: None,
                output: Some(path.clone()),
            },
            &mut app.trainer,
            &mut out,
        )
        .unwrap();
        let csv = fs::read_to_string(&path).unwrap();
        assert!(csv.starts_with("sessionId,"));
        assert_eq!(csv.lines().count(), 2);
        assert!(String::from_utf8(out).unwrap().starts_with("wrote "));
    }

    #[test]
    fn test_apply_flags_respects_lock() {
        let (mut app, _) = test_app();
        let cli = Cli::parse_from(["turnwise", "--locked", "-l", "2"]);
        assert!(matches!(
            apply_flags(&cli, &mut app.trainer),
            Err(TrainerError::Locked)
        ));

        let cli = Cli::parse_from(["turnwise", "--unlock", "-l", "2", "-s", "casa_mae"]);
        apply_flags(&cli, &mut app.trainer).unwrap();
        assert!(!app.trainer.is_locked());
        assert_eq!(app.trainer.level(), Level::TWO);
        assert_eq!(app.trainer.engine().script().id(), "casa_mae");
    }
}
