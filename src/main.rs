mod app;
mod bridge;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{
    AppCommand, AppEvent, AppModel, CatalogSignal, Navigation, SelectionNotifier, dispatch_line,
};
use crate::cli::{CliCommand, CliInvocation, LinkOptions};
use crate::domain::Catalog;
use crate::infra::{
    CommandCryPlayer, CryPlayer, DeviceTransport, LOG_FILE_NAME, LinkHandle, LinkSignal, LogSink,
    OutboundNotifier, init_logging, load_dex, resolve_dex_path, resolve_dexlink_state_dir,
    spawn_link_session,
};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind,
};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    Config(#[from] crate::cli::CliParseError),
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Tui(options) => {
            if let Ok(state_dir) = resolve_dexlink_state_dir() {
                let _ = init_logging(LogSink::File(state_dir.join(LOG_FILE_NAME)), "info");
            }
            run_tui(options)
        }
        CliInvocation::Command(command) => {
            let default_filter = match command {
                CliCommand::Bridge(_) => "info",
                _ => "warn",
            };
            let _ = init_logging(LogSink::Stderr, default_filter);
            crate::cli::run(command)?;
            Ok(())
        }
    }
}

fn print_help() {
    let text = format!(
        "{name} - browse a pokédex and mirror it to a serial display device\n\nUSAGE:\n  {name} [LINK FLAGS]                 Start the terminal browser\n  {name} list [--data PATH]           Print the catalog\n  {name} fetch [--to N] [--out PATH] [--base-url URL]\n                                      Download entries 1..N from PokeAPI (default: 151, max: 1025)\n  {name} bridge [LINK FLAGS]          Run the device link without a UI (Ctrl+C to stop)\n  {name} --help | --version\n\nLINK FLAGS:\n  --data PATH      Catalog file (default: ./data/pokedex_gen1.json, else ~/.dexlink/pokedex_gen1.json)\n  --port PATH      Serial device (default: auto-detect /dev/ttyACM*, /dev/ttyUSB*, /dev/cu.usb*)\n  --tcp HOST:PORT  Serial-over-TCP bridge instead of a local device\n  --baud N         Serial speed (default: 115200)\n  --connect        Connect on startup\n\nDEVICE PROTOCOL:\n  in:  PREV | NEXT | CRY | RAND   (one per line)\n  out: SHOW <3-digit id> <NAME>\n\nOUTPUT:\n  list:   #id<TAB>NAME<TAB>types\n  bridge: #id NAME   (one line per selection change)\n\nENV:\n  DEXLINK_DATA          Catalog file\n  DEXLINK_PORT          Serial device\n  DEXLINK_BAUD          Serial speed\n  DEXLINK_AUDIO_PLAYER  Cry player command (default: ffplay, mpv or cvlc on PATH)\n  DEXLINK_LOG           Log filter (browser logs to ~/.dexlink/dexlink.log)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

fn run_tui(options: LinkOptions) -> Result<(), MainError> {
    let path = resolve_dex_path(options.data.as_deref()).map_err(app::AppError::from)?;
    let records = load_dex(&path).map_err(app::AppError::from)?;
    let config = options.port_config()?;
    let target = options.target();
    tracing::info!(path = %path.display(), entries = records.len(), %target, "starting browser");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(app::AppError::from)?;
    let _runtime_guard = runtime.enter();

    let (link, mut link_signals) =
        spawn_link_session(DeviceTransport::new(target.clone()), config);
    let (catalog_tx, catalog_rx) = channel::<CatalogSignal>();
    let mut catalog = Catalog::new(records);
    catalog.subscribe(Box::new(OutboundNotifier::new(link.clone())));
    catalog.subscribe(Box::new(SelectionNotifier::new(catalog_tx)));
    let mut player = CommandCryPlayer::detect();

    let mut model =
        AppModel::new(catalog.len(), target.to_string()).with_selection(catalog.current_index());
    if options.connect {
        link.connect();
    }

    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let mut controller = Controller {
        catalog: &mut catalog,
        link: &link,
        link_signals: &mut link_signals,
        catalog_signals: &catalog_rx,
        player: &mut player,
    };
    let result = run(&mut terminal, &mut model, &mut controller);
    restore_terminal(&mut terminal)?;
    link.disconnect();
    Ok(result?)
}

/// Everything the browser loop drives besides the view model.
struct Controller<'a> {
    catalog: &'a mut Catalog,
    link: &'a LinkHandle,
    link_signals: &'a mut UnboundedReceiver<LinkSignal>,
    catalog_signals: &'a Receiver<CatalogSignal>,
    player: &'a mut dyn CryPlayer,
}

impl Controller<'_> {
    fn drain_signals(&mut self, model: &mut AppModel) {
        while let Ok(signal) = self.link_signals.try_recv() {
            match signal {
                LinkSignal::State(state) => *model = model.with_link_state(state),
                LinkSignal::Line(line) => {
                    if let Some(command) = dispatch_line(&line, self.catalog, self.player) {
                        tracing::debug!(command = command.token(), "device command applied");
                    }
                }
                LinkSignal::Error(message) => *model = model.with_link_error(&message),
            }
        }

        while let Ok(signal) = self.catalog_signals.try_recv() {
            match signal {
                CatalogSignal::CurrentChanged { index } => *model = model.with_selection(index),
            }
        }
    }

    /// Returns `true` when the browser should exit.
    fn apply(&mut self, command: AppCommand, model: &mut AppModel) -> bool {
        match command {
            AppCommand::None => {}
            AppCommand::Quit => return true,
            AppCommand::Navigate(Navigation::Next) => self.catalog.advance(),
            AppCommand::Navigate(Navigation::Prev) => self.catalog.retreat(),
            AppCommand::Navigate(Navigation::Random) => self.catalog.select_random(),
            AppCommand::SelectIndex(index) => {
                if let Err(error) = self.catalog.select_index(index) {
                    *model = model.with_notice(Some(error.to_string()));
                }
            }
            AppCommand::PlayCry => {
                if let Some(record) = self.catalog.current() {
                    self.player.play(&record.cry);
                }
            }
            AppCommand::Connect => self.link.connect(),
            AppCommand::Disconnect => self.link.disconnect(),
        }
        false
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let _ = stdout.execute(EnableMouseCapture);
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    let _ = execute!(terminal.backend_mut(), DisableMouseCapture);
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel,
    controller: &mut Controller<'_>,
) -> Result<(), app::AppError> {
    loop {
        controller.drain_signals(model);

        terminal.draw(|frame| ui::render(frame, model, controller.catalog.records()))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        let app_event = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
            Event::Mouse(mouse) => AppEvent::Mouse(mouse),
            Event::Resize(width, height) => {
                *model = model.with_terminal_size(width, height);
                continue;
            }
            _ => continue,
        };

        let (next, command) = app::update(model.clone(), app_event);
        *model = next;
        if controller.apply(command, model) {
            return Ok(());
        }
    }
}
