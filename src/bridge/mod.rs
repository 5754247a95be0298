use crate::app::dispatch_line;
use crate::cli::LinkOptions;
use crate::domain::{Catalog, CatalogListener, Record};
use crate::infra::{
    CommandCryPlayer, CryPlayer, DeviceTransport, LinkSignal, LinkState, OutboundNotifier,
    PortConfig, Transport, load_dex, resolve_dex_path, spawn_link_session,
};
use rand_core::{OsRng, RngCore};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    ResolveStateDir(#[from] crate::infra::ResolveStateDirError),

    #[error("{0}\nHint: run `dexlink fetch` to download the catalog.")]
    LoadDex(#[from] crate::infra::LoadDexError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Runs the link without a terminal UI until Ctrl+C.
pub fn run_bridge(options: &LinkOptions, config: PortConfig) -> Result<(), BridgeError> {
    let path = resolve_dex_path(options.data.as_deref())?;
    let records = load_dex(&path)?;
    tracing::info!(path = %path.display(), entries = records.len(), "catalog loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(BridgeError::Runtime)?;

    let target = options.target();
    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(true);
        });

        let mut catalog = Catalog::new(records);
        catalog.subscribe(Box::new(SelectionPrinter));
        let mut player = CommandCryPlayer::detect();

        tracing::info!(%target, "starting bridge");
        bridge_loop(
            catalog,
            DeviceTransport::new(target),
            config,
            spawn_stdin_reader(),
            &mut player,
            shutdown_rx,
        )
        .await;
    });
    Ok(())
}

/// Prints `#025 PIKACHU` for every selection change.
struct SelectionPrinter;

impl CatalogListener for SelectionPrinter {
    fn current_changed(&mut self, _index: usize, record: &Record) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", selection_line(record));
        let _ = out.flush();
    }
}

fn selection_line(record: &Record) -> String {
    format!("{} {}", record.dex_number(), record.display_name())
}

// Blocking stdin lives on its own thread so runtime shutdown never waits on it.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn bridge_loop<T: Transport>(
    mut catalog: Catalog,
    transport: T,
    config: PortConfig,
    mut input: mpsc::UnboundedReceiver<String>,
    player: &mut dyn CryPlayer,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (link, mut signals) = spawn_link_session(transport, config);
    catalog.subscribe(Box::new(OutboundNotifier::new(link.clone())));
    if let Some(record) = catalog.current() {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", selection_line(record));
    }

    let mut backoff = Backoff::new();
    let reconnect = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(reconnect);
    let mut reconnect_pending = false;
    let mut input_open = true;

    link.connect();

    loop {
        tokio::select! {
            biased;
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            signal = signals.recv() => {
                let Some(signal) = signal else {
                    break;
                };
                match signal {
                    LinkSignal::Line(line) => {
                        dispatch_line(&line, &mut catalog, player);
                    }
                    LinkSignal::State(LinkState::Connected) => {
                        backoff.reset();
                        reconnect_pending = false;
                    }
                    LinkSignal::State(LinkState::Disconnected) => {
                        let delay = backoff.next_delay();
                        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting");
                        reconnect.as_mut().reset(Instant::now() + delay);
                        reconnect_pending = true;
                    }
                    LinkSignal::State(_) => {}
                    LinkSignal::Error(message) => {
                        tracing::warn!(%message, "link error");
                    }
                }
            }
            line = input.recv(), if input_open => {
                match line {
                    Some(line) => {
                        dispatch_line(line.trim(), &mut catalog, player);
                    }
                    None => {
                        tracing::debug!("local input closed");
                        input_open = false;
                    }
                }
            }
            () = &mut reconnect, if reconnect_pending => {
                reconnect_pending = false;
                link.connect();
            }
        }
    }

    link.disconnect();
}

/// Exponential reconnect delay with up to 25% jitter.
#[derive(Debug)]
struct Backoff {
    next_ms: u64,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next_ms: INITIAL_BACKOFF_MS,
        }
    }

    fn reset(&mut self) {
        self.next_ms = INITIAL_BACKOFF_MS;
    }

    fn next_delay(&mut self) -> Duration {
        let sleep_ms = self.next_ms.saturating_add(jitter_ms(self.next_ms / 4));
        self.next_ms = self.next_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
        Duration::from_millis(sleep_ms)
    }
}

fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    OsRng.next_u64() % (max_ms + 1)
}
