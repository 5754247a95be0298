use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub const LOG_FILE_NAME: &str = "dexlink.log";

#[derive(Clone, Debug)]
pub enum LogSink {
    /// Plain-text log file; used while the terminal UI owns the screen.
    File(PathBuf),
    Stderr,
}

/// Installs the global subscriber. Filter comes from `DEXLINK_LOG`, falling back
/// to `default_filter`. Later calls are no-ops.
pub fn init_logging(sink: LogSink, default_filter: &str) -> io::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_env("DEXLINK_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        match sink {
            LogSink::File(path) => match open_log_file(&path) {
                Ok(file) => {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(
                            fmt::layer()
                                .with_ansi(false)
                                .with_target(false)
                                .with_writer(Mutex::new(file)),
                        )
                        .init();
                }
                Err(error) => result = Err(error),
            },
            LogSink::Stderr => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_target(false).with_writer(io::stderr))
                    .init();
            }
        }
    });
    result
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
