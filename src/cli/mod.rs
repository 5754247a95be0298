use crate::domain::Record;
use crate::infra::{
    DEFAULT_API_BASE, DEFAULT_BAUD_RATE, DexFetcher, GEN1_FIRST_ID, GEN1_LAST_ID, LinkTarget,
    MAX_DEX_ID, PortConfig, default_fetch_output, load_dex, resolve_dex_path, save_dex,
};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui(LinkOptions),
    Command(CliCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    List {
        data: Option<PathBuf>,
    },
    Fetch {
        to: u32,
        out: PathBuf,
        base_url: String,
    },
    Bridge(LinkOptions),
}

/// Catalog location and device link settings shared by the browser and the bridge.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkOptions {
    pub data: Option<PathBuf>,
    pub port: Option<PathBuf>,
    pub tcp: Option<String>,
    pub baud: Option<u32>,
    pub connect: bool,
}

impl LinkOptions {
    /// `--tcp`, else `--port`, else `DEXLINK_PORT`, else auto-detect.
    pub fn target(&self) -> LinkTarget {
        self.target_with_env(std::env::var_os("DEXLINK_PORT"))
    }

    fn target_with_env(&self, env_port: Option<OsString>) -> LinkTarget {
        if let Some(addr) = &self.tcp {
            return LinkTarget::Tcp(addr.clone());
        }
        let port = self
            .port
            .clone()
            .or_else(|| env_port.filter(|value| !value.is_empty()).map(PathBuf::from));
        LinkTarget::Serial(port)
    }

    pub fn port_config(&self) -> Result<PortConfig, CliParseError> {
        self.port_config_with_env(std::env::var("DEXLINK_BAUD").ok())
    }

    fn port_config_with_env(&self, env_baud: Option<String>) -> Result<PortConfig, CliParseError> {
        let baud_rate = match (self.baud, env_baud) {
            (Some(baud), _) => baud,
            (None, Some(raw)) if !raw.trim().is_empty() => parse_u32_flag("DEXLINK_BAUD", raw.trim())?,
            (None, _) => DEFAULT_BAUD_RATE,
        };
        Ok(PortConfig { baud_rate })
    }
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("{0} and {1} cannot be used together")]
    ConflictingFlags(String, String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1).peekable();
    let mut global = LinkOptions::default();
    while let Some(arg) = iter.peek() {
        if arg.as_str() == "--" {
            let _ = iter.next();
            break;
        }
        if !arg.starts_with('-') {
            break;
        }
        let Some(arg) = iter.next() else {
            break;
        };
        if !parse_link_flag(arg, &mut iter, &mut global)? {
            return Err(CliParseError::UnknownFlag(arg.to_string()));
        }
    }

    let Some(subcommand) = iter.next() else {
        check_link_options(&global)?;
        return Ok(CliInvocation::Tui(global));
    };

    match subcommand.as_str() {
        "list" => {
            let mut data = global.data;
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--data" | "-d" => {
                        data = Some(PathBuf::from(flag_value("--data", &mut iter)?));
                    }
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }
            Ok(CliInvocation::Command(CliCommand::List { data }))
        }
        "fetch" => {
            let mut to = GEN1_LAST_ID;
            let mut out: Option<PathBuf> = None;
            let mut base_url = DEFAULT_API_BASE.to_string();

            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--to" => to = parse_u32_flag("--to", flag_value("--to", &mut iter)?)?,
                    "--out" | "-o" => {
                        out = Some(PathBuf::from(flag_value("--out", &mut iter)?));
                    }
                    "--base-url" => base_url = flag_value("--base-url", &mut iter)?.to_string(),
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }

            if to > MAX_DEX_ID {
                return Err(CliParseError::InvalidFlagValue {
                    flag: "--to".to_string(),
                    value: to.to_string(),
                });
            }

            Ok(CliInvocation::Command(CliCommand::Fetch {
                to,
                out: out.unwrap_or_else(default_fetch_output),
                base_url,
            }))
        }
        "bridge" => {
            let mut options = global;
            while let Some(arg) = iter.next() {
                if parse_link_flag(arg, &mut iter, &mut options)? {
                    continue;
                }
                if arg.starts_with('-') {
                    return Err(CliParseError::UnknownFlag(arg.to_string()));
                }
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
            check_link_options(&options)?;
            options.connect = true;
            Ok(CliInvocation::Command(CliCommand::Bridge(options)))
        }
        other => Err(CliParseError::UnknownSubcommand(other.to_string())),
    }
}

/// Consumes one link flag (and its value). Returns `false` when `arg` is not one.
fn parse_link_flag<'a>(
    arg: &str,
    iter: &mut impl Iterator<Item = &'a String>,
    options: &mut LinkOptions,
) -> Result<bool, CliParseError> {
    match arg {
        "--data" | "-d" => options.data = Some(PathBuf::from(flag_value("--data", iter)?)),
        "--port" | "-p" => options.port = Some(PathBuf::from(flag_value("--port", iter)?)),
        "--tcp" => options.tcp = Some(flag_value("--tcp", iter)?.to_string()),
        "--baud" | "-b" => {
            let value = flag_value("--baud", iter)?;
            options.baud = Some(parse_u32_flag("--baud", value)?);
        }
        "--connect" => options.connect = true,
        _ => return Ok(false),
    }
    Ok(true)
}

fn check_link_options(options: &LinkOptions) -> Result<(), CliParseError> {
    if options.port.is_some() && options.tcp.is_some() {
        return Err(CliParseError::ConflictingFlags(
            "--port".to_string(),
            "--tcp".to_string(),
        ));
    }
    Ok(())
}

fn flag_value<'a>(
    flag: &str,
    iter: &mut impl Iterator<Item = &'a String>,
) -> Result<&'a str, CliParseError> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| CliParseError::MissingFlagValue(flag.to_string()))
}

fn parse_u32_flag(flag: &str, value: &str) -> Result<u32, CliParseError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    ResolveStateDir(#[from] crate::infra::ResolveStateDirError),

    #[error("{0}\nHint: run `dexlink fetch` to download the catalog.")]
    LoadDex(#[from] crate::infra::LoadDexError),

    #[error(transparent)]
    Fetch(#[from] crate::infra::FetchDexError),

    #[error(transparent)]
    SaveDex(#[from] crate::infra::SaveDexError),

    #[error(transparent)]
    Parse(#[from] CliParseError),

    #[error(transparent)]
    Bridge(#[from] crate::bridge::BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub fn run(command: CliCommand) -> Result<(), CliRunError> {
    match command {
        CliCommand::List { data } => {
            let path = resolve_dex_path(data.as_deref())?;
            let records = load_dex(&path)?;
            let stdout = io::stdout();
            let mut out = io::BufWriter::new(stdout.lock());
            for record in &records {
                if !write_line(&mut out, &list_line(record))? {
                    return Ok(());
                }
            }
            match out.flush() {
                Err(error) if error.kind() != io::ErrorKind::BrokenPipe => Err(error.into()),
                _ => Ok(()),
            }
        }
        CliCommand::Fetch {
            to,
            out,
            base_url,
        } => fetch_catalog(to, &out, &base_url),
        CliCommand::Bridge(options) => {
            let config = options.port_config()?;
            crate::bridge::run_bridge(&options, config)?;
            Ok(())
        }
    }
}

fn fetch_catalog(to: u32, out: &Path, base_url: &str) -> Result<(), CliRunError> {
    let fetcher = DexFetcher::new(base_url);
    let stderr = io::stderr();
    let mut err = stderr.lock();

    let mut records = Vec::new();
    for id in GEN1_FIRST_ID..=to {
        let _ = writeln!(err, "Fetching {id}...");
        let record = fetcher.fetch_record(id)?;
        tracing::debug!(id, name = %record.name, "fetched entry");
        records.push(record);
    }

    save_dex(out, &records)?;
    let _ = writeln!(err, "Wrote {} entries to {}", records.len(), out.display());
    Ok(())
}

pub fn list_line(record: &Record) -> String {
    format!(
        "{}\t{}\t{}",
        record.dex_number(),
        record.display_name(),
        record.types.join("/")
    )
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}
