use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Best-effort cry playback. Implementations never report failures to the caller.
pub trait CryPlayer {
    fn play(&mut self, locator: &str);
}

/// Plays cries through an external command-line player, one at a time.
#[derive(Debug)]
pub struct CommandCryPlayer {
    program: Option<PlayerCommand>,
    current: Option<Child>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

const KNOWN_PLAYERS: [(&str, &[&str]); 3] = [
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("mpv", &["--no-video", "--really-quiet"]),
    ("cvlc", &["--play-and-exit", "--quiet"]),
];

impl CommandCryPlayer {
    pub fn new(program: Option<PlayerCommand>) -> Self {
        Self {
            program,
            current: None,
        }
    }

    /// `DEXLINK_AUDIO_PLAYER`, else the first known player found on `PATH`.
    pub fn detect() -> Self {
        let from_env = std::env::var("DEXLINK_AUDIO_PLAYER")
            .ok()
            .and_then(|raw| parse_player_command(&raw));
        let program = from_env.or_else(|| {
            let path = std::env::var_os("PATH")?;
            KNOWN_PLAYERS.iter().find_map(|(name, args)| {
                let program = find_in_path(name, &path)?;
                Some(PlayerCommand {
                    program,
                    args: args.iter().map(|arg| (*arg).to_string()).collect(),
                })
            })
        });
        if program.is_none() {
            tracing::info!("no audio player found; cries are disabled");
        }
        Self::new(program)
    }

    fn stop_current(&mut self) {
        if let Some(mut child) = self.current.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl CryPlayer for CommandCryPlayer {
    fn play(&mut self, locator: &str) {
        if locator.trim().is_empty() {
            return;
        }
        // Restart from the beginning rather than overlapping.
        self.stop_current();

        let Some(player) = &self.program else {
            return;
        };

        let spawned = Command::new(&player.program)
            .args(&player.args)
            .arg(locator)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => self.current = Some(child),
            Err(error) => {
                tracing::warn!(
                    player = %player.program.display(),
                    %error,
                    "failed to start audio player"
                );
            }
        }
    }
}

impl Drop for CommandCryPlayer {
    fn drop(&mut self) {
        self.stop_current();
    }
}

pub fn parse_player_command(raw: &str) -> Option<PlayerCommand> {
    let mut parts = raw.split_whitespace();
    let program = parts.next()?;
    Some(PlayerCommand {
        program: PathBuf::from(program),
        args: parts.map(ToOwned::to_owned).collect(),
    })
}

fn find_in_path(name: &str, path: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_and_args() {
        let parsed = parse_player_command("  mpv --no-video  --volume=50 ").expect("command");
        assert_eq!(parsed.program, PathBuf::from("mpv"));
        assert_eq!(parsed.args, vec!["--no-video", "--volume=50"]);
        assert!(parse_player_command("   ").is_none());
    }

    #[test]
    fn missing_player_is_silent() {
        let mut player = CommandCryPlayer::new(None);
        player.play("https://example.invalid/25.ogg");
        assert!(player.current.is_none());
    }

    #[test]
    fn spawn_failure_is_swallowed() {
        let mut player = CommandCryPlayer::new(Some(PlayerCommand {
            program: PathBuf::from("/nonexistent/dexlink-player"),
            args: Vec::new(),
        }));
        player.play("https://example.invalid/25.ogg");
        assert!(player.current.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn replaying_stops_the_previous_child() {
        let mut player = CommandCryPlayer::new(Some(PlayerCommand {
            program: PathBuf::from("sleep"),
            args: Vec::new(),
        }));
        player.play("30");
        let first = player.current.as_ref().map(Child::id).expect("first child");
        player.play("30");
        let second = player.current.as_ref().map(Child::id).expect("second child");
        assert_ne!(first, second);
    }
}
