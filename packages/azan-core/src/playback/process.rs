//! Playback through external player executables.
//!
//! Each [`ProcessBackend`] wraps one player program. A backend whose program is
//! not installed simply fails to spawn, which moves the controller on to the
//! next one.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::{AudioBackend, PlaybackError, PlaybackResult, SessionHandle, Termination};

/// Plays the asset by spawning a player program.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
    args: Vec<String>,
}

impl ProcessBackend {
    /// A backend running `program` with `args` followed by the asset path.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// A backend for a known player name, using its headless/exit-at-end flags.
    ///
    /// Unknown names get no extra flags.
    pub fn for_player(player: &str) -> Self {
        let args: &[&str] = match player {
            "cvlc" | "vlc" => &["--intf", "dummy", "--play-and-exit"],
            "mpv" => &["--no-terminal", "--really-quiet"],
            "ffplay" => &["-nodisp", "-autoexit", "-loglevel", "quiet"],
            _ => &[],
        };
        Self::new(player, args.iter().map(|a| a.to_string()).collect())
    }
}

#[async_trait]
impl AudioBackend for ProcessBackend {
    fn name(&self) -> &str {
        &self.program
    }

    async fn start(&self, asset: &Path) -> PlaybackResult<Box<dyn SessionHandle>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                backend: self.program.clone(),
                source,
            })?;
        log::debug!(
            "[Playback] Spawned {} (pid {:?})",
            self.program,
            child.id()
        );
        Ok(Box::new(ProcessSession { child }))
    }
}

/// A running player process.
struct ProcessSession {
    child: Child,
}

impl ProcessSession {
    /// Asks the process to exit. Returns `false` if no signal could be sent.
    #[cfg(unix)]
    fn request_exit(&self) -> bool {
        let Some(pid) = self.child.id() else {
            return false;
        };
        // SAFETY: kill(2) has no memory-safety preconditions; pid came from our own child.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        rc == 0
    }

    #[cfg(not(unix))]
    fn request_exit(&self) -> bool {
        false
    }
}

#[async_trait]
impl SessionHandle for ProcessSession {
    fn has_finished(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    async fn stop(&mut self, grace: Duration) -> PlaybackResult<Termination> {
        if self.request_exit() {
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(_)) => return Ok(Termination::Graceful),
                Ok(Err(e)) => return Err(PlaybackError::Terminate(e)),
                Err(_) => {}
            }
        }

        // kill() sends SIGKILL and reaps the child.
        self.child.kill().await.map_err(PlaybackError::Terminate)?;
        Ok(Termination::Forced)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ProcessBackend {
        // The asset path lands in $0 and is ignored by the script.
        ProcessBackend::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn known_players_get_headless_flags() {
        let vlc = ProcessBackend::for_player("cvlc");
        assert!(vlc.args.contains(&"--play-and-exit".to_string()));
        let ffplay = ProcessBackend::for_player("ffplay");
        assert!(ffplay.args.contains(&"-autoexit".to_string()));
        assert!(ProcessBackend::for_player("paplay").args.is_empty());
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let backend = ProcessBackend::new("azan-test-no-such-player", Vec::new());
        let err = backend.start(Path::new("azan.mp3")).await.err().unwrap();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
    }

    #[tokio::test]
    async fn cooperative_process_stops_gracefully() {
        let mut session = shell("exec sleep 30")
            .start(Path::new("azan.mp3"))
            .await
            .unwrap();
        assert!(!session.has_finished());

        let termination = session.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(termination, Termination::Graceful);
    }

    #[tokio::test]
    async fn process_ignoring_sigterm_is_killed_after_grace() {
        let mut session = shell("trap '' TERM; exec sleep 30")
            .start(Path::new("azan.mp3"))
            .await
            .unwrap();
        // Let the shell install its trap before signalling.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let termination = session.stop(Duration::from_millis(200)).await.unwrap();

        assert_eq!(termination, Termination::Forced);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn finished_process_is_detected() {
        let mut session = shell("exit 0").start(Path::new("azan.mp3")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(session.has_finished());
    }
}
