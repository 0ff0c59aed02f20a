//! Playback lifecycle.
//!
//! [`PlaybackController`] owns at most one live session. Starting a session always
//! terminates the previous one first, and stopping is idempotent and bounded:
//! a session gets a grace period to exit and is then killed.
//!
//! Backends are tried in order and the first one that starts wins. Backend
//! failures are logged per backend and reported to the caller as a
//! [`PlaybackError`]; they never panic or abort the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "rodio")]
pub mod library;
pub mod process;

#[cfg(feature = "rodio")]
pub use library::RodioBackend;
pub use process::ProcessBackend;

use crate::constants::LIBRARY_PLAYER;

/// Errors that can occur while starting or stopping playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The configured audio file does not exist.
    #[error("audio file not found: {0}")]
    AssetMissing(String),

    /// A backend could not start its player.
    #[error("{backend} failed to start: {source}")]
    Spawn {
        backend: String,
        #[source]
        source: std::io::Error,
    },

    /// Every configured backend failed to start.
    #[error("no playback backend available")]
    NoBackendAvailable,

    /// The session could not be terminated.
    #[error("failed to terminate player: {0}")]
    Terminate(#[source] std::io::Error),
}

/// Result alias for playback operations.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// How a session ended when it was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The session had already finished on its own.
    AlreadyExited,
    /// The session exited within the grace period.
    Graceful,
    /// The session had to be killed.
    Forced,
}

/// A running playback session.
#[async_trait]
pub trait SessionHandle: Send {
    /// Whether the session has already finished on its own.
    fn has_finished(&mut self) -> bool;

    /// Terminates the session, waiting at most `grace` before forcing it.
    async fn stop(&mut self, grace: Duration) -> PlaybackResult<Termination>;
}

/// A mechanism able to play an audio file.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Starts playing `asset` and returns a handle that can stop it.
    async fn start(&self, asset: &Path) -> PlaybackResult<Box<dyn SessionHandle>>;
}

/// Builds backends for `players`, in order.
///
/// [`LIBRARY_PLAYER`] selects in-process decoding; builds without the `rodio`
/// feature skip it. Every other name is a player executable.
pub fn backends_for_players(players: &[String]) -> Vec<Arc<dyn AudioBackend>> {
    players
        .iter()
        .filter_map(|player| {
            if player == LIBRARY_PLAYER {
                library_backend()
            } else {
                Some(Arc::new(ProcessBackend::for_player(player)) as Arc<dyn AudioBackend>)
            }
        })
        .collect()
}

#[cfg(feature = "rodio")]
fn library_backend() -> Option<Arc<dyn AudioBackend>> {
    Some(Arc::new(RodioBackend))
}

#[cfg(not(feature = "rodio"))]
fn library_backend() -> Option<Arc<dyn AudioBackend>> {
    log::debug!("[Playback] Built without rodio support, skipping the in-process player");
    None
}

struct ActiveSession {
    backend: String,
    handle: Box<dyn SessionHandle>,
}

/// Owns the single active playback session.
pub struct PlaybackController {
    backends: Vec<Arc<dyn AudioBackend>>,
    asset: PathBuf,
    stop_grace: Duration,
    session: Option<ActiveSession>,
}

impl PlaybackController {
    /// Creates a controller.
    ///
    /// # Arguments
    /// * `backends` - Backends in preference order
    /// * `asset` - Audio file played on every start
    /// * `stop_grace` - Bounded wait before a stopping session is killed
    pub fn new(
        backends: Vec<Arc<dyn AudioBackend>>,
        asset: impl Into<PathBuf>,
        stop_grace: Duration,
    ) -> Self {
        Self {
            backends,
            asset: asset.into(),
            stop_grace,
            session: None,
        }
    }

    pub fn asset(&self) -> &Path {
        &self.asset
    }

    /// Whether a session handle is currently held.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Stops any active session, then starts a new one.
    ///
    /// Returns the name of the backend that started.
    pub async fn play(&mut self) -> PlaybackResult<String> {
        if let Err(e) = self.stop().await {
            log::warn!("[Playback] Previous session did not stop cleanly: {}", e);
        }

        if !self.asset.is_file() {
            return Err(PlaybackError::AssetMissing(self.asset.display().to_string()));
        }

        for backend in &self.backends {
            match backend.start(&self.asset).await {
                Ok(handle) => {
                    let name = backend.name().to_string();
                    log::info!(
                        "[Playback] Playing {} via {}",
                        self.asset.display(),
                        name
                    );
                    self.session = Some(ActiveSession {
                        backend: name.clone(),
                        handle,
                    });
                    return Ok(name);
                }
                Err(e) => {
                    log::warn!("[Playback] Backend {} unavailable: {}", backend.name(), e);
                }
            }
        }

        log::error!(
            "[Playback] No playback method available ({} backend(s) tried)",
            self.backends.len()
        );
        Err(PlaybackError::NoBackendAvailable)
    }

    /// Stops the active session, if any.
    ///
    /// Returns `Ok(None)` when there was nothing to stop, so calling this twice
    /// is the same as calling it once. The session handle is released even when
    /// termination reports an error.
    pub async fn stop(&mut self) -> PlaybackResult<Option<Termination>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        if session.handle.has_finished() {
            log::debug!("[Playback] {} session had already finished", session.backend);
            return Ok(Some(Termination::AlreadyExited));
        }

        log::info!("[Playback] Stopping {} session", session.backend);
        let termination = session.handle.stop(self.stop_grace).await?;
        if termination == Termination::Forced {
            log::warn!(
                "[Playback] {} did not exit within {:?}, killed",
                session.backend,
                self.stop_grace
            );
        }
        Ok(Some(termination))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Test backends shared by the playback, scheduler and API tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Records every start and stop.
    #[derive(Default)]
    pub struct CountingBackend {
        pub starts: AtomicUsize,
        pub stops: Arc<AtomicUsize>,
        /// Set once a session is stopped; cleared on each start.
        pub live: Arc<AtomicBool>,
    }

    impl CountingBackend {
        pub fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }

        pub fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }
    }

    struct CountingSession {
        stops: Arc<AtomicUsize>,
        live: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SessionHandle for CountingSession {
        fn has_finished(&mut self) -> bool {
            false
        }

        async fn stop(&mut self, _grace: Duration) -> PlaybackResult<Termination> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.live.store(false, Ordering::SeqCst);
            Ok(Termination::Graceful)
        }
    }

    #[async_trait]
    impl AudioBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn start(&self, _asset: &Path) -> PlaybackResult<Box<dyn SessionHandle>> {
            assert!(
                !self.live.swap(true, Ordering::SeqCst),
                "session started while another was live"
            );
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                stops: Arc::clone(&self.stops),
                live: Arc::clone(&self.live),
            }))
        }
    }

    /// Always fails to start.
    #[derive(Default)]
    pub struct FailingBackend {
        pub attempts: AtomicUsize,
    }

    #[async_trait]
    impl AudioBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn start(&self, _asset: &Path) -> PlaybackResult<Box<dyn SessionHandle>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PlaybackError::Spawn {
                backend: "failing".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::mock::{CountingBackend, FailingBackend};
    use super::*;

    fn asset() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[tokio::test]
    async fn play_starts_first_working_backend() {
        let file = asset();
        let failing = Arc::new(FailingBackend::default());
        let counting = Arc::new(CountingBackend::default());
        let mut controller = PlaybackController::new(
            vec![
                failing.clone() as Arc<dyn AudioBackend>,
                counting.clone() as Arc<dyn AudioBackend>,
            ],
            file.path(),
            Duration::from_millis(100),
        );

        let backend = controller.play().await.unwrap();

        assert_eq!(backend, "counting");
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(counting.starts(), 1);
        assert!(controller.has_session());
    }

    #[tokio::test]
    async fn play_terminates_previous_session_first() {
        let file = asset();
        let counting = Arc::new(CountingBackend::default());
        let mut controller = PlaybackController::new(
            vec![counting.clone() as Arc<dyn AudioBackend>],
            file.path(),
            Duration::from_millis(100),
        );

        controller.play().await.unwrap();
        // CountingBackend panics if a start overlaps a live session.
        controller.play().await.unwrap();

        assert_eq!(counting.starts(), 2);
        assert_eq!(counting.stops(), 1);
    }

    #[tokio::test]
    async fn all_backends_failing_is_reported_not_fatal() {
        let file = asset();
        let mut controller = PlaybackController::new(
            vec![
                Arc::new(FailingBackend::default()) as Arc<dyn AudioBackend>,
                Arc::new(FailingBackend::default()) as Arc<dyn AudioBackend>,
            ],
            file.path(),
            Duration::from_millis(100),
        );

        let err = controller.play().await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoBackendAvailable));
        assert!(!controller.has_session());
    }

    #[tokio::test]
    async fn missing_asset_skips_backends() {
        let counting = Arc::new(CountingBackend::default());
        let mut controller = PlaybackController::new(
            vec![counting.clone() as Arc<dyn AudioBackend>],
            "/nonexistent/azan.mp3",
            Duration::from_millis(100),
        );

        let err = controller.play().await.unwrap_err();
        assert!(matches!(err, PlaybackError::AssetMissing(_)));
        assert_eq!(counting.starts(), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let file = asset();
        let counting = Arc::new(CountingBackend::default());
        let mut controller = PlaybackController::new(
            vec![counting.clone() as Arc<dyn AudioBackend>],
            file.path(),
            Duration::from_millis(100),
        );
        controller.play().await.unwrap();

        let first = controller.stop().await.unwrap();
        let second = controller.stop().await.unwrap();

        assert_eq!(first, Some(Termination::Graceful));
        assert_eq!(second, None);
        assert_eq!(counting.stops(), 1);
        assert!(!counting.is_live());
    }

    fn backend_names(players: &[&str]) -> Vec<String> {
        let players: Vec<String> = players.iter().map(|p| p.to_string()).collect();
        backends_for_players(&players)
            .iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    #[test]
    fn backends_keep_player_order() {
        assert_eq!(backend_names(&["mpv", "ffplay"]), vec!["mpv", "ffplay"]);
    }

    #[cfg(feature = "rodio")]
    #[test]
    fn library_player_comes_first_by_default() {
        let defaults = crate::constants::DEFAULT_PLAYERS;
        let names = backend_names(&defaults);
        assert_eq!(names.first().map(String::as_str), Some("rodio"));
        assert_eq!(names.len(), defaults.len());
    }

    #[cfg(not(feature = "rodio"))]
    #[test]
    fn library_player_is_skipped_without_rodio() {
        assert_eq!(
            backend_names(&crate::constants::DEFAULT_PLAYERS),
            vec!["cvlc", "vlc", "mpv", "ffplay", "play"]
        );
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let mut controller =
            PlaybackController::new(Vec::new(), "azan.mp3", Duration::from_millis(100));
        assert_eq!(controller.stop().await.unwrap(), None);
    }
}
