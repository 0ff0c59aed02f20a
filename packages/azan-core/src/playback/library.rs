//! In-process playback through `rodio`.
//!
//! The output stream is not `Send`, so each session owns a dedicated thread that
//! opens the default device, decodes the asset and blocks until the sink drains.
//! The async side only holds the sink, which is enough to stop it.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;

use super::{AudioBackend, PlaybackError, PlaybackResult, SessionHandle, Termination};
use crate::constants::LIBRARY_PLAYER;

/// Decodes and plays the asset on the default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioBackend;

impl RodioBackend {
    fn spawn_error(source: io::Error) -> PlaybackError {
        PlaybackError::Spawn {
            backend: LIBRARY_PLAYER.to_string(),
            source,
        }
    }
}

/// Opens the asset and the default device. Decoding comes first so a bad file is
/// reported the same way with or without a sound card.
fn open_sink(asset: &Path) -> io::Result<(OutputStream, Sink)> {
    let file = File::open(asset)?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let (stream, handle) = OutputStream::try_default()
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| io::Error::other(e.to_string()))?;
    sink.append(source);
    Ok((stream, sink))
}

#[async_trait]
impl AudioBackend for RodioBackend {
    fn name(&self) -> &str {
        LIBRARY_PLAYER
    }

    async fn start(&self, asset: &Path) -> PlaybackResult<Box<dyn SessionHandle>> {
        let asset: PathBuf = asset.to_path_buf();
        let (ready_tx, ready_rx) = oneshot::channel::<io::Result<Arc<Sink>>>();
        let (done_tx, done_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("azan-playback".into())
            .spawn(move || {
                match open_sink(&asset) {
                    Ok((stream, sink)) => {
                        let sink = Arc::new(sink);
                        if ready_tx.send(Ok(Arc::clone(&sink))).is_ok() {
                            sink.sleep_until_end();
                        }
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(Self::spawn_error)?;

        let sink = ready_rx
            .await
            .map_err(|_| Self::spawn_error(io::Error::other("playback thread exited early")))?
            .map_err(Self::spawn_error)?;

        Ok(Box::new(RodioSession {
            sink,
            done: done_rx,
        }))
    }
}

struct RodioSession {
    sink: Arc<Sink>,
    /// Fires when the playback thread has released the device.
    done: oneshot::Receiver<()>,
}

#[async_trait]
impl SessionHandle for RodioSession {
    fn has_finished(&mut self) -> bool {
        self.sink.empty()
    }

    /// A thread that misses the grace period is left to exit on its own; the sink
    /// is already stopped, so it produces no more sound.
    async fn stop(&mut self, grace: Duration) -> PlaybackResult<Termination> {
        self.sink.stop();
        match tokio::time::timeout(grace, &mut self.done).await {
            Ok(_) => Ok(Termination::Graceful),
            Err(_) => Ok(Termination::Forced),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reports_its_player_name() {
        assert_eq!(RodioBackend.name(), "rodio");
    }

    #[tokio::test]
    async fn missing_file_fails_to_start() {
        let err = RodioBackend
            .start(Path::new("/nonexistent/azan.mp3"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PlaybackError::Spawn { ref backend, .. } if backend == "rodio"));
    }

    #[tokio::test]
    async fn undecodable_file_fails_to_start() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not audio").unwrap();

        let err = RodioBackend.start(file.path()).await.err().unwrap();
        match err {
            PlaybackError::Spawn { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
