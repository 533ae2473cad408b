use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hound::WavReader;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::SessionError;

/// Plays back a sealed recording.
///
/// The rodio output stream is not `Send`, so it lives on a dedicated
/// thread; startup failures (missing file, no output device) are
/// reported back before `play` returns.
pub struct PlaybackController {
    path: PathBuf,
    playing: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl PlaybackController {
    /// Open the recording at `path` and start playing it.
    pub async fn play(path: PathBuf) -> Result<Self, SessionError> {
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?;

        let duration_secs =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);
        info!(
            "playing {} ({:.1}s, {}Hz, {}ch)",
            path.display(),
            duration_secs,
            spec.sample_rate,
            spec.channels
        );

        let playing = Arc::new(AtomicBool::new(true));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), SessionError>>();

        let playing_flag = Arc::clone(&playing);
        let stop_flag = Arc::clone(&stop_requested);
        std::thread::spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(out) => out,
                Err(e) => {
                    playing_flag.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(e) => {
                    playing_flag.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };

            sink.append(SamplesBuffer::new(spec.channels, spec.sample_rate, samples));
            let _ = ready_tx.send(Ok(()));

            while !sink.empty() {
                if stop_flag.load(Ordering::SeqCst) {
                    sink.stop();
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            playing_flag.store(false, Ordering::SeqCst);
        });

        ready_rx
            .await
            .map_err(|_| SessionError::DeviceUnavailable("playback thread exited".to_string()))??;

        Ok(Self {
            path,
            playing,
            stop_requested,
        })
    }

    /// Whether the sink is still producing sound.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Halt playback. Safe to call after playback already ended.
    pub fn stop(&self) {
        if self.playing.load(Ordering::SeqCst) {
            warn!("stopping playback of {}", self.path.display());
        }
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}
