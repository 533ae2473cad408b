use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hound::{WavSpec, WavWriter};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::frame::{AudioFrame, CaptureFormat};
use super::source::{FrameSubscription, SubscriptionGuard};
use crate::error::SessionError;

/// Writes the frame stream to one WAV file.
///
/// Frames are appended in arrival order while un-paused. `pause` stops
/// writing without closing the handle, `resume` continues appending to
/// the same handle, and `stop` drains the writer and seals the file.
/// If the file cannot be created, `start` fails and no controller
/// exists, so nothing reports itself as recording.
pub struct CaptureController {
    path: PathBuf,
    paused: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
    guard: SubscriptionGuard,
    writer_task: Option<JoinHandle<Result<u64, SessionError>>>,
}

impl CaptureController {
    /// Open the WAV file at `path` and start consuming `subscription`.
    pub fn start(
        subscription: FrameSubscription,
        format: CaptureFormat,
        path: PathBuf,
    ) -> Result<Self, SessionError> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = WavWriter::create(&path, spec)?;

        info!("recording audio to {}", path.display());

        let paused = Arc::new(AtomicBool::new(false));
        let frames_written = Arc::new(AtomicU64::new(0));
        let guard = subscription.guard();

        let writer_task = tokio::spawn(write_frames(
            subscription,
            writer,
            Arc::clone(&paused),
            Arc::clone(&frames_written),
        ));

        Ok(Self {
            path,
            paused,
            frames_written,
            guard,
            writer_task: Some(writer_task),
        })
    }

    /// Suspend writing. The file handle stays open and unsealed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        debug!("capture paused at {} frames", self.frames_written());
    }

    /// Continue appending to the same file.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        debug!("capture resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Frames written so far (pauses excluded).
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Release the frame subscription, drain the writer, and seal the
    /// file. Returns the number of frames written.
    pub async fn stop(mut self) -> Result<u64, SessionError> {
        self.guard.release();

        let Some(task) = self.writer_task.take() else {
            return Ok(self.frames_written());
        };
        let written = task
            .await
            .map_err(|e| SessionError::Io(format!("capture writer task panicked: {e}")))??;

        info!("recording sealed: {} ({} frames)", self.path.display(), written);
        Ok(written)
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        // A dropped controller stops consuming frames; the writer task
        // drains what it has and seals the file in the background.
        self.guard.release();
    }
}

async fn write_frames(
    mut subscription: FrameSubscription,
    mut writer: WavWriter<BufWriter<File>>,
    paused: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
) -> Result<u64, SessionError> {
    let mut written: u64 = 0;

    while let Some(frame) = subscription.recv().await {
        if paused.load(Ordering::SeqCst) {
            continue;
        }

        write_frame(&mut writer, &frame)?;
        written += 1;
        frames_written.store(written, Ordering::SeqCst);
    }

    // Subscription released or source gone: flush and seal the header.
    writer.finalize()?;
    Ok(written)
}

fn write_frame(
    writer: &mut WavWriter<BufWriter<File>>,
    frame: &AudioFrame,
) -> Result<(), SessionError> {
    for &sample in &frame.samples {
        writer.write_sample(sample)?;
    }
    Ok(())
}
