use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info};

use super::config::SessionConfig;
use super::state::SessionState;
use super::stats::SessionStats;
use crate::audio::{AudioFrameSource, CaptureController, PlaybackController};
use crate::consent::ConsentGate;
use crate::error::SessionError;
use crate::notify::NotificationSink;
use crate::recognize::{RecognitionEngine, RecognitionEvent, StreamingRecognizer, TaskEvent};
use crate::store::RecordingStore;
use crate::transcript::TranscriptAccumulator;

/// Everything guarded by the session's single mutual-exclusion domain.
/// Control calls and the recognition-event pump both lock this, so a
/// `stop` racing a late engine callback cannot corrupt the transcript
/// or resurrect a stale task.
struct Inner {
    state: SessionState,
    transcript: TranscriptAccumulator,
    recognizer: StreamingRecognizer,
    capture: Option<CaptureController>,
    playback: Option<PlaybackController>,
    current_task: Option<u64>,
    file_path: Option<PathBuf>,
    started_at: Option<DateTime<Utc>>,
    frames_written: u64,
}

/// A dictation session: records the live frame stream to a WAV file
/// while streaming the same frames to a speech-to-text engine, and
/// merges the engine's events into one growing transcript that
/// survives pause/resume cycles.
pub struct DictationSession {
    config: SessionConfig,
    inner: Arc<Mutex<Inner>>,
    source: Arc<dyn AudioFrameSource>,
    consent: Arc<dyn ConsentGate>,
    notifier: Arc<dyn NotificationSink>,
    store: RecordingStore,
    errors_tx: mpsc::UnboundedSender<SessionError>,
    errors_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<SessionError>>>,
    transcript_rx: watch::Receiver<String>,
}

impl DictationSession {
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn AudioFrameSource>,
        engine: Arc<dyn RecognitionEngine>,
        consent: Arc<dyn ConsentGate>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (watch_tx, transcript_rx) = watch::channel(String::new());

        let transcript = TranscriptAccumulator::new(move |text| {
            let _ = watch_tx.send(text.to_owned());
        });

        let recognizer =
            StreamingRecognizer::new(engine, Arc::clone(&source), config.format, events_tx);

        let inner = Arc::new(Mutex::new(Inner {
            state: SessionState::Idle,
            transcript,
            recognizer,
            capture: None,
            playback: None,
            current_task: None,
            file_path: None,
            started_at: None,
            frames_written: 0,
        }));

        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        spawn_event_pump(Arc::downgrade(&inner), events_rx);

        let store = RecordingStore::new(&config.recordings_dir);

        Self {
            config,
            inner,
            source,
            consent,
            notifier,
            store,
            errors_tx,
            errors_rx: std::sync::Mutex::new(Some(errors_rx)),
            transcript_rx,
        }
    }

    /// Begin a new session: consent check, fresh transcript, new
    /// recording file, recognition task #1. No-op while Recording or
    /// Playing.
    ///
    /// Capture or engine start failures go to the error channel and do
    /// not block the transition: the session still reports Recording.
    /// Treat a reported error as authoritative over that flag.
    pub async fn start(&self) -> Result<(), SessionError> {
        if !self.consent.request_consent().await {
            self.notifier
                .notify("No recording permission", "Please allow sound recording");
            return Err(SessionError::PermissionDenied);
        }

        let mut inner = self.inner.lock().await;
        if matches!(inner.state, SessionState::Recording | SessionState::Playing) {
            debug!("start ignored in state {:?}", inner.state);
            return Ok(());
        }

        // A start from Paused abandons that session: seal its file and
        // drop its task before the new one begins.
        self.teardown_recording(&mut inner).await;

        info!("session {} starting", self.config.session_id);
        inner.transcript.reset();
        inner.started_at = Some(Utc::now());
        inner.frames_written = 0;
        inner.file_path = None;

        match self.open_capture().await {
            Ok((capture, path)) => {
                inner.capture = Some(capture);
                inner.file_path = Some(path);
            }
            Err(e) => self.report(e),
        }

        inner.transcript.begin_task();
        match inner.recognizer.start().await {
            Ok(task_id) => inner.current_task = Some(task_id),
            Err(e) => {
                inner.current_task = None;
                self.report(e);
            }
        }

        // The transition completes even when a pipeline failed to
        // start; the error channel is authoritative over this flag.
        inner.state = SessionState::Recording;
        Ok(())
    }

    /// Seal the recording and release the recognizer. No-op while
    /// Idle. The transcript is kept until the next `start`.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Idle => {
                debug!("stop ignored while idle");
            }
            SessionState::Playing => {
                if let Some(playback) = inner.playback.take() {
                    playback.stop();
                }
                inner.state = SessionState::Idle;
                info!("playback stopped");
            }
            SessionState::Recording | SessionState::Paused => {
                self.teardown_recording(&mut inner).await;
                inner.state = SessionState::Idle;
                info!("session {} stopped", self.config.session_id);
            }
        }
        Ok(())
    }

    /// Suspend file writing (handle stays open) and cancel the current
    /// recognition task. No-op unless Recording.
    pub async fn pause(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Recording {
            debug!("pause ignored in state {:?}", inner.state);
            return Ok(());
        }

        if let Some(capture) = &inner.capture {
            capture.pause();
        }
        // The cancelled task is no longer current: its Cancelled event
        // still merges the hypothesis, but late hypothesis/final text
        // from it is stale and dropped.
        inner.current_task = None;
        inner.recognizer.pause().await;
        inner.state = SessionState::Paused;
        info!("session {} paused", self.config.session_id);
        Ok(())
    }

    /// Continue appending to the same file with a fresh recognition
    /// task. No-op unless Paused.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Paused {
            debug!("resume ignored in state {:?}", inner.state);
            return Ok(());
        }

        if let Some(capture) = &inner.capture {
            capture.resume();
        }

        inner.transcript.begin_task();
        match inner.recognizer.resume().await {
            Ok(task_id) => inner.current_task = Some(task_id),
            Err(e) => {
                inner.current_task = None;
                self.report(e);
            }
        }

        inner.state = SessionState::Recording;
        info!("session {} resumed", self.config.session_id);
        Ok(())
    }

    /// Play back the sealed recording. Consent-gated; no-op while
    /// Recording. Playback start failure goes to the error channel and
    /// the transition to Playing still completes; only `is_playing`
    /// tracks the sink.
    pub async fn play(&self) -> Result<(), SessionError> {
        if !self.consent.request_consent().await {
            self.notifier
                .notify("No playback permission", "Please allow sound recording");
            return Err(SessionError::PermissionDenied);
        }

        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Recording {
            debug!("play ignored while recording");
            return Ok(());
        }

        let path = match inner.file_path.clone() {
            Some(path) => Ok(path),
            None => self.store.recording_path(&self.config.session_id),
        };

        match path {
            Ok(path) => match PlaybackController::play(path).await {
                Ok(playback) => inner.playback = Some(playback),
                Err(e) => self.report(e),
            },
            Err(e) => self.report(e),
        }

        inner.state = SessionState::Playing;
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// The optimistic recording flag: true whenever the state machine
    /// is in Recording, even if a pipeline failed to start. A reported
    /// error is authoritative over this.
    pub async fn is_recording(&self) -> bool {
        self.inner.lock().await.state == SessionState::Recording
    }

    /// Whether the playback sink is currently producing sound.
    pub async fn is_playing(&self) -> bool {
        let inner = self.inner.lock().await;
        inner
            .playback
            .as_ref()
            .map(|p| p.is_playing())
            .unwrap_or(false)
    }

    /// Snapshot of the merged transcript.
    pub async fn transcript(&self) -> String {
        self.inner.lock().await.transcript.text()
    }

    /// Watch the merged transcript; the receiver always holds the
    /// latest emission.
    pub fn subscribe_transcript(&self) -> watch::Receiver<String> {
        self.transcript_rx.clone()
    }

    /// The session's error channel. Yields `None` after the session is
    /// dropped; can be taken once.
    pub fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<SessionError>> {
        self.errors_rx.lock().unwrap().take()
    }

    pub async fn stats(&self) -> SessionStats {
        let inner = self.inner.lock().await;
        let duration_secs = inner
            .started_at
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        let frames_written = inner
            .capture
            .as_ref()
            .map(|c| c.frames_written())
            .unwrap_or(inner.frames_written);

        SessionStats {
            state: inner.state,
            is_recording: inner.state == SessionState::Recording,
            is_playing: inner
                .playback
                .as_ref()
                .map(|p| p.is_playing())
                .unwrap_or(false),
            started_at: inner.started_at,
            duration_secs,
            frames_written,
            transcript_chars: inner.transcript.text().chars().count(),
        }
    }

    async fn open_capture(&self) -> Result<(CaptureController, PathBuf), SessionError> {
        let path = self.store.recording_path(&self.config.session_id)?;
        let subscription = self.source.subscribe(self.config.format).await?;
        let capture = CaptureController::start(subscription, self.config.format, path.clone())?;
        Ok((capture, path))
    }

    /// Stop the recognizer and seal the capture file, if either is
    /// live. Clears the current-task identity first so late events
    /// from the dead task are recognized as stale.
    async fn teardown_recording(&self, inner: &mut Inner) {
        inner.current_task = None;
        inner.recognizer.stop().await;

        if let Some(capture) = inner.capture.take() {
            match capture.stop().await {
                Ok(frames) => inner.frames_written = frames,
                Err(e) => self.report(e),
            }
        }
    }

    fn report(&self, err: SessionError) {
        error!("{err}");
        let _ = self.errors_tx.send(err);
    }
}

/// Routes tagged engine events into the accumulator under the session
/// lock. Holds only a weak back-reference: a torn-down session cannot
/// be resurrected by a late callback.
fn spawn_event_pump(
    inner: std::sync::Weak<Mutex<Inner>>,
    mut events_rx: mpsc::UnboundedReceiver<TaskEvent>,
) {
    tokio::spawn(async move {
        while let Some(TaskEvent { task_id, event }) = events_rx.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            let mut inner = inner.lock().await;

            let stale = inner.current_task != Some(task_id);
            match event {
                // Text from a task that is no longer current is dropped.
                RecognitionEvent::Hypothesis(_) | RecognitionEvent::Final(_) if stale => {
                    debug!("dropping stale event from task {}", task_id);
                }
                // Cancellation and drain bookkeeping is idempotent and
                // applies regardless of task identity.
                _ => inner.transcript.apply(&event),
            }
        }
    });
}
