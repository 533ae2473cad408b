// Integration tests for the dictation session state machine
//
// A mock recognition engine lets the tests inject hypothesis/final
// events for specific tasks, including after those tasks were
// cancelled, to verify stale-event handling and pause/resume
// transcript continuity.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use tokio::sync::mpsc;

use voicelog::{
    AudioFrame, CaptureFormat, ConsentGate, DictationSession, FrameFanout, LogNotifier,
    NotificationSink, RecognitionEngine, RecognitionEvent, RecognitionTask, SessionConfig,
    SessionError, SessionState,
};

// ============================================================================
// Test doubles
// ============================================================================

struct MockEngine {
    tasks: Mutex<Vec<Arc<MockTask>>>,
    fail_start: bool,
}

impl MockEngine {
    fn new(fail_start: bool) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail_start,
        }
    }

    fn task(&self, index: usize) -> Arc<MockTask> {
        Arc::clone(&self.tasks.lock().unwrap()[index])
    }

    fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for MockEngine {
    async fn start_task(
        &self,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Arc<dyn RecognitionTask>, SessionError> {
        if self.fail_start {
            return Err(SessionError::EngineStart("engine offline".to_string()));
        }
        let task = Arc::new(MockTask {
            events,
            frames_fed: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            input_ended: AtomicBool::new(false),
        });
        self.tasks.lock().unwrap().push(Arc::clone(&task));
        Ok(task)
    }
}

struct MockTask {
    events: mpsc::UnboundedSender<RecognitionEvent>,
    frames_fed: AtomicU64,
    cancelled: AtomicBool,
    input_ended: AtomicBool,
}

impl MockTask {
    /// Inject an engine event for this task, as the engine would.
    fn emit(&self, event: RecognitionEvent) {
        let _ = self.events.send(event);
    }

    fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn input_was_ended(&self) -> bool {
        self.input_ended.load(Ordering::SeqCst)
    }
}

impl RecognitionTask for MockTask {
    fn append_frame(&self, _frame: AudioFrame) {
        self.frames_fed.fetch_add(1, Ordering::SeqCst);
    }

    fn end_input(&self) {
        self.input_ended.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        // A well-behaved engine acknowledges cancellation with the
        // Cancelled event, exactly once.
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.emit(RecognitionEvent::Cancelled);
        }
    }
}

struct DenyConsent;

#[async_trait::async_trait]
impl ConsentGate for DenyConsent {
    async fn request_consent(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.messages.lock().unwrap().push(format!("{title}: {body}"));
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    session: DictationSession,
    engine: Arc<MockEngine>,
    frames_tx: mpsc::Sender<AudioFrame>,
    format: CaptureFormat,
    _temp: TempDir,
}

fn test_format() -> CaptureFormat {
    CaptureFormat {
        sample_rate: 8_000,
        channels: 1,
        frame_ms: 10,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(voicelog::AlwaysConsent), false)
}

fn harness_with(consent: Arc<dyn ConsentGate>, fail_engine_start: bool) -> Harness {
    let temp = TempDir::new().expect("temp dir");
    let format = test_format();

    let fanout = Arc::new(FrameFanout::new(format));
    let (frames_tx, frames_rx) = mpsc::channel(64);
    fanout.spawn_driver(frames_rx);

    let engine = Arc::new(MockEngine::new(fail_engine_start));

    let config = SessionConfig {
        session_id: "test-session".to_string(),
        format,
        recordings_dir: temp.path().to_path_buf(),
    };

    let session = DictationSession::new(
        config,
        fanout,
        Arc::clone(&engine) as Arc<dyn RecognitionEngine>,
        consent,
        Arc::new(LogNotifier),
    );

    Harness {
        session,
        engine,
        frames_tx,
        format,
        _temp: temp,
    }
}

impl Harness {
    fn recording_path(&self) -> std::path::PathBuf {
        self._temp.path().join("test-session.wav")
    }

    fn frame(&self, index: u64) -> AudioFrame {
        AudioFrame {
            samples: vec![0i16; self.format.samples_per_frame()],
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            timestamp_ms: index * self.format.frame_ms,
        }
    }
}

/// Poll until the merged transcript equals `expected`.
async fn wait_for_transcript(session: &DictationSession, expected: &str) {
    for _ in 0..200 {
        if session.transcript().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "timed out waiting for transcript {:?}, got {:?}",
        expected,
        session.transcript().await
    );
}

// ============================================================================
// State machine
// ============================================================================

#[tokio::test]
async fn test_start_records_and_stop_seals_the_file() -> Result<()> {
    let h = harness();

    h.session.start().await?;
    assert_eq!(h.session.state().await, SessionState::Recording);
    assert!(h.session.is_recording().await);
    assert_eq!(h.engine.task_count(), 1);

    // Frames flow to both consumers: the file writer and the task.
    for i in 0..5 {
        h.frames_tx.send(h.frame(i)).await?;
    }
    for _ in 0..200 {
        if h.session.stats().await.frames_written == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.session.stats().await.frames_written, 5);

    h.session.stop().await?;
    assert_eq!(h.session.state().await, SessionState::Idle);
    assert!(h.engine.task(0).input_was_ended());
    assert!(h.engine.task(0).was_cancelled());

    let reader = hound::WavReader::open(h.recording_path())?;
    assert_eq!(reader.len() as usize, 5 * h.format.samples_per_frame());
    assert!(h.engine.task(0).frames_fed.load(Ordering::SeqCst) >= 5);

    Ok(())
}

#[tokio::test]
async fn test_start_is_noop_while_recording() -> Result<()> {
    let h = harness();

    h.session.start().await?;
    h.engine.task(0).emit(RecognitionEvent::Hypothesis("a".to_string()));
    wait_for_transcript(&h.session, "a").await;

    h.session.start().await?;

    assert_eq!(h.engine.task_count(), 1, "no new task for a no-op start");
    assert_eq!(h.session.transcript().await, "a", "transcript untouched");
    assert_eq!(h.session.state().await, SessionState::Recording);

    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() -> Result<()> {
    let h = harness();

    h.session.stop().await?;

    assert_eq!(h.session.state().await, SessionState::Idle);
    assert_eq!(h.engine.task_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_pause_and_resume_are_noops_in_wrong_states() -> Result<()> {
    let h = harness();

    h.session.pause().await?;
    assert_eq!(h.session.state().await, SessionState::Idle);

    h.session.resume().await?;
    assert_eq!(h.session.state().await, SessionState::Idle);
    assert_eq!(h.engine.task_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_pause_resume_transcript_continuity() -> Result<()> {
    let h = harness();
    let transcript_rx = h.session.subscribe_transcript();

    h.session.start().await?;
    h.engine.task(0).emit(RecognitionEvent::Hypothesis("hi".to_string()));
    wait_for_transcript(&h.session, "hi").await;

    h.session.pause().await?;
    assert_eq!(h.session.state().await, SessionState::Paused);
    assert!(h.engine.task(0).was_cancelled());
    // The cancelled task's hypothesis merged into the finalized text.
    wait_for_transcript(&h.session, "hi").await;

    h.session.resume().await?;
    assert_eq!(h.session.state().await, SessionState::Recording);
    assert_eq!(h.engine.task_count(), 2, "resume starts a fresh task");

    h.engine.task(1).emit(RecognitionEvent::Hypothesis("there".to_string()));
    wait_for_transcript(&h.session, "hithere").await;
    assert_eq!(
        *transcript_rx.borrow(),
        "hithere",
        "no separator is inserted at the pause boundary"
    );

    // The resumed task's final text continues the same transcript.
    h.engine.task(1).emit(RecognitionEvent::Final("there we go".to_string()));
    wait_for_transcript(&h.session, "hithere we go").await;

    h.session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_events_after_stop_are_dropped() -> Result<()> {
    let h = harness();

    h.session.start().await?;
    h.engine.task(0).emit(RecognitionEvent::Hypothesis("a".to_string()));
    wait_for_transcript(&h.session, "a").await;

    h.session.stop().await?;
    // Cancellation bookkeeping merged the hypothesis; the transcript
    // survives stop until the next session starts.
    wait_for_transcript(&h.session, "a").await;

    // A late final from the dead task arrives after stop.
    h.engine.task(0).emit(RecognitionEvent::Final("ignored".to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.session.transcript().await, "a");

    // A brand-new session must never see the stale text either.
    h.session.start().await?;
    wait_for_transcript(&h.session, "").await;
    h.engine.task(0).emit(RecognitionEvent::Final("ignored".to_string()));
    h.engine.task(0).emit(RecognitionEvent::Hypothesis("zombie".to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.session.transcript().await, "");

    // The new session's own task still works.
    h.engine.task(1).emit(RecognitionEvent::Hypothesis("fresh".to_string()));
    wait_for_transcript(&h.session, "fresh").await;

    Ok(())
}

#[tokio::test]
async fn test_consent_denial_notifies_and_leaves_state_unchanged() -> Result<()> {
    let temp = TempDir::new()?;
    let format = test_format();
    let fanout = Arc::new(FrameFanout::new(format));
    let engine = Arc::new(MockEngine::new(false));
    let notifier = Arc::new(RecordingNotifier::default());

    let session = DictationSession::new(
        SessionConfig {
            session_id: "denied".to_string(),
            format,
            recordings_dir: temp.path().to_path_buf(),
        },
        fanout,
        Arc::clone(&engine) as Arc<dyn RecognitionEngine>,
        Arc::new(DenyConsent),
        Arc::clone(&notifier) as Arc<dyn NotificationSink>,
    );

    let result = session.start().await;

    assert_eq!(result, Err(SessionError::PermissionDenied));
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(engine.task_count(), 0);
    assert_eq!(
        notifier.messages.lock().unwrap().len(),
        1,
        "denial is surfaced to the user"
    );

    Ok(())
}

#[tokio::test]
async fn test_engine_start_failure_keeps_optimistic_recording_flag() -> Result<()> {
    let h = harness_with(Arc::new(voicelog::AlwaysConsent), true);
    let mut errors = h.session.take_errors().expect("error channel");

    h.session.start().await?;

    // The reported error is authoritative, but the flag still flips:
    // the session claims Recording with no recognition task running.
    assert!(h.session.is_recording().await);
    assert_eq!(h.engine.task_count(), 0);
    assert!(matches!(
        errors.try_recv(),
        Ok(SessionError::EngineStart(_))
    ));

    h.session.stop().await?;
    assert_eq!(h.session.state().await, SessionState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_capture_open_failure_reports_but_completes_transition() -> Result<()> {
    let temp = TempDir::new()?;
    // A file where the recordings directory should be makes the
    // capture path unopenable.
    let blocked = temp.path().join("not-a-dir");
    std::fs::write(&blocked, b"blocked")?;

    let format = test_format();
    let fanout = Arc::new(FrameFanout::new(format));
    let engine = Arc::new(MockEngine::new(false));

    let session = DictationSession::new(
        SessionConfig {
            session_id: "blocked".to_string(),
            format,
            recordings_dir: blocked,
        },
        fanout,
        Arc::clone(&engine) as Arc<dyn RecognitionEngine>,
        Arc::new(voicelog::AlwaysConsent),
        Arc::new(LogNotifier),
    );
    let mut errors = session.take_errors().expect("error channel");

    session.start().await?;

    assert!(session.is_recording().await);
    assert!(matches!(errors.try_recv(), Ok(SessionError::Io(_))));
    // Recognition still started even though the file did not.
    assert_eq!(engine.task_count(), 1);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_play_with_missing_recording_reports_io() -> Result<()> {
    let h = harness();
    let mut errors = h.session.take_errors().expect("error channel");

    h.session.play().await?;

    assert_eq!(h.session.state().await, SessionState::Playing);
    assert!(!h.session.is_playing().await, "nothing is actually playing");
    assert!(matches!(errors.try_recv(), Ok(SessionError::Io(_))));

    // start() is a no-op while Playing.
    h.session.start().await?;
    assert_eq!(h.engine.task_count(), 0);
    assert_eq!(h.session.state().await, SessionState::Playing);

    h.session.stop().await?;
    assert_eq!(h.session.state().await, SessionState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_stats_snapshot() -> Result<()> {
    let h = harness();

    let idle = h.session.stats().await;
    assert_eq!(idle.state, SessionState::Idle);
    assert!(!idle.is_recording);
    assert!(idle.started_at.is_none());

    h.session.start().await?;
    h.engine.task(0).emit(RecognitionEvent::Hypothesis("hello".to_string()));
    wait_for_transcript(&h.session, "hello").await;

    let recording = h.session.stats().await;
    assert_eq!(recording.state, SessionState::Recording);
    assert!(recording.is_recording);
    assert!(recording.started_at.is_some());
    assert_eq!(recording.transcript_chars, 5);

    h.session.stop().await?;
    Ok(())
}
