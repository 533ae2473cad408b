use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use voicelog::{
    AlwaysConsent, AudioFrame, Config, DictationSession, LogNotifier, RecognitionEngine,
    RecognitionEvent, RecognitionTask, SessionConfig, SessionError, SyntheticFrameSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/voicelog").unwrap_or_else(|_| {
        info!("no config file found, using defaults");
        Config::default()
    });

    info!("{} demo", cfg.service.name);

    let format = cfg.audio.capture_format();
    let session_config = SessionConfig {
        format,
        recordings_dir: cfg.audio.recordings_path.clone().into(),
        ..SessionConfig::default()
    };

    let source = Arc::new(SyntheticFrameSource::start(format));
    let engine = Arc::new(ScriptedEngine::new(vec![
        TaskScript {
            hypotheses: vec!["testing ".into(), "testing one ".into()],
            final_text: String::new(), // cancelled at pause, hypothesis merges
        },
        TaskScript {
            hypotheses: vec!["two ".into()],
            final_text: "two three".into(),
        },
    ]));

    let session = DictationSession::new(
        session_config,
        source,
        engine,
        Arc::new(AlwaysConsent),
        Arc::new(LogNotifier),
    );

    let mut errors = session.take_errors().expect("error channel");
    tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            warn!("session error: {err}");
        }
    });

    let mut transcript_rx = session.subscribe_transcript();
    tokio::spawn(async move {
        while transcript_rx.changed().await.is_ok() {
            info!("transcript: {:?}", *transcript_rx.borrow_and_update());
        }
    });

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    session.pause().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    session.resume().await?;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    session.stop().await?;

    info!("final transcript: {:?}", session.transcript().await);
    info!("stats: {}", serde_json::to_string(&session.stats().await)?);

    // Playback needs an output device; on a headless box this lands on
    // the error channel instead of playing.
    session.play().await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.stop().await?;

    Ok(())
}

/// Script for one recognition task: hypotheses emitted as frames
/// arrive, final text emitted on end-of-input.
struct TaskScript {
    hypotheses: Vec<String>,
    final_text: String,
}

/// Demo engine that replays a fixed script per task.
struct ScriptedEngine {
    scripts: Mutex<VecDeque<TaskScript>>,
}

impl ScriptedEngine {
    fn new(scripts: Vec<TaskScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
        }
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn start_task(
        &self,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Arc<dyn RecognitionTask>, SessionError> {
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(TaskScript {
            hypotheses: Vec::new(),
            final_text: String::new(),
        });
        Ok(Arc::new(ScriptedTask {
            events,
            hypotheses: Mutex::new(script.hypotheses.into()),
            final_text: script.final_text,
            frames_seen: AtomicU64::new(0),
            final_sent: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }))
    }
}

struct ScriptedTask {
    events: mpsc::UnboundedSender<RecognitionEvent>,
    hypotheses: Mutex<VecDeque<String>>,
    final_text: String,
    frames_seen: AtomicU64,
    final_sent: AtomicBool,
    done: AtomicBool,
}

impl ScriptedTask {
    fn send_final(&self) {
        if !self.final_text.is_empty() && !self.final_sent.swap(true, Ordering::SeqCst) {
            let _ = self
                .events
                .send(RecognitionEvent::Final(self.final_text.clone()));
        }
    }
}

impl RecognitionTask for ScriptedTask {
    fn append_frame(&self, _frame: AudioFrame) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        // One scripted event every few frames of audio.
        let n = self.frames_seen.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 3 == 0 {
            let next = self.hypotheses.lock().unwrap().pop_front();
            match next {
                Some(text) => {
                    let _ = self.events.send(RecognitionEvent::Hypothesis(text));
                }
                None => self.send_final(),
            }
        }
    }

    fn end_input(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.send_final();
            let _ = self.events.send(RecognitionEvent::Drained);
        }
    }

    fn cancel(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(RecognitionEvent::Cancelled);
        }
    }
}
