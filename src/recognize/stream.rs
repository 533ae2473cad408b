use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::engine::{RecognitionEngine, RecognitionEvent, RecognitionTask};
use crate::audio::{AudioFrameSource, CaptureFormat, SubscriptionGuard};
use crate::error::SessionError;

/// A recognition event tagged with the task it came from, so the
/// session can recognize events from a task that is no longer current.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: u64,
    pub event: RecognitionEvent,
}

/// Streams the live frame sequence into recognition tasks.
///
/// Owns at most one active task. Every (re)start opens a fresh frame
/// subscription and a fresh task with the next task id; frames are
/// forwarded enqueue-only so the capture path never stalls behind
/// recognition.
pub struct StreamingRecognizer {
    engine: Arc<dyn RecognitionEngine>,
    source: Arc<dyn AudioFrameSource>,
    format: CaptureFormat,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    next_task_id: u64,
    active: Option<ActiveTask>,
}

struct ActiveTask {
    id: u64,
    task: Arc<dyn RecognitionTask>,
    guard: SubscriptionGuard,
    feeder: JoinHandle<()>,
}

impl StreamingRecognizer {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        source: Arc<dyn AudioFrameSource>,
        format: CaptureFormat,
        events_tx: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            engine,
            source,
            format,
            events_tx,
            next_task_id: 1,
            active: None,
        }
    }

    /// Open a fresh subscription and task. Any leftover task is
    /// cancelled first, so at most one task is ever active.
    pub async fn start(&mut self) -> Result<u64, SessionError> {
        if self.active.is_some() {
            self.release(false).await;
        }

        let mut subscription = self.source.subscribe(self.format).await?;
        let guard = subscription.guard();

        let (task_events_tx, mut task_events_rx) = mpsc::unbounded_channel();
        let task = self.engine.start_task(task_events_tx).await?;

        let id = self.next_task_id;
        self.next_task_id += 1;

        // Tag the task's events and route them to the session's pump.
        // Runs until the engine drops its sender, which may be well
        // after this task stops being current.
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = task_events_rx.recv().await {
                if events_tx.send(TaskEvent { task_id: id, event }).is_err() {
                    break;
                }
            }
        });

        // Feed frames to the engine. append_frame only enqueues.
        let feed_task = Arc::clone(&task);
        let feeder = tokio::spawn(async move {
            while let Some(frame) = subscription.recv().await {
                feed_task.append_frame(frame);
            }
        });

        info!("recognition task {} started", id);
        self.active = Some(ActiveTask {
            id,
            task,
            guard,
            feeder,
        });
        Ok(id)
    }

    /// Signal end-of-input, cancel the task, release the subscription.
    pub async fn stop(&mut self) {
        self.release(true).await;
    }

    /// Cancel the task and release the subscription. The file-writing
    /// path is untouched.
    pub async fn pause(&mut self) {
        self.release(false).await;
    }

    /// Equivalent to `start`: fresh subscription, fresh task.
    pub async fn resume(&mut self) -> Result<u64, SessionError> {
        self.start().await
    }

    pub fn current_task_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    async fn release(&mut self, end_input: bool) {
        let Some(active) = self.active.take() else {
            return;
        };

        if end_input {
            active.task.end_input();
        }
        active.task.cancel();
        active.guard.release();

        if let Err(e) = active.feeder.await {
            warn!("frame feeder for task {} panicked: {}", active.id, e);
        }
        info!("recognition task {} released", active.id);
    }
}
