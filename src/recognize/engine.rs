use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::error::SessionError;

/// One event from a recognition task, in engine-delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Provisional transcript for the task; superseded wholesale by the
    /// next hypothesis.
    Hypothesis(String),
    /// Settled transcript text for the task.
    Final(String),
    /// The task stopped before consuming all input.
    Cancelled,
    /// All submitted audio was consumed; no further events arrive for
    /// this task under normal operation.
    Drained,
}

/// A speech-to-text engine consumed as a capability.
///
/// The engine owns task lifecycles; this crate only feeds frames and
/// merges the resulting events.
#[async_trait::async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Open a new streaming task. Events for the task are delivered on
    /// `events` until the engine drops the sender; delivery is
    /// asynchronous, so an event may still arrive after `cancel`
    /// returns.
    async fn start_task(
        &self,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Arc<dyn RecognitionTask>, SessionError>;
}

/// Handle to one streaming recognition attempt.
pub trait RecognitionTask: Send + Sync {
    /// Queue one frame for recognition. Must only enqueue — the frame
    /// delivery path is never allowed to block on processing.
    fn append_frame(&self, frame: AudioFrame);

    /// Signal that no more audio will be appended; the engine drains
    /// what it has and emits `Drained`.
    fn end_input(&self);

    /// Ask the engine to stop producing events for this task.
    /// Cooperative: in-flight events may still be delivered afterwards.
    fn cancel(&self);
}
