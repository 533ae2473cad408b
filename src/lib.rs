pub mod audio;
pub mod config;
pub mod consent;
pub mod error;
pub mod notify;
pub mod recognize;
pub mod session;
pub mod store;
pub mod transcript;

pub use audio::{
    AudioFrame, AudioFrameSource, CaptureController, CaptureFormat, FrameFanout,
    FrameSubscription, PlaybackController, SubscriptionGuard, SyntheticFrameSource,
};
pub use config::Config;
pub use consent::{AlwaysConsent, ConsentGate};
pub use error::SessionError;
pub use notify::{LogNotifier, NotificationSink};
pub use recognize::{
    RecognitionEngine, RecognitionEvent, RecognitionTask, StreamingRecognizer, TaskEvent,
};
pub use session::{DictationSession, SessionConfig, SessionState, SessionStats};
pub use store::RecordingStore;
pub use transcript::TranscriptAccumulator;
