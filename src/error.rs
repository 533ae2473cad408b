use thiserror::Error;

/// Errors reported by a dictation session.
///
/// `PermissionDenied` is surfaced to the user through the
/// `NotificationSink`; every other kind is pushed on the session's error
/// channel. A reported error is authoritative over the session's state
/// flags: the state machine completes its transition bookkeeping even
/// when the underlying resource failed to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The user refused recording consent; no state was changed.
    #[error("recording permission denied")]
    PermissionDenied,

    /// No usable audio device, or the frame source rejected the
    /// requested capture format.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The recording file could not be opened, written, or sealed.
    #[error("recording file error: {0}")]
    Io(String),

    /// The recognition pipeline failed to start a task.
    #[error("recognition engine failed to start: {0}")]
    EngineStart(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

impl From<hound::Error> for SessionError {
    fn from(err: hound::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}
