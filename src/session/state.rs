use serde::{Deserialize, Serialize};

/// Lifecycle of a dictation session.
///
/// `Idle` is always reachable via `stop`. Pause and resume move between
/// `Recording` and `Paused` without sealing the recording file;
/// `Playing` is entered independently from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not recording or playing.
    Idle,
    /// Capturing audio to file and streaming it to the recognizer.
    Recording,
    /// File writing suspended, recognition task cancelled; the
    /// recording file stays open.
    Paused,
    /// Playing back the sealed recording.
    Playing,
}
