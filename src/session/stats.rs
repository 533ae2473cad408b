use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Snapshot of a dictation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current state of the session state machine
    pub state: SessionState,

    /// The optimistic recording flag; a reported error on the session's
    /// error channel is authoritative over this
    pub is_recording: bool,

    /// Whether the playback sink is currently producing sound
    pub is_playing: bool,

    /// When the current session started recording, if it ever did
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session started
    pub duration_secs: f64,

    /// Audio frames written to the recording file so far
    pub frames_written: u64,

    /// Length of the merged transcript in characters
    pub transcript_chars: usize,
}
