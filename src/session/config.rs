use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::CaptureFormat;

/// Configuration for a dictation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g. "dictation-2026-08-standup");
    /// also names the recording file
    pub session_id: String,

    /// Capture format shared by the file and recognition paths
    pub format: CaptureFormat,

    /// Directory where sealed recordings land
    pub recordings_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("dictation-{}", uuid::Uuid::new_v4()),
            format: CaptureFormat::default(), // 44.1kHz mono, 100ms frames
            recordings_dir: PathBuf::from("recordings"),
        }
    }
}
