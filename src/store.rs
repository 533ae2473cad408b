use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::SessionError;

/// Resolves writable paths for recording artifacts.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The WAV path for a session, creating the directory if needed.
    pub fn recording_path(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{session_id}.wav"));
        debug!("resolved recording path {}", path.display());
        Ok(path)
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}
