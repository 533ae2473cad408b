use serde::{Deserialize, Serialize};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// The capture format negotiated with the frame source.
///
/// Both consumers of the frame stream (the file writer and the
/// recognizer) share one format; there is no transcoding between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame length in milliseconds (affects latency)
    pub frame_ms: u64,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100, // CD-quality mono capture
            channels: 1,
            frame_ms: 100,
        }
    }
}

impl CaptureFormat {
    /// Number of samples carried by one frame at this format.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.frame_ms / 1000) as usize * self.channels as usize
    }
}
