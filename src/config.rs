use anyhow::Result;
use serde::Deserialize;

use crate::audio::CaptureFormat;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "voicelog".to_string(),
            },
            audio: AudioConfig {
                recordings_path: "recordings".to_string(),
                sample_rate: 44_100,
                channels: 1,
                frame_ms: 100,
            },
        }
    }
}

impl AudioConfig {
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_ms: self.frame_ms,
        }
    }
}
