//! Recorder configuration
//!
//! Loaded from YAML; every field has a default matching the reference
//! device (8 channels of 24-bit samples at 250Hz, 16MHz clock).
//!
//! ```yaml
//! storage_dir: /mnt/sd
//! channel_count: 8
//! sample_frequency: 250
//! sample_width: 3
//! timer:
//!   clock_hz: 16000000
//!   prescaler: 64
//!   resolution_secs: 0.001
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::scheduler::TimerConfig;
use crate::session::{FrameLayout, SessionHeader};
use crate::{RecorderError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory session files are written to.
    pub storage_dir: PathBuf,
    /// Simultaneously sampled channels.
    pub channel_count: u16,
    /// Samples per second per channel.
    pub sample_frequency: u16,
    /// Bytes per channel sample.
    pub sample_width: usize,
    pub timer: TimerConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("."),
            channel_count: 8,
            sample_frequency: 250,
            sample_width: 3,
            timer: TimerConfig::default(),
        }
    }
}

impl RecorderConfig {
    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| RecorderError::parse("Recorder configuration", e.to_string()))?;
        config.validate()?;
        debug!("Loaded recorder configuration: {:?}", config);
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(RecorderError::config("channel_count must be non-zero"));
        }
        if self.sample_frequency == 0 {
            return Err(RecorderError::config("sample_frequency must be non-zero"));
        }
        if self.sample_width == 0 {
            return Err(RecorderError::config("sample_width must be non-zero"));
        }
        self.layout()?;
        self.timer.validate()
    }

    /// Frame layout for the configured channels and sample width.
    pub fn layout(&self) -> Result<FrameLayout> {
        FrameLayout::new(self.channel_count, self.sample_width)
    }

    /// Seconds between samples.
    pub fn sampling_period_secs(&self) -> f64 {
        1.0 / f64::from(self.sample_frequency.max(1))
    }

    /// Header for a session starting at `timestamp`.
    pub fn header(&self, timestamp: u64) -> SessionHeader {
        SessionHeader::new(timestamp, self.channel_count, self.sample_frequency)
    }
}
