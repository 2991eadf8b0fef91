//! Session recorder core for a battery-powered ECG logger.
//!
//! Persists periodically sampled multi-channel waveform data to removable
//! storage in a compact, append-only binary format, driven by a hardware
//! timer that fires a sampling callback at a fixed cadence.
//!
//! # Features
//!
//! - **Session format**: 16-byte big-endian header followed by fixed-size frames
//! - **Filename allocation**: `ecgses.000` to `ecgses.fff`, resumable search
//! - **Crash resilience**: every frame is flushed before the append returns
//! - **Drift-free scheduling**: period backlog carried across slow callbacks,
//!   never re-entered
//!
//! ## Example (recording to a directory)
//!
//! ```rust,no_run
//! use ecglog::{DirStorage, Recorder, RecorderConfig, Sample, SampleSource};
//! use ecglog::session::DeltaTime;
//!
//! struct Adc {
//!     t: u32,
//! }
//!
//! impl SampleSource for Adc {
//!     fn sample(&mut self) -> Option<Sample> {
//!         self.t += 4;
//!         Some(Sample { payload: vec![0u8; 24], delta_time: DeltaTime::new(self.t) })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ecglog::Result<()> {
//!     let config = RecorderConfig::from_file("recorder.yaml")?;
//!     let storage = DirStorage::new(&config.storage_dir);
//!     let recorder = Recorder::start(&config, &storage, Adc { t: 0 }, 1_700_000_000, 0)?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     let status = recorder.stop();
//!     println!("{} frames in {}", status.frames_written, status.file_name);
//!     Ok(())
//! }
//! ```

mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod codec;
pub mod config;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod storage;

// Core exports
pub use error::*;

pub use config::RecorderConfig;
pub use recorder::{Recorder, RecorderStatus, Sample, SampleSource};
pub use scheduler::{PeriodicScheduler, SchedulerState, TimerConfig};
pub use session::{Session, SessionReader};
pub use storage::{DirStorage, MemoryStorage, Storage};
