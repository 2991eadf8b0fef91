//! Error types for session recording.
//!
//! Every failure in the recorder is a discrete value returned from the call
//! that produced it. Nothing is retried internally; callers decide whether to
//! abandon the session or keep sampling.
//!
//! ## Error Categories
//!
//! - **Allocation Errors**: no unused `ecgses.XXX` name left on the medium
//! - **Storage Errors**: the medium refused to open a session file
//! - **Write Errors**: the medium accepted fewer bytes than a header or frame
//! - **Precondition Errors**: a payload did not match the session frame layout
//! - **Parse Errors**: a session file could not be read back
//! - **Configuration Errors**: invalid recorder settings
//!
//! ## Recovery
//!
//! ```rust
//! use ecglog::RecorderError;
//!
//! let error = RecorderError::frame_write_incomplete(7, 12, 32);
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for recorder operations.
pub type Result<T, E = RecorderError> = std::result::Result<T, E>;

/// Main error type for recorder operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RecorderError {
    #[error("No unused session filename available (searched from suffix {base_suffix:#05x})")]
    NoFilenameAvailable { base_suffix: u16 },

    #[error("Failed to open session file {name}")]
    StorageOpenFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session header for {name} incomplete: wrote {written} of {expected} bytes")]
    HeaderWriteIncomplete { name: String, written: usize, expected: usize },

    #[error("Frame {sequence} incomplete: wrote {written} of {expected} bytes")]
    FrameWriteIncomplete { sequence: u8, written: usize, expected: usize },

    #[error("Sample payload is {actual} bytes, session layout requires {expected}")]
    PayloadLength { expected: usize, actual: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Session file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid recorder configuration: {reason}")]
    Config { reason: String },
}

impl RecorderError {
    /// Returns whether the caller can reasonably try the operation again.
    ///
    /// Allocation and open failures need operator intervention (swap or
    /// clear the card). A short frame write may be a transient medium fault,
    /// so sampling can continue.
    pub fn is_retryable(&self) -> bool {
        match self {
            RecorderError::NoFilenameAvailable { .. } => false,
            RecorderError::StorageOpenFailed { .. } => false,
            RecorderError::HeaderWriteIncomplete { .. } => false,
            RecorderError::FrameWriteIncomplete { .. } => true,
            RecorderError::PayloadLength { .. } => false,
            RecorderError::Parse { .. } => false,
            RecorderError::File { .. } => false,
            RecorderError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RecorderError::NoFilenameAvailable { .. } => vec![
                "Copy existing sessions off the card and delete them",
                "Replace the storage card",
            ],
            RecorderError::StorageOpenFailed { .. } => vec![
                "Check the card is inserted and mounted",
                "Check the card is not full or write-protected",
            ],
            RecorderError::HeaderWriteIncomplete { .. } => vec![
                "Discard the partially written session file",
                "Check free space on the card",
            ],
            RecorderError::FrameWriteIncomplete { .. } => vec![
                "Continue sampling if the next frame writes succeed",
                "Stop the session if short writes persist",
                "Trim the truncated trailing frame when reading the file",
            ],
            RecorderError::PayloadLength { .. } => {
                vec!["Supply exactly channel_count * sample_width payload bytes"]
            }
            RecorderError::Parse { .. } => vec![
                "Verify the file is an ecgses session file",
                "Verify the sample width used to read the file",
            ],
            RecorderError::File { .. } => {
                vec!["Check the file exists and is readable", "Check file permissions"]
            }
            RecorderError::Config { .. } => vec!["Fix the reported configuration value"],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RecorderError::File { path, source }
    }

    /// Helper constructor for storage open failures.
    pub fn storage_open_failed(name: impl Into<String>, source: std::io::Error) -> Self {
        RecorderError::StorageOpenFailed { name: name.into(), source }
    }

    /// Helper constructor for short header writes.
    pub fn header_write_incomplete(
        name: impl Into<String>,
        written: usize,
        expected: usize,
    ) -> Self {
        RecorderError::HeaderWriteIncomplete { name: name.into(), written, expected }
    }

    /// Helper constructor for short frame writes.
    pub fn frame_write_incomplete(sequence: u8, written: usize, expected: usize) -> Self {
        RecorderError::FrameWriteIncomplete { sequence, written, expected }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        RecorderError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        RecorderError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        RecorderError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
