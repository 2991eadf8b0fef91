//! Session file reader
//!
//! Reads a recorded session back into its header and frames. The format has
//! no frame count or checksum, so the reader derives the frame count from the
//! file length and reports any trailing partial frame (left by a short write
//! or power loss mid-flush) instead of failing on it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ecglog::session::SessionReader;
//!
//! fn dump() -> ecglog::Result<()> {
//!     let mut reader = SessionReader::open("ecgses.000", 3)?;
//!     println!("{} frames", reader.total_frames());
//!
//!     while let Some(frame) = reader.read_next_frame()? {
//!         println!("#{} at {}", frame.sequence, frame.delta_time.value());
//!     }
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::format::{DeltaTime, FRAME_PREFIX_SIZE, FrameLayout, SESSION_HEADER_SIZE, SessionHeader};
use super::naming::parse_session_suffix;
use crate::{RecorderError, Result};

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u8,
    pub delta_time: DeltaTime,
    pub payload: Vec<u8>,
}

/// Sequential reader over a session file loaded into memory.
pub struct SessionReader {
    data: Vec<u8>,
    path: PathBuf,
    header: SessionHeader,
    layout: FrameLayout,
    total_frames: usize,
    trailing_bytes: usize,
    current_frame: usize,
}

impl SessionReader {
    /// Open a session file. `sample_width` must match the recording device.
    pub fn open<P: AsRef<Path>>(path: P, sample_width: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file =
            File::open(&path).map_err(|e| RecorderError::file_error(path.clone(), e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| RecorderError::file_error(path.clone(), e))?;

        Self::from_bytes_with_path(data, sample_width, path)
    }

    /// Create a reader over in-memory session bytes.
    pub fn from_bytes(data: Vec<u8>, sample_width: usize) -> Result<Self> {
        Self::from_bytes_with_path(data, sample_width, PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: Vec<u8>, sample_width: usize, path: PathBuf) -> Result<Self> {
        if sample_width == 0 {
            return Err(RecorderError::parse("Session layout", "Sample width must be non-zero"));
        }

        let header = SessionHeader::parse(&data)?;
        let layout = FrameLayout::new(header.channel_count, sample_width)
            .map_err(|e| RecorderError::parse("Session layout", e.to_string()))?;
        let frame_size = layout.frame_size();

        let frame_bytes = data.len() - SESSION_HEADER_SIZE;
        let total_frames = frame_bytes / frame_size;
        let trailing_bytes = frame_bytes % frame_size;

        if trailing_bytes > 0 {
            warn!(
                "{}: {} trailing bytes after {} frames, last frame truncated",
                path.display(),
                trailing_bytes,
                total_frames
            );
        }
        debug!(
            "Session {}: {} channels at {}Hz, {} frames of {} bytes",
            path.display(),
            header.channel_count,
            header.sample_frequency,
            total_frames,
            frame_size
        );

        Ok(Self {
            data,
            path,
            header,
            layout,
            total_frames,
            trailing_bytes,
            current_frame: 0,
        })
    }

    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Number of complete frames in the file.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Bytes of a truncated final frame, zero for a cleanly written file.
    pub fn trailing_bytes(&self) -> usize {
        self.trailing_bytes
    }

    pub fn is_truncated(&self) -> bool {
        self.trailing_bytes > 0
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Suffix of the session filename, when the file follows the
    /// `ecgses.XXX` naming.
    pub fn session_suffix(&self) -> Option<u16> {
        self.path.file_name()?.to_str().and_then(parse_session_suffix)
    }

    /// Read the next complete frame, or `None` at the end of the file.
    pub fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        if self.current_frame >= self.total_frames {
            return Ok(None);
        }

        let frame_size = self.layout.frame_size();
        let start = SESSION_HEADER_SIZE + self.current_frame * frame_size;
        let bytes = self.data.get(start..start + frame_size).ok_or_else(|| {
            RecorderError::parse(
                "Frame reading",
                format!(
                    "Frame {} extends beyond data bounds ({} > {})",
                    self.current_frame,
                    start + frame_size,
                    self.data.len()
                ),
            )
        })?;

        let frame = Frame {
            sequence: bytes[0],
            delta_time: DeltaTime::from_wire_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            payload: bytes[FRAME_PREFIX_SIZE..].to_vec(),
        };
        self.current_frame += 1;
        Ok(Some(frame))
    }
}

impl Iterator for SessionReader {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::storage::MemoryStorage;
    use anyhow::{Context, Result};

    fn record(frames: u32) -> Result<Vec<u8>> {
        let storage = MemoryStorage::new();
        let mut session = Session::open(&storage, SessionHeader::new(42, 2, 500), 2, 0)?;
        for i in 0..frames {
            session.append_frame(&[i as u8; 4], DeltaTime::new(i * 2))?;
        }
        session.close();
        storage.contents("ecgses.000").context("session file missing")
    }

    #[test]
    fn reads_back_recorded_frames() -> Result<()> {
        let mut reader = SessionReader::from_bytes(record(260)?, 2)?;

        assert_eq!(reader.header(), &SessionHeader::new(42, 2, 500));
        assert_eq!(reader.total_frames(), 260);
        assert!(!reader.is_truncated());
        assert_eq!(reader.session_suffix(), None);

        let mut count = 0u32;
        while let Some(frame) = reader.read_next_frame()? {
            assert_eq!(frame.sequence, (count % 256) as u8);
            assert_eq!(frame.delta_time.value(), count * 2);
            assert_eq!(frame.payload, vec![count as u8; 4]);
            count += 1;
        }
        assert_eq!(count, 260);
        assert!(reader.read_next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn truncated_trailing_frame_is_reported() -> Result<()> {
        let mut bytes = record(3)?;
        bytes.truncate(bytes.len() - 5);

        let reader = SessionReader::from_bytes(bytes, 2)?;
        assert_eq!(reader.total_frames(), 2);
        assert_eq!(reader.trailing_bytes(), 12 - 5);
        assert!(reader.is_truncated());

        let frames = reader.collect::<crate::Result<Vec<Frame>>>()?;
        assert_eq!(frames.len(), 2);
        Ok(())
    }

    #[test]
    fn header_only_file_has_no_frames() -> Result<()> {
        let reader = SessionReader::from_bytes(record(0)?, 2)?;
        assert_eq!(reader.total_frames(), 0);
        assert!(!reader.is_truncated());
        Ok(())
    }

    #[test]
    fn rejects_zero_sample_width_and_garbage() {
        assert!(matches!(
            SessionReader::from_bytes(SessionHeader::new(0, 1, 1).encode().to_vec(), 0),
            Err(RecorderError::Parse { .. })
        ));
        assert!(matches!(
            SessionReader::from_bytes(vec![0u8; 10], 2),
            Err(RecorderError::Parse { .. })
        ));
    }

    #[test]
    fn oversized_sample_width_is_a_parse_error() {
        let header = SessionHeader::new(0, 2, 250).encode().to_vec();
        for width in [usize::MAX, usize::MAX / 2 + 1, 1 << 20] {
            assert!(matches!(
                SessionReader::from_bytes(header.clone(), width),
                Err(RecorderError::Parse { .. })
            ));
        }
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let result = SessionReader::open("/nonexistent/ecgses.000", 3);
        assert!(matches!(result, Err(RecorderError::File { .. })));
    }
}
