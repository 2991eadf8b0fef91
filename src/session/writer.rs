//! Session writer
//!
//! A [`Session`] owns the output stream of one recording. Opening it picks a
//! filename and writes the header; every appended frame is written with a
//! single write and flushed before the call returns, since the device can
//! lose power at any moment and there is no separate commit step.
//!
//! ## Usage Example
//!
//! ```rust
//! use ecglog::session::{DeltaTime, Session, SessionHeader};
//! use ecglog::storage::MemoryStorage;
//!
//! fn record() -> ecglog::Result<()> {
//!     let storage = MemoryStorage::new();
//!     let header = SessionHeader::new(1_700_000_000, 2, 250);
//!     let mut session = Session::open(&storage, header, 3, 0)?;
//!
//!     session.append_frame(&[0u8; 6], DeltaTime::new(4))?;
//!     let next_suffix = session.next_suffix();
//!     session.close();
//!     assert_eq!(next_suffix, 1);
//!     Ok(())
//! }
//! # record().unwrap();
//! ```

use tracing::{debug, info, trace, warn};

use super::format::{DeltaTime, FrameLayout, SESSION_HEADER_SIZE, SessionHeader, encode_frame};
use super::naming::allocate_file_name;
use crate::storage::{SessionStream, Storage};
use crate::{RecorderError, Result};

/// One open recording session.
///
/// Dropping a session flushes and releases its stream, so every exit path
/// (including early returns on error) leaves the file closed.
pub struct Session {
    stream: Box<dyn SessionStream>,
    name: String,
    header: SessionHeader,
    layout: FrameLayout,
    sequence: u8,
    last_delta_time: DeltaTime,
    frames_written: u64,
    next_suffix: u16,
    frame_buf: Vec<u8>,
    closed: bool,
}

impl Session {
    /// Allocate a filename at or above `base_suffix`, create it and write the
    /// session header.
    ///
    /// `sample_width` is the number of bytes each channel contributes to a
    /// frame payload.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::Config`] when the frame payload for
    ///   `channel_count * sample_width` exceeds the format limit; nothing is
    ///   created on the medium
    /// - [`RecorderError::NoFilenameAvailable`] when every suffix from
    ///   `base_suffix` up to `0xfff` is taken
    /// - [`RecorderError::StorageOpenFailed`] when the medium refuses the open
    /// - [`RecorderError::HeaderWriteIncomplete`] when the header write comes
    ///   back short; the partial file stays on the medium
    pub fn open<S: Storage + ?Sized>(
        storage: &S,
        header: SessionHeader,
        sample_width: usize,
        base_suffix: u16,
    ) -> Result<Self> {
        let layout = FrameLayout::new(header.channel_count, sample_width)?;
        let allocation = allocate_file_name(storage, base_suffix)?;

        let mut stream = storage
            .open_for_append(&allocation.name)
            .map_err(|e| RecorderError::storage_open_failed(allocation.name.clone(), e))?;

        let header_bytes = header.encode();
        debug!("Writing session header to {}: {:02x?}", allocation.name, header_bytes);
        let written = stream.write(&header_bytes);
        if let Err(e) = stream.flush() {
            warn!("Flush after header of {} failed: {}", allocation.name, e);
        }
        if written != SESSION_HEADER_SIZE {
            stream.close();
            return Err(RecorderError::header_write_incomplete(
                allocation.name,
                written,
                SESSION_HEADER_SIZE,
            ));
        }

        info!(
            "Opened session {}: {} channels at {}Hz, {} byte frames",
            allocation.name,
            header.channel_count,
            header.sample_frequency,
            layout.frame_size()
        );

        Ok(Self {
            stream,
            name: allocation.name,
            header,
            layout,
            sequence: 0,
            last_delta_time: DeltaTime::default(),
            frames_written: 0,
            next_suffix: allocation.next_suffix,
            frame_buf: vec![0u8; layout.frame_size()],
            closed: false,
        })
    }

    /// Append one frame holding `payload` for every channel of one time slice.
    ///
    /// The sequence counter advances (wrapping at 256) whenever a write is
    /// attempted, including when the write comes back short.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::PayloadLength`] when `payload` does not match the
    ///   session layout; nothing is written
    /// - [`RecorderError::FrameWriteIncomplete`] when the medium accepts fewer
    ///   bytes than the frame size; the accepted prefix stays in the file
    pub fn append_frame(&mut self, payload: &[u8], delta_time: DeltaTime) -> Result<()> {
        let expected = self.layout.payload_len();
        if payload.len() != expected {
            return Err(RecorderError::PayloadLength { expected, actual: payload.len() });
        }

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        encode_frame(&mut self.frame_buf, sequence, delta_time, payload);
        let written = self.stream.write(&self.frame_buf);
        if let Err(e) = self.stream.flush() {
            warn!("Flush after frame {} of {} failed: {}", sequence, self.name, e);
        }

        let frame_size = self.frame_buf.len();
        if written != frame_size {
            warn!(
                "Tried to write frame of {} bytes to {}, only wrote {} bytes",
                frame_size, self.name, written
            );
            return Err(RecorderError::frame_write_incomplete(sequence, written, frame_size));
        }

        self.frames_written += 1;
        self.last_delta_time = delta_time;
        trace!("Frame {} written to {} (delta={})", sequence, self.name, delta_time.value());
        Ok(())
    }

    /// Flush and release the stream. No further operations are possible.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.flush() {
            warn!("Flush on close of {} failed: {}", self.name, e);
        }
        self.stream.close();
        info!("Closed session {} after {} frames", self.name, self.frames_written);
    }

    /// Filename this session writes to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Counter value the next frame will carry.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Delta time of the most recently written frame.
    pub fn last_delta_time(&self) -> DeltaTime {
        self.last_delta_time
    }

    /// Frames fully written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Suffix the next session's filename search should start from.
    pub fn next_suffix(&self) -> u16 {
        self.next_suffix
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("layout", &self.layout)
            .field("sequence", &self.sequence)
            .field("frames_written", &self.frames_written)
            .field("next_suffix", &self.next_suffix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::format::{FRAME_PREFIX_SIZE, MAX_PAYLOAD_LEN, SESSION_MAGIC};
    use crate::session::naming::session_file_name;
    use crate::storage::MemoryStorage;
    use anyhow::{Context, Result, ensure};

    const CHANNELS: u16 = 2;
    const WIDTH: usize = 3;

    fn open(storage: &MemoryStorage) -> crate::Result<Session> {
        Session::open(storage, SessionHeader::new(0xdead_beef, CHANNELS, 250), WIDTH, 0)
    }

    #[test]
    fn open_writes_header_first() -> Result<()> {
        let storage = MemoryStorage::new();
        let session = open(&storage).context("opening session")?;

        assert_eq!(session.name(), "ecgses.000");
        assert_eq!(session.sequence(), 0);
        assert_eq!(session.next_suffix(), 1);

        let bytes = storage.contents("ecgses.000").context("file missing")?;
        ensure!(bytes.len() == SESSION_HEADER_SIZE, "header size {}", bytes.len());
        assert_eq!(&bytes[0..2], &SESSION_MAGIC);
        assert_eq!(&bytes[4..6], &250u16.to_be_bytes());
        assert_eq!(&bytes[6..8], &CHANNELS.to_be_bytes());
        assert_eq!(&bytes[8..16], &0xdead_beefu64.to_be_bytes());
        Ok(())
    }

    #[test]
    fn open_continues_after_existing_sessions() -> Result<()> {
        let storage = MemoryStorage::new();
        for suffix in 0..=5 {
            storage.insert(session_file_name(suffix), vec![0; 16]);
        }

        let session = open(&storage)?;
        assert_eq!(session.name(), "ecgses.006");
        assert_eq!(session.next_suffix(), 7);
        Ok(())
    }

    #[test]
    fn frames_follow_header_with_wrapping_counter() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut session = open(&storage)?;
        let payload = [1, 2, 3, 4, 5, 6];

        for i in 0..300u32 {
            session.append_frame(&payload, DeltaTime::new(i * 4))?;
        }
        assert_eq!(session.frames_written(), 300);
        assert_eq!(session.sequence(), (300 % 256) as u8);
        assert_eq!(session.last_delta_time().value(), 299 * 4);
        session.close();

        let bytes = storage.contents("ecgses.000").context("file missing")?;
        let frame_size = FRAME_PREFIX_SIZE + payload.len();
        assert_eq!(bytes.len(), SESSION_HEADER_SIZE + 300 * frame_size);

        for (i, frame) in bytes[SESSION_HEADER_SIZE..].chunks(frame_size).enumerate() {
            assert_eq!(frame[0], (i % 256) as u8, "frame {}", i);
            assert_eq!(&frame[1..5], &((i as u32) * 4).to_be_bytes());
            assert_eq!(&frame[5..8], &[0, 0, 0]);
            assert_eq!(&frame[8..], &payload);
        }
        Ok(())
    }

    #[test]
    fn raw_delta_bytes_pass_through() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut session = open(&storage)?;
        session.append_frame(&[0; 6], DeltaTime::from_wire_bytes([0x78, 0x56, 0x34, 0x12]))?;
        drop(session);

        let bytes = storage.contents("ecgses.000").context("file missing")?;
        let delta = &bytes[SESSION_HEADER_SIZE + 1..SESSION_HEADER_SIZE + 5];
        assert_eq!(delta, &[0x78, 0x56, 0x34, 0x12]);
        Ok(())
    }

    #[test]
    fn every_frame_is_flushed() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut session = open(&storage)?;
        let after_open = storage.flush_count();

        for _ in 0..5 {
            session.append_frame(&[0; 6], DeltaTime::new(0))?;
        }
        assert_eq!(storage.flush_count(), after_open + 5);
        Ok(())
    }

    #[test]
    fn wrong_payload_length_is_rejected() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut session = open(&storage)?;

        let err = session.append_frame(&[0; 5], DeltaTime::new(0)).unwrap_err();
        assert!(matches!(err, RecorderError::PayloadLength { expected: 6, actual: 5 }));
        assert_eq!(session.sequence(), 0);

        let bytes = storage.contents("ecgses.000").context("file missing")?;
        assert_eq!(bytes.len(), SESSION_HEADER_SIZE);
        Ok(())
    }

    #[test]
    fn short_header_write_leaves_partial_file() {
        let storage = MemoryStorage::with_capacity(10);
        let err = open(&storage).unwrap_err();

        match err {
            RecorderError::HeaderWriteIncomplete { name, written, expected } => {
                assert_eq!(name, "ecgses.000");
                assert_eq!(written, 10);
                assert_eq!(expected, SESSION_HEADER_SIZE);
            }
            other => panic!("Expected HeaderWriteIncomplete, got {:?}", other),
        }
        assert_eq!(storage.contents("ecgses.000").map(|b| b.len()), Some(10));
    }

    #[test]
    fn short_frame_write_keeps_prefix_bytes() -> Result<()> {
        let frame_size = FRAME_PREFIX_SIZE + 6;
        let storage = MemoryStorage::with_capacity(SESSION_HEADER_SIZE + frame_size + 5);
        let mut session = open(&storage)?;

        session.append_frame(&[9; 6], DeltaTime::new(1))?;
        let err = session.append_frame(&[9; 6], DeltaTime::new(2)).unwrap_err();
        match err {
            RecorderError::FrameWriteIncomplete { sequence, written, expected } => {
                assert_eq!(sequence, 1);
                assert_eq!(written, 5);
                assert_eq!(expected, frame_size);
            }
            other => panic!("Expected FrameWriteIncomplete, got {:?}", other),
        }
        assert_eq!(session.frames_written(), 1);
        assert_eq!(session.sequence(), 2);
        assert_eq!(session.last_delta_time(), DeltaTime::new(1));

        let bytes = storage.contents("ecgses.000").context("file missing")?;
        assert_eq!(bytes.len(), SESSION_HEADER_SIZE + frame_size + 5);
        assert_eq!(&bytes[SESSION_HEADER_SIZE + frame_size..], &[1, 0, 0, 0, 2]);
        Ok(())
    }

    #[test]
    fn open_failure_is_reported() {
        let storage = MemoryStorage::new();
        storage.reject_opens(true);

        let err = open(&storage).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::StorageOpenFailed { ref name, .. } if name == "ecgses.000"
        ));
    }

    #[test]
    fn oversized_layout_creates_nothing() {
        let storage = MemoryStorage::new();
        let header = SessionHeader::new(0, 2, 250);

        let err = Session::open(&storage, header, usize::MAX / 2 + 1, 0).unwrap_err();
        assert!(matches!(err, RecorderError::Config { .. }));
        let err = Session::open(&storage, header, MAX_PAYLOAD_LEN, 0).unwrap_err();
        assert!(matches!(err, RecorderError::Config { .. }));
        assert!(storage.file_names().is_empty());
    }
}
