//! Session file format structures
//!
//! ## Session File Structure
//!
//! 1. **Session Header** (16 bytes) - written once, first in the file
//! 2. **Frames** - fixed-size records appended one per sampling period
//!
//! ```text
//! offset 0:  2 bytes  magic            (0xEC 0x09)
//! offset 2:  1 byte   format_epoch     (0x00)
//! offset 3:  1 byte   reserved         (0x00)
//! offset 4:  2 bytes  sample_frequency (big-endian)
//! offset 6:  2 bytes  channel_count    (big-endian)
//! offset 8:  8 bytes  start_timestamp  (big-endian)
//! -- repeated --
//! +0: 1 byte  sequence_counter (mod 256)
//! +1: 4 bytes delta_time
//! +5: 3 bytes reserved (0x00)
//! +8: M bytes sample_payload
//! ```
//!
//! Frames carry no length field: every frame in a session has the same size,
//! derived from the channel count in the header and the per-channel sample
//! width the device was built with.

use crate::codec::{read_u16_be, read_u64_be, to_wire16, to_wire64};
use crate::{RecorderError, Result};

/// Format family marker at the start of every session file.
pub const SESSION_MAGIC: [u8; 2] = [0xec, 0x09];
/// Current format epoch.
pub const FORMAT_EPOCH: u8 = 0x00;
/// Size of the session header in bytes.
pub const SESSION_HEADER_SIZE: usize = 16;
/// Size of the per-frame prefix preceding the sample payload.
pub const FRAME_PREFIX_SIZE: usize = 8;
/// Largest sample payload a frame may carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Header written once at the start of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHeader {
    /// Samples per second on every channel.
    pub sample_frequency: u16,
    /// Number of simultaneously sampled channels.
    pub channel_count: u16,
    /// Session start time, device-defined epoch.
    pub start_timestamp: u64,
}

impl SessionHeader {
    pub fn new(start_timestamp: u64, channel_count: u16, sample_frequency: u16) -> Self {
        Self { sample_frequency, channel_count, start_timestamp }
    }

    /// Encode into the 16 wire bytes.
    pub fn encode(&self) -> [u8; SESSION_HEADER_SIZE] {
        let mut buf = [0u8; SESSION_HEADER_SIZE];
        buf[0..2].copy_from_slice(&SESSION_MAGIC);
        buf[2] = FORMAT_EPOCH;
        buf[3] = 0x00;
        buf[4..6].copy_from_slice(&to_wire16(self.sample_frequency).to_ne_bytes());
        buf[6..8].copy_from_slice(&to_wire16(self.channel_count).to_ne_bytes());
        buf[8..16].copy_from_slice(&to_wire64(self.start_timestamp).to_ne_bytes());
        buf
    }

    /// Parse and validate a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SESSION_HEADER_SIZE {
            return Err(RecorderError::parse(
                "Session header reading",
                format!(
                    "Need {} header bytes, file has {}",
                    SESSION_HEADER_SIZE,
                    data.len()
                ),
            ));
        }

        if data[0..2] != SESSION_MAGIC {
            return Err(RecorderError::parse(
                "Session header validation",
                format!("Bad magic {:02x} {:02x}", data[0], data[1]),
            ));
        }

        if data[2] != FORMAT_EPOCH {
            return Err(RecorderError::parse(
                "Session header validation",
                format!("Unsupported format epoch {}", data[2]),
            ));
        }

        Ok(Self {
            sample_frequency: read_u16_be(data, 4)?,
            channel_count: read_u16_be(data, 6)?,
            start_timestamp: read_u64_be(data, 8)?,
        })
    }
}

/// Size of one frame, fixed for the lifetime of a session.
///
/// Built through [`FrameLayout::new`], which bounds the payload so the size
/// arithmetic cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    channel_count: u16,
    sample_width: usize,
}

impl FrameLayout {
    /// Layout for `channel_count` samples of `sample_width` bytes each.
    ///
    /// # Errors
    ///
    /// [`RecorderError::Config`] when the payload would exceed
    /// [`MAX_PAYLOAD_LEN`].
    pub fn new(channel_count: u16, sample_width: usize) -> Result<Self> {
        match usize::from(channel_count).checked_mul(sample_width) {
            Some(payload_len) if payload_len <= MAX_PAYLOAD_LEN => {
                Ok(Self { channel_count, sample_width })
            }
            _ => Err(RecorderError::config(format!(
                "{} channels of {} bytes exceed the {} byte frame payload limit",
                channel_count, sample_width, MAX_PAYLOAD_LEN
            ))),
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Bytes per channel sample.
    pub fn sample_width(&self) -> usize {
        self.sample_width
    }

    /// Bytes of sample payload in each frame.
    pub fn payload_len(&self) -> usize {
        usize::from(self.channel_count) * self.sample_width
    }

    /// Total bytes of each frame on the medium.
    pub fn frame_size(&self) -> usize {
        FRAME_PREFIX_SIZE + self.payload_len()
    }
}

/// Time since session start as the four bytes stored in a frame.
///
/// [`DeltaTime::new`] encodes a numeric value big-endian, matching the header
/// fields. [`DeltaTime::from_wire_bytes`] stores caller-prepared bytes
/// verbatim, for sources that already produce wire-order timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaTime([u8; 4]);

impl DeltaTime {
    pub fn new(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn from_wire_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn wire_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Numeric value, reading the bytes as big-endian.
    pub fn value(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl From<u32> for DeltaTime {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// Encode one frame into `buf`, which must be exactly `layout.frame_size()` long.
pub(crate) fn encode_frame(buf: &mut [u8], sequence: u8, delta_time: DeltaTime, payload: &[u8]) {
    buf[0] = sequence;
    buf[1..5].copy_from_slice(&delta_time.wire_bytes());
    buf[5..FRAME_PREFIX_SIZE].fill(0);
    buf[FRAME_PREFIX_SIZE..].copy_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn header_layout_matches_wire_format(
            timestamp in any::<u64>(),
            channels in any::<u16>(),
            frequency in any::<u16>(),
        ) {
            let bytes = SessionHeader::new(timestamp, channels, frequency).encode();

            prop_assert_eq!(&bytes[0..2], &SESSION_MAGIC);
            prop_assert_eq!(bytes[2], 0);
            prop_assert_eq!(bytes[3], 0);
            prop_assert_eq!(&bytes[4..6], &frequency.to_be_bytes());
            prop_assert_eq!(&bytes[6..8], &channels.to_be_bytes());
            prop_assert_eq!(&bytes[8..16], &timestamp.to_be_bytes());

            let parsed = SessionHeader::parse(&bytes).unwrap();
            prop_assert_eq!(parsed, SessionHeader::new(timestamp, channels, frequency));
        }
    }

    #[test]
    fn header_bytes_for_known_session() {
        let header = SessionHeader::new(0x0000_0001_6f2a_9b00, 8, 500);
        assert_eq!(
            header.encode(),
            [
                0xec, 0x09, 0x00, 0x00, 0x01, 0xf4, 0x00, 0x08,
                0x00, 0x00, 0x00, 0x01, 0x6f, 0x2a, 0x9b, 0x00,
            ]
        );
    }

    #[test]
    fn parse_rejects_bad_magic_and_epoch() {
        let mut bytes = SessionHeader::new(1, 2, 3).encode();
        bytes[0] = 0xff;
        assert!(matches!(SessionHeader::parse(&bytes), Err(RecorderError::Parse { .. })));

        let mut bytes = SessionHeader::new(1, 2, 3).encode();
        bytes[2] = 1;
        assert!(matches!(SessionHeader::parse(&bytes), Err(RecorderError::Parse { .. })));
    }

    #[test]
    fn parse_rejects_truncated_header() {
        let bytes = SessionHeader::new(1, 2, 3).encode();
        assert!(matches!(SessionHeader::parse(&bytes[..10]), Err(RecorderError::Parse { .. })));
    }

    #[test]
    fn layout_sizes() -> Result<()> {
        let layout = FrameLayout::new(8, 3)?;
        assert_eq!((layout.channel_count(), layout.sample_width()), (8, 3));
        assert_eq!(layout.payload_len(), 24);
        assert_eq!(layout.frame_size(), 32);

        assert_eq!(FrameLayout::new(0, 3)?.frame_size(), FRAME_PREFIX_SIZE);
        assert_eq!(FrameLayout::new(1, MAX_PAYLOAD_LEN)?.payload_len(), MAX_PAYLOAD_LEN);
        Ok(())
    }

    #[test]
    fn oversized_layouts_are_rejected() {
        let rejected = |channels, width| {
            matches!(FrameLayout::new(channels, width), Err(RecorderError::Config { .. }))
        };
        assert!(rejected(2, usize::MAX / 2 + 1));
        assert!(rejected(u16::MAX, usize::MAX));
        assert!(rejected(2, MAX_PAYLOAD_LEN));
        assert!(rejected(1, MAX_PAYLOAD_LEN + 1));
    }

    #[test]
    fn delta_time_encodings() {
        assert_eq!(DeltaTime::new(0x0102_0304).wire_bytes(), [1, 2, 3, 4]);
        assert_eq!(DeltaTime::from_wire_bytes([4, 3, 2, 1]).wire_bytes(), [4, 3, 2, 1]);
        assert_eq!(DeltaTime::from(250).value(), 250);
    }

    #[test]
    fn frame_encoding_zeroes_reserved_bytes() {
        let mut buf = [0xaa; 12];
        encode_frame(&mut buf, 9, DeltaTime::new(2), &[7, 7, 7, 7]);
        assert_eq!(buf, [9, 0, 0, 0, 2, 0, 0, 0, 7, 7, 7, 7]);
    }
}
