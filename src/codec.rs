//! Byte-order conversion between host order and the session wire order.
//!
//! All multi-byte header fields in a session file are big-endian. The
//! `to_wire*` functions return a value whose in-memory bytes are the wire
//! bytes, so `to_wire16(x).to_ne_bytes()` always equals `x.to_be_bytes()`
//! regardless of the host the recorder runs on.

use crate::{RecorderError, Result};

/// Convert a host-order `u16` into wire (big-endian) order.
#[inline]
pub const fn to_wire16(value: u16) -> u16 {
    value.to_be()
}

/// Convert a host-order `u64` into wire (big-endian) order.
#[inline]
pub const fn to_wire64(value: u64) -> u64 {
    value.to_be()
}

/// Convert a wire-order `u16` back into host order.
#[inline]
pub const fn from_wire16(value: u16) -> u16 {
    u16::from_be(value)
}

/// Convert a wire-order `u64` back into host order.
#[inline]
pub const fn from_wire64(value: u64) -> u64 {
    u64::from_be(value)
}

/// Read a big-endian `u16` at `offset` with bounds checking.
pub fn read_u16_be(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = read_array::<2>(data, offset, "u16")?;
    Ok(u16::from_be_bytes(bytes))
}

/// Read a big-endian `u32` at `offset` with bounds checking.
pub fn read_u32_be(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = read_array::<4>(data, offset, "u32")?;
    Ok(u32::from_be_bytes(bytes))
}

/// Read a big-endian `u64` at `offset` with bounds checking.
pub fn read_u64_be(data: &[u8], offset: usize) -> Result<u64> {
    let bytes = read_array::<8>(data, offset, "u64")?;
    Ok(u64::from_be_bytes(bytes))
}

fn read_array<const N: usize>(data: &[u8], offset: usize, what: &str) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or_else(|| {
            RecorderError::parse(
                "Integer parsing",
                format!(
                    "Insufficient data for {} at offset {} (need {} bytes, have {})",
                    what,
                    offset,
                    N,
                    data.len().saturating_sub(offset)
                ),
            )
        })
}
