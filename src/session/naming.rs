//! Session filename allocation
//!
//! Session files are named `ecgses.XXX`, where `XXX` is a three-digit
//! lowercase hex suffix in `0x000..=0xfff`. Allocation takes the first unused
//! name at or above a starting suffix, so consecutive sessions on one card
//! get ascending names.

use tracing::{debug, trace};

use crate::storage::Storage;
use crate::{RecorderError, Result};

/// Stem shared by all session files.
pub const SESSION_FILE_STEM: &str = "ecgses";
/// Largest valid suffix.
pub const MAX_SUFFIX: u16 = 0xfff;

/// A chosen session filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub name: String,
    pub suffix: u16,
    /// Where the next search should start.
    pub next_suffix: u16,
}

/// Filename for a suffix, e.g. `ecgses.00a`.
pub fn session_file_name(suffix: u16) -> String {
    format!("{}.{:03x}", SESSION_FILE_STEM, suffix)
}

/// Parse the suffix back out of a session filename.
pub fn parse_session_suffix(name: &str) -> Option<u16> {
    let hex = name.strip_prefix(SESSION_FILE_STEM)?.strip_prefix('.')?;
    if hex.len() != 3 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// Find the first unused session filename at or above `base_suffix`.
///
/// `next_suffix` of the result is one past the chosen suffix. When the
/// chosen suffix is the last one, `next_suffix` is `0x1000`, which makes the
/// next allocation fail without probing the medium.
pub fn allocate_file_name<S: Storage + ?Sized>(
    storage: &S,
    base_suffix: u16,
) -> Result<Allocation> {
    for suffix in base_suffix..=MAX_SUFFIX {
        let name = session_file_name(suffix);
        if storage.exists(&name) {
            trace!("Session file {} already exists", name);
            continue;
        }
        debug!("Allocated session file {}", name);
        return Ok(Allocation { name, suffix, next_suffix: suffix + 1 });
    }

    Err(RecorderError::NoFilenameAvailable { base_suffix })
}
