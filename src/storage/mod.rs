//! Storage medium abstraction
//!
//! The recorder consumes the removable medium through two narrow traits:
//! [`Storage`] for name lookup and file creation, and [`SessionStream`] for
//! the append-only stream a session writes into. Medium bring-up (SPI, card
//! init, mounting) happens outside this crate.

pub mod dir;
pub mod memory;

pub use dir::DirStorage;
pub use memory::MemoryStorage;

use std::io;

/// A storage medium holding session files.
pub trait Storage {
    /// Whether a file with this name already exists on the medium.
    fn exists(&self, name: &str) -> bool;

    /// Create `name` for exclusive appending.
    fn open_for_append(&self, name: &str) -> io::Result<Box<dyn SessionStream>>;
}

/// Append-only output stream owned by a single session.
pub trait SessionStream: Send {
    /// Write as much of `bytes` as the medium accepts, returning the count.
    ///
    /// A count lower than `bytes.len()` means the medium stopped accepting
    /// data (full card, removal, I/O fault). The bytes that were accepted
    /// stay on the medium.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Push buffered bytes down to the medium.
    fn flush(&mut self) -> io::Result<()>;

    /// Release the stream. Best effort; further writes are invalid.
    fn close(&mut self);
}
