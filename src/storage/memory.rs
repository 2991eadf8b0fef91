//! In-memory storage medium
//!
//! Behaves like a small card: files live in a shared map, total capacity can
//! be bounded so writes come back short once the medium fills, and opens can
//! be made to fail. Clones share the same underlying medium, so a test can
//! keep one handle for inspection while a session owns a stream.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{SessionStream, Storage};

#[derive(Debug, Default)]
struct Medium {
    files: BTreeMap<String, Vec<u8>>,
    capacity: Option<usize>,
    used: usize,
    reject_opens: bool,
    flushes: usize,
}

/// Shared in-memory medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    medium: Arc<Mutex<Medium>>,
}

impl MemoryStorage {
    /// Unbounded medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that accepts at most `bytes` bytes across all files.
    pub fn with_capacity(bytes: usize) -> Self {
        let storage = Self::default();
        storage.lock().capacity = Some(bytes);
        storage
    }

    /// Make every subsequent open fail (card removed).
    pub fn reject_opens(&self, reject: bool) {
        self.lock().reject_opens = reject;
    }

    /// Place a file on the medium, as if left by an earlier run.
    pub fn insert(&self, name: impl Into<String>, contents: Vec<u8>) {
        let mut medium = self.lock();
        medium.used += contents.len();
        medium.files.insert(name.into(), contents);
    }

    /// Copy of a file's bytes.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(name).cloned()
    }

    /// Names of all files on the medium, sorted.
    pub fn file_names(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Number of flushes issued against the medium.
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    fn lock(&self) -> MutexGuard<'_, Medium> {
        self.medium.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    fn open_for_append(&self, name: &str) -> io::Result<Box<dyn SessionStream>> {
        let mut medium = self.lock();
        if medium.reject_opens {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "medium unavailable"));
        }
        if medium.files.contains_key(name) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, name.to_string()));
        }
        medium.files.insert(name.to_string(), Vec::new());

        Ok(Box::new(MemoryStream {
            medium: Arc::clone(&self.medium),
            name: name.to_string(),
            open: true,
        }))
    }
}

struct MemoryStream {
    medium: Arc<Mutex<Medium>>,
    name: String,
    open: bool,
}

impl SessionStream for MemoryStream {
    fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        let mut medium = self.medium.lock().unwrap_or_else(PoisonError::into_inner);
        let accepted = match medium.capacity {
            Some(capacity) => bytes.len().min(capacity.saturating_sub(medium.used)),
            None => bytes.len(),
        };
        medium.used += accepted;
        match medium.files.get_mut(&self.name) {
            Some(file) => {
                file.extend_from_slice(&bytes[..accepted]);
                accepted
            }
            None => 0,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.medium.lock().unwrap_or_else(PoisonError::into_inner).flushes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}
