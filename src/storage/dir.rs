//! Directory-backed storage (mounted card or host filesystem)

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{SessionStream, Storage};

/// Session files stored as plain files in one directory.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Use `root` as the medium's file namespace.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// Directory holding the session files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a session file name.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for DirStorage {
    fn exists(&self, name: &str) -> bool {
        self.path_of(name).exists()
    }

    fn open_for_append(&self, name: &str) -> io::Result<Box<dyn SessionStream>> {
        let path = self.path_of(name);
        let file = OpenOptions::new().append(true).create_new(true).open(&path)?;
        debug!("Created session file {}", path.display());
        Ok(Box::new(FileStream { file: Some(file), path }))
    }
}

/// Stream over one created session file.
struct FileStream {
    file: Option<File>,
    path: PathBuf,
}

impl SessionStream for FileStream {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };

        let mut written = 0;
        while written < bytes.len() {
            match file.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Write to {} failed after {} bytes: {}", self.path.display(), written, e);
                    break;
                }
            }
        }
        written
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => {
                file.flush()?;
                file.sync_data()
            }
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                warn!("Sync on close of {} failed: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        self.close();
    }
}
