//! Segment Store
//!
//! Positional byte sink underneath a [`super::SegmentChannel`]. The channel owns
//! all buffering and format decisions; a store only writes bytes where it is
//! told and makes them durable on request.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Backing storage of one segment
///
/// ## Invariants
/// - `write_at` either writes every byte or returns an error
/// - after `sync` returns `Ok`, every byte written so far survives a crash
pub trait SegmentStore: Send + fmt::Debug {
    /// Write `data` starting at `offset`
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Durability barrier (fsync)
    fn sync(&mut self) -> io::Result<()>;
}

/// File-backed store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
}

impl FileStore {
    /// Create a new file. Fails if a file already exists at `path`, so an
    /// existing segment is never overwritten.
    pub fn create_new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentStore for FileStore {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.log");

        let _store = FileStore::create_new(&path).unwrap();
        let err = FileStore::create_new(&path).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn write_at_is_positional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.log");

        let mut store = FileStore::create_new(&path).unwrap();
        store.write_at(0, b"hello world").unwrap();
        store.write_at(6, b"WORLD").unwrap();
        store.sync().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello WORLD");
    }
}
