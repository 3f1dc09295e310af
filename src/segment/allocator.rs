//! Segment Allocator
//!
//! Creates new segment files and hands out their ids.
//!
//! ## Responsibilities
//! - Discover the highest id already on disk at startup
//! - Assign strictly increasing ids, never reusing one
//! - Pick a directory round-robin among the writable candidates
//! - Create the file and its header

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dirs::{self, SegmentDirs};
use crate::error::{Result, SegLogError};
use crate::types::SegmentId;

use super::{parse_segment_id, segment_path, SegmentChannel, LAST_ID_FILENAME};

/// Allocates segments across a set of directories
///
/// ## Concurrency:
/// - `last_allocated`: Mutex, held for the whole allocation so two callers
///   never see the same id
pub struct SegmentAllocator {
    dirs: Arc<dyn SegmentDirs>,
    write_buffer_capacity: usize,
    /// Highest id handed out so far (`UNINITIALIZED` if none)
    last_allocated: Mutex<SegmentId>,
}

impl SegmentAllocator {
    /// Open an allocator over `dirs`
    ///
    /// On startup:
    /// 1. Scan every directory for segment files
    /// 2. Read every `lastId` marker
    /// 3. Continue after the highest id found
    pub fn open(dirs: Arc<dyn SegmentDirs>, write_buffer_capacity: usize) -> Result<Self> {
        let mut highest: Option<u64> = None;

        for dir in dirs.all_dirs() {
            if !dir.is_dir() {
                continue;
            }

            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if let Some(id) = parse_segment_id(&path) {
                    highest = highest.max(Some(id.get()));
                }
            }

            if let Some(id) = Self::read_last_id(&dir)? {
                highest = highest.max(Some(id));
            }
        }

        let last = highest.map(SegmentId::new).unwrap_or(SegmentId::UNINITIALIZED);
        if !last.is_uninitialized() {
            tracing::info!(last_segment = %last, "recovered segment ids");
        }

        Ok(Self {
            dirs,
            write_buffer_capacity,
            last_allocated: Mutex::new(last),
        })
    }

    /// Highest id allocated so far
    pub fn last_allocated(&self) -> SegmentId {
        *self.last_allocated.lock()
    }

    /// Id the next allocation will use
    pub fn next_id(&self) -> SegmentId {
        self.last_allocated.lock().next()
    }

    /// Allocate the next segment in sequence
    pub fn allocate_next(&self) -> Result<SegmentChannel> {
        let mut last = self.last_allocated.lock();
        let next_id = last.next();
        self.create(&mut last, next_id)
    }

    /// Allocate segment `next_id`. It must be above every id handed out so far.
    pub fn allocate(&self, next_id: SegmentId) -> Result<SegmentChannel> {
        let mut last = self.last_allocated.lock();
        if !last.is_uninitialized() && next_id <= *last {
            return Err(SegLogError::AllocationFailure(format!(
                "segment {} is not above the last allocated segment {}",
                next_id, *last
            )));
        }
        self.create(&mut last, next_id)
    }

    /// Directory for segment `next_id` among `candidates`
    pub fn select_directory(&self, candidates: &[PathBuf], next_id: SegmentId) -> Result<PathBuf> {
        dirs::select_dir(candidates, next_id.get())
    }

    /// Called with `last_allocated` locked. Once the `lastId` marker names
    /// `id`, the id is spent even if creating the file fails.
    fn create(&self, last: &mut SegmentId, id: SegmentId) -> Result<SegmentChannel> {
        if id.is_uninitialized() {
            return Err(SegLogError::AllocationFailure(
                "segment id space exhausted".to_string(),
            ));
        }

        let dir = self.select_directory(&self.dirs.writable_dirs(), id)?;

        // Marker first: a crash after it can skip an id, never repeat one
        Self::write_last_id(&dir, id)?;
        *last = id;

        let path = segment_path(&dir, id);
        let channel = SegmentChannel::create(id, &path, self.write_buffer_capacity)?;

        tracing::debug!(segment = %id, path = %path.display(), "allocated segment");
        Ok(channel)
    }

    fn read_last_id(dir: &Path) -> Result<Option<u64>> {
        let path = dir.join(LAST_ID_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match u64::from_str_radix(content.trim(), 16) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable lastId marker");
                Ok(None)
            }
        }
    }

    fn write_last_id(dir: &Path, id: SegmentId) -> Result<()> {
        fs::write(dir.join(LAST_ID_FILENAME), format!("{:x}", id.get()))?;
        Ok(())
    }
}
