//! Engine Module
//!
//! The entry point external callers use.
//!
//! ## Responsibilities
//! - Append entries and hand back their locations
//! - Read entries back by location
//! - Extract per-segment metadata for space reclamation
//! - Track which segments are durable
//! - Release every open file on shutdown

use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::dirs::{SegmentDirs, StaticDirs};
use crate::error::{Result, SegLogError};
use crate::log::{LogManager, RecentSegmentsStatus, SegmentListener};
use crate::metadata::{MetadataExtractor, SegmentMetadata};
use crate::segment::SegmentAllocator;
use crate::types::{EntryLocation, SegmentId, StreamId};

/// The log engine
///
/// ## Concurrency Model
///
/// - **Appends / rotations**: serialized inside the `LogManager`
/// - **Checkpoints**: exclusive with rotations, concurrent with appends
/// - **Reads / metadata extraction**: open their own file handles; the
///   segment's write buffer is pushed to the file first so buffered entries
///   are visible
pub struct LogEngine {
    /// Engine configuration
    config: Config,

    /// Current + rotated segments
    manager: LogManager,

    /// Reads segment files
    extractor: MetadataExtractor,

    /// Which recent segments are durable
    recent: Arc<RecentSegmentsStatus>,
}

impl LogEngine {
    /// Open an engine over the configured directories
    ///
    /// On startup:
    /// 1. Create every segment directory
    /// 2. Recover the last allocated segment id
    /// 3. Ready to append (the first segment is created lazily)
    pub fn open(config: Config) -> Result<Self> {
        let dirs = StaticDirs::new(config.segment_dirs.clone())?;
        Self::open_with_dirs(config, Arc::new(dirs))
    }

    /// Open with a caller-provided directory selector
    pub fn open_with_dirs(config: Config, dirs: Arc<dyn SegmentDirs>) -> Result<Self> {
        let allocator = SegmentAllocator::open(Arc::clone(&dirs), config.write_buffer_capacity)?;
        let recent = Arc::new(RecentSegmentsStatus::new(allocator.next_id()));

        let manager = LogManager::new(allocator, &config);
        manager.register_listener(recent.clone());

        tracing::info!(
            dirs = config.segment_dirs.len(),
            next_segment = %manager.allocator().next_id(),
            "log engine opened"
        );

        Ok(Self {
            config,
            manager,
            extractor: MetadataExtractor::new(dirs),
            recent,
        })
    }

    /// Register a listener for segment creation and retirement
    pub fn register_listener(&self, listener: Arc<dyn SegmentListener>) {
        self.manager.register_listener(listener);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append an entry payload for `stream_id`
    ///
    /// The payload must start with its stream id and sequence number (see
    /// [`crate::segment::entry::encode_payload`]). Listeners hear about any
    /// segment created by this call before it returns.
    pub fn append(
        &self,
        stream_id: StreamId,
        payload: &[u8],
        roll_if_needed: bool,
    ) -> Result<EntryLocation> {
        self.manager.append_entry(stream_id, payload, roll_if_needed)
    }

    /// Rotate to a new segment
    pub fn create_new_segment(&self, stream_id: StreamId) -> Result<SegmentId> {
        self.manager.create_new_segment(stream_id)
    }

    /// Force and retire every rotated segment
    pub fn checkpoint(&self) -> Result<()> {
        self.manager.checkpoint()
    }

    /// Force the current segment and checkpoint
    pub fn flush(&self) -> Result<()> {
        self.manager.flush()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read back the payload at `location`, checking it belongs to
    /// `stream_id`/`sequence`
    pub fn read_entry(
        &self,
        stream_id: StreamId,
        sequence: u64,
        location: EntryLocation,
    ) -> Result<Bytes> {
        self.ensure_running()?;
        self.manager.flush_buffer_of(location.segment_id)?;
        self.extractor.read_entry(stream_id, sequence, location)
    }

    /// Streams in `segment_id` and the bytes each contributed
    ///
    /// Returns `SegmentNotFound` if the segment was never created.
    pub fn extract_metadata(&self, segment_id: SegmentId) -> Result<SegmentMetadata> {
        self.ensure_running()?;
        self.manager.flush_buffer_of(segment_id)?;
        self.extractor.extract(segment_id)
    }

    /// Like `extract_metadata`, but only from the segment's index region
    pub fn extract_metadata_from_index(&self, segment_id: SegmentId) -> Result<SegmentMetadata> {
        self.ensure_running()?;
        self.extractor.extract_from_index(segment_id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Seal the current segment and close every open file. Safe to call more
    /// than once and after earlier failures.
    pub fn shutdown(&self) -> Result<()> {
        self.manager.shutdown()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.manager.is_shut_down() {
            return Err(SegLogError::ShutDown);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Id of the current segment, `UNINITIALIZED` before the first append
    pub fn current_segment_id(&self) -> SegmentId {
        self.manager.current_segment_id()
    }

    /// Lowest segment id that may still hold unforced data
    pub fn least_unflushed_segment_id(&self) -> SegmentId {
        self.recent.least_unflushed()
    }

    pub fn is_segment_flushed(&self, segment_id: SegmentId) -> bool {
        self.recent.is_flushed(segment_id)
    }

    /// Number of rotated segments waiting for a checkpoint
    pub fn pending_segment_count(&self) -> usize {
        self.manager.rotated_count()
    }

    pub fn manager(&self) -> &LogManager {
        &self.manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for LogEngine {
    fn drop(&mut self) {
        if let Err(e) = self.manager.shutdown() {
            tracing::error!(error = %e, "log engine shutdown on drop failed");
        }
    }
}
