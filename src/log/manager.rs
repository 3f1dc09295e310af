//! Log Manager
//!
//! Owns the current segment and the rotated segments waiting to be forced.
//!
//! ## Responsibilities
//! - Route every append to the single current segment
//! - Rotate before an append would overflow the segment
//! - Keep rotated segments pending until a checkpoint forces them
//! - Notify listeners of new and retired segments

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, SegLogError};
use crate::segment::entry;
use crate::segment::{SegmentAllocator, SegmentChannel, MAX_SEGMENT_OFFSET};
use crate::types::{EntryLocation, SegmentId, StreamId};

use super::SegmentListener;

/// Manages the current segment and the rotated set
///
/// ## Concurrency:
/// - `current`: Mutex, held across routing + write, so appends and rotations
///   are serialized and a channel is never current for two callers
/// - `rotated`: separate Mutex; rotation pushes into it and checkpoint holds
///   it while forcing, so the two exclude each other while appends to the
///   current segment continue
/// - Lock order is always `current` → `rotated`
/// - Listeners are called while the lock that made the change is held, so
///   `segment_created(n)` always precedes `segment_flushed(n)` and each kind
///   arrives in id order
pub struct LogManager {
    allocator: SegmentAllocator,

    /// Soft limit applied when the caller asks for rolling
    segment_size_limit: u64,

    /// Unpersisted bytes that force the current segment (0 = never)
    flush_interval_bytes: u64,

    current: Mutex<Option<Arc<SegmentChannel>>>,

    /// Rotated, not yet forced; oldest first
    rotated: Mutex<Vec<Arc<SegmentChannel>>>,

    listeners: RwLock<Vec<Arc<dyn SegmentListener>>>,

    shut_down: AtomicBool,
}

impl LogManager {
    pub fn new(allocator: SegmentAllocator, config: &Config) -> Self {
        Self {
            allocator,
            segment_size_limit: config.segment_size_limit,
            flush_interval_bytes: config.flush_interval_bytes,
            current: Mutex::new(None),
            rotated: Mutex::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn SegmentListener>) {
        self.listeners.write().push(listener);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append one entry for `stream_id`
    ///
    /// Steps:
    /// 1. Validate the payload (nothing is written for an invalid one)
    /// 2. Allocate a first segment if none exists
    /// 3. Rotate if the entry would overflow the current segment
    /// 4. Buffer the entry and return its location
    pub fn append_entry(
        &self,
        stream_id: StreamId,
        payload: &[u8],
        roll_if_needed: bool,
    ) -> Result<EntryLocation> {
        self.ensure_running()?;
        entry::validate(stream_id, payload)?;
        let incoming = entry::frame_size(payload.len());

        let mut current = self.current.lock();
        self.ensure_running()?;

        let channel = self.channel_for_locked(&mut current, stream_id, incoming, roll_if_needed)?;
        let offset = channel.append_entry(stream_id, payload)?;
        let location = EntryLocation::new(channel.id(), offset);

        // The entry is already in place; a failed force leaves it unpersisted
        // for the next flush or checkpoint to retry and report
        if self.flush_interval_bytes > 0 && channel.unpersisted_bytes() >= self.flush_interval_bytes {
            if let Err(e) = channel.flush_and_force(true) {
                tracing::warn!(
                    segment = %channel.id(),
                    error = %e,
                    "size-triggered force failed, entry stays buffered"
                );
            }
        }

        Ok(location)
    }

    /// Explicit rotation: seal the current segment, move it to the rotated
    /// set, and start a new one. Allocates even if nothing was written yet.
    pub fn create_new_segment(&self, stream_id: StreamId) -> Result<SegmentId> {
        self.ensure_running()?;

        let mut current = self.current.lock();
        self.ensure_running()?;

        let id = self.rotate_locked(&mut current)?.id();
        tracing::debug!(segment = %id, stream = %stream_id, "created new segment on request");
        Ok(id)
    }

    /// The channel an append of `incoming_size` bytes for `stream_id` would
    /// go to. Allocates or rotates exactly as `append_entry` would, but
    /// writes nothing.
    pub fn current_channel_for(
        &self,
        stream_id: StreamId,
        incoming_size: u64,
        roll_if_needed: bool,
    ) -> Result<Arc<SegmentChannel>> {
        self.ensure_running()?;

        let mut current = self.current.lock();
        self.ensure_running()?;
        self.channel_for_locked(&mut current, stream_id, incoming_size, roll_if_needed)
    }

    fn channel_for_locked(
        &self,
        current: &mut Option<Arc<SegmentChannel>>,
        stream_id: StreamId,
        incoming: u64,
        roll_if_needed: bool,
    ) -> Result<Arc<SegmentChannel>> {
        let channel = match current.as_ref().cloned() {
            Some(channel) => channel,
            None => self.install_new_locked(current)?,
        };

        if self.should_roll(&channel, incoming, roll_if_needed) {
            tracing::debug!(
                segment = %channel.id(),
                stream = %stream_id,
                position = channel.position(),
                incoming,
                "rolling segment before overflow"
            );
            return self.rotate_locked(current);
        }

        Ok(channel)
    }

    /// Hard limit always; soft limit only when the caller allows rolling
    fn should_roll(&self, channel: &SegmentChannel, incoming: u64, roll_if_needed: bool) -> bool {
        let end = channel.position().saturating_add(incoming);
        end > MAX_SEGMENT_OFFSET || (roll_if_needed && end > self.segment_size_limit)
    }

    /// Called with `current` locked
    fn rotate_locked(&self, current: &mut Option<Arc<SegmentChannel>>) -> Result<Arc<SegmentChannel>> {
        if let Some(old) = current.take() {
            if let Err(e) = old.seal() {
                tracing::warn!(segment = %old.id(), error = %e, "failed to seal segment, keeping it current");
                *current = Some(old);
                return Err(e);
            }
            tracing::debug!(segment = %old.id(), "segment rotated");
            self.rotated.lock().push(old);
        }

        self.install_new_locked(current)
    }

    /// Called with `current` locked
    fn install_new_locked(&self, current: &mut Option<Arc<SegmentChannel>>) -> Result<Arc<SegmentChannel>> {
        let channel = Arc::new(self.allocator.allocate_next()?);
        *current = Some(Arc::clone(&channel));

        for listener in self.listeners.read().iter() {
            listener.segment_created(channel.id());
        }
        Ok(channel)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Force every rotated segment, oldest first.
    ///
    /// Segments forced before a failure are retired. The failing segment and
    /// the ones after it stay pending for the next attempt. Returns the number
    /// of segments retired.
    pub fn flush_rotated_segments(&self) -> Result<usize> {
        let mut rotated = self.rotated.lock();
        let mut outcome = Ok(());
        let mut forced = 0;

        for channel in rotated.iter() {
            if let Err(e) = channel.flush_and_force(true) {
                tracing::warn!(segment = %channel.id(), error = %e, "failed to force rotated segment");
                outcome = Err(e);
                break;
            }
            forced += 1;
        }

        let listeners = self.listeners.read();
        for channel in rotated.drain(..forced) {
            for listener in listeners.iter() {
                listener.segment_flushed(channel.id());
            }
        }

        outcome.map(|()| forced)
    }

    /// Durability boundary: force and retire every rotated segment
    pub fn checkpoint(&self) -> Result<()> {
        self.ensure_running()?;
        let retired = self.flush_rotated_segments()?;
        tracing::info!(retired, "checkpoint complete");
        Ok(())
    }

    /// Force the current segment, then checkpoint
    pub fn flush(&self) -> Result<()> {
        self.ensure_running()?;

        let current = self.current.lock().clone();
        if let Some(channel) = current {
            channel.flush_and_force(true)?;
        }

        self.checkpoint()
    }

    /// Push the write buffer of `segment_id` to its file if the segment is
    /// still open. Returns whether it was.
    pub fn flush_buffer_of(&self, segment_id: SegmentId) -> Result<bool> {
        let current = self.current.lock().clone();
        if let Some(channel) = current.filter(|channel| channel.id() == segment_id) {
            channel.flush()?;
            return Ok(true);
        }

        let rotated = self
            .rotated
            .lock()
            .iter()
            .find(|channel| channel.id() == segment_id)
            .cloned();
        if let Some(channel) = rotated {
            channel.flush()?;
            return Ok(true);
        }

        Ok(false)
    }

    // =========================================================================
    // Directory Selection
    // =========================================================================

    /// Directory the next segment would be placed in, chosen from
    /// `candidates` as given
    pub fn select_directory_for_next_segment(&self, candidates: &[PathBuf]) -> Result<PathBuf> {
        self.allocator.select_directory(candidates, self.allocator.next_id())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Seal the current segment and close every open channel.
    ///
    /// Every channel is closed even if an earlier one fails; the first error
    /// is returned. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let current = self.current.lock().take();
        let rotated: Vec<Arc<SegmentChannel>> = self.rotated.lock().drain(..).collect();
        let mut first_error: Option<SegLogError> = None;

        if let Some(channel) = &current {
            if let Err(e) = channel.seal() {
                tracing::warn!(segment = %channel.id(), error = %e, "failed to seal segment on shutdown");
                first_error.get_or_insert(e);
            }
        }

        for channel in rotated.iter().chain(current.iter()) {
            if let Err(e) = channel.close() {
                tracing::warn!(segment = %channel.id(), error = %e, "failed to close segment on shutdown");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(closed = rotated.len() + current.iter().count(), "log manager shut down");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(SegLogError::ShutDown);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Id of the current segment, `UNINITIALIZED` before the first allocation
    pub fn current_segment_id(&self) -> SegmentId {
        self.current
            .lock()
            .as_ref()
            .map(|channel| channel.id())
            .unwrap_or(SegmentId::UNINITIALIZED)
    }

    pub fn rotated_count(&self) -> usize {
        self.rotated.lock().len()
    }

    pub fn rotated_segment_ids(&self) -> Vec<SegmentId> {
        self.rotated.lock().iter().map(|channel| channel.id()).collect()
    }

    pub fn allocator(&self) -> &SegmentAllocator {
        &self.allocator
    }

    /// Make `channel` current, moving the previous current channel into the
    /// rotated set as-is
    #[cfg(test)]
    pub(crate) fn set_current_and_rotate(&self, channel: Arc<SegmentChannel>) {
        let mut current = self.current.lock();
        if let Some(old) = current.replace(channel) {
            self.rotated.lock().push(old);
        }
    }
}
