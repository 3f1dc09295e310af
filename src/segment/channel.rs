//! Segment Channel
//!
//! Buffered, position-tracked writer for one segment file.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::error::{Result, SegLogError};
use crate::metadata::{index, SegmentMetadata};
use crate::types::{SegmentId, StreamId};

use super::entry;
use super::{FileStore, SegmentHeader, SegmentStore, HEADER_SIZE};

/// Writer for one segment
///
/// ## Concurrency:
/// - All state sits behind one `Mutex`; every method takes `&self`
/// - The log manager serializes appends; the lock only guards against a
///   checkpoint forcing a channel while another thread still reads its position
///
/// ## Lifecycle:
/// - created with a header, accepts appends while current
/// - `seal()` writes the index region and patches the header (rotation)
/// - `close()` forces everything and releases the backing store
#[derive(Debug)]
pub struct SegmentChannel {
    id: SegmentId,
    path: PathBuf,
    inner: Mutex<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
    /// `None` once the channel is closed
    store: Option<Box<dyn SegmentStore>>,
    /// Bytes appended but not yet handed to the store
    buffer: BytesMut,
    capacity: usize,
    /// Bytes already handed to the store
    file_position: u64,
    /// Bytes appended since the last successful force
    unpersisted: u64,
    /// Running per-stream sizes of the entries written so far
    metadata: SegmentMetadata,
    sealed: bool,
}

impl SegmentChannel {
    /// Create a new segment file at `path` and write its header
    pub fn create(id: SegmentId, path: &Path, write_buffer_capacity: usize) -> Result<Self> {
        let store = FileStore::create_new(path)?;
        Self::with_store(id, path, Box::new(store), write_buffer_capacity)
    }

    /// Build a channel on top of any store. The header is written immediately.
    pub fn with_store(
        id: SegmentId,
        path: &Path,
        mut store: Box<dyn SegmentStore>,
        write_buffer_capacity: usize,
    ) -> Result<Self> {
        store.write_at(0, &SegmentHeader::unsealed().encode())?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            inner: Mutex::new(ChannelInner {
                store: Some(store),
                buffer: BytesMut::with_capacity(write_buffer_capacity),
                capacity: write_buffer_capacity,
                file_position: HEADER_SIZE,
                unpersisted: HEADER_SIZE,
                metadata: SegmentMetadata::new(id),
                sealed: false,
            }),
        })
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset the next append will start at
    pub fn position(&self) -> u64 {
        self.inner.lock().position()
    }

    /// Append raw bytes; returns the offset they start at
    pub fn append(&self, data: &[u8]) -> Result<u64> {
        let mut inner = self.inner.lock();
        inner.ensure_writable(self.id)?;
        inner.append(data)
    }

    /// Frame and append one entry payload, accounting it to `stream_id`.
    /// Returns the offset of the frame.
    pub fn append_entry(&self, stream_id: StreamId, payload: &[u8]) -> Result<u64> {
        let frame = entry::encode_frame(payload);

        let mut inner = self.inner.lock();
        inner.ensure_writable(self.id)?;
        let offset = inner.append(&frame)?;
        inner.metadata.add_stream_size(stream_id, frame.len() as u64);
        Ok(offset)
    }

    /// Hand buffered bytes to the store without a durability barrier
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush_buffer()
    }

    /// Hand buffered bytes to the store; with `force` also sync the store.
    /// Errors are returned as-is, nothing is retried here.
    pub fn flush_and_force(&self, force: bool) -> Result<()> {
        self.inner.lock().flush_and_force(force)
    }

    /// Bytes appended since the last successful force
    pub fn unpersisted_bytes(&self) -> u64 {
        self.inner.lock().unpersisted
    }

    /// Snapshot of the per-stream sizes written so far
    pub fn metadata(&self) -> SegmentMetadata {
        self.inner.lock().metadata.clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().store.is_none()
    }

    /// Write the index region and point the header at it.
    ///
    /// After a successful seal the channel rejects further appends. A failed
    /// seal leaves the channel writable at its previous position.
    pub fn seal(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Ok(());
        }
        inner.ensure_writable(self.id)?;
        inner.flush_buffer()?;

        let (region, crc) = index::encode(&inner.metadata)?;
        let index_offset = inner.file_position;
        inner.write_through(&region)?;

        let header = SegmentHeader {
            index_offset,
            index_len: region.len() as u32,
            index_crc: crc,
        };
        let patched = inner.store_mut()?.write_at(0, &header.encode_fields());
        if let Err(e) = patched {
            // The region is overwritten by the next append
            inner.file_position = index_offset;
            return Err(e.into());
        }

        inner.unpersisted += region.len() as u64;
        inner.sealed = true;
        tracing::debug!(
            segment = %self.id,
            streams = inner.metadata.stream_count(),
            index_offset,
            "sealed segment"
        );
        Ok(())
    }

    /// Force everything and release the backing store. The store is released
    /// even when the final force fails.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.store.is_none() {
            return Ok(());
        }
        let result = if inner.unpersisted > 0 {
            inner.flush_and_force(true)
        } else {
            Ok(())
        };
        inner.store = None;
        result
    }
}

impl ChannelInner {
    fn position(&self) -> u64 {
        self.file_position + self.buffer.len() as u64
    }

    fn store_mut(&mut self) -> Result<&mut Box<dyn SegmentStore>> {
        self.store.as_mut().ok_or(SegLogError::ShutDown)
    }

    fn ensure_writable(&self, id: SegmentId) -> Result<()> {
        if self.store.is_none() {
            return Err(SegLogError::ShutDown);
        }
        if self.sealed {
            return Err(SegLogError::InvalidEntry(format!(
                "segment {} is sealed",
                id
            )));
        }
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.position();

        if self.buffer.len() + data.len() > self.capacity {
            self.flush_buffer()?;
        }

        // Writes that would not fit an empty buffer bypass it
        if data.len() >= self.capacity {
            self.write_through(data)?;
        } else {
            self.buffer.extend_from_slice(data);
        }

        self.unpersisted += data.len() as u64;
        Ok(offset)
    }

    fn write_through(&mut self, data: &[u8]) -> Result<()> {
        let position = self.file_position;
        self.store_mut()?.write_at(position, data)?;
        self.file_position += data.len() as u64;
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let position = self.file_position;
        let store = self.store.as_mut().ok_or(SegLogError::ShutDown)?;
        store.write_at(position, &self.buffer)?;

        self.file_position += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn flush_and_force(&mut self, force: bool) -> Result<()> {
        self.flush_buffer()?;

        if force {
            self.store_mut()?.sync()?;
            self.unpersisted = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::testing::memory_channel;
    use std::sync::atomic::Ordering;

    #[test]
    fn appends_start_after_header() {
        let (channel, _store) = memory_channel(0, 64);

        assert_eq!(channel.position(), HEADER_SIZE);
        assert_eq!(channel.append(b"abc").unwrap(), HEADER_SIZE);
        assert_eq!(channel.append(b"de").unwrap(), HEADER_SIZE + 3);
        assert_eq!(channel.position(), HEADER_SIZE + 5);
    }

    #[test]
    fn small_appends_stay_buffered_until_flush() {
        let (channel, store) = memory_channel(0, 64);

        channel.append(b"abc").unwrap();
        assert_eq!(store.data.lock().len(), HEADER_SIZE as usize);

        channel.flush().unwrap();
        assert_eq!(&store.data.lock()[HEADER_SIZE as usize..], b"abc");
    }

    #[test]
    fn large_appends_bypass_the_buffer() {
        let (channel, store) = memory_channel(0, 8);

        channel.append(b"ab").unwrap();
        channel.append(&[7u8; 16]).unwrap();

        let data = store.data.lock();
        assert_eq!(data.len(), HEADER_SIZE as usize + 18);
        assert_eq!(&data[HEADER_SIZE as usize..HEADER_SIZE as usize + 2], b"ab");
    }

    #[test]
    fn force_resets_unpersisted_bytes() {
        let (channel, store) = memory_channel(0, 64);

        channel.append(b"abc").unwrap();
        assert!(channel.unpersisted_bytes() >= 3);

        channel.flush_and_force(true).unwrap();
        assert_eq!(channel.unpersisted_bytes(), 0);
        assert_eq!(store.syncs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn force_failure_propagates() {
        let (channel, store) = memory_channel(0, 64);
        store.fail_sync.store(true, Ordering::SeqCst);

        let err = channel.flush_and_force(true).unwrap_err();
        assert!(err.is_io());

        // No barrier requested, nothing to fail
        channel.flush_and_force(false).unwrap();
    }

    #[test]
    fn entries_are_accounted_per_stream() {
        let (channel, _store) = memory_channel(0, 64);
        let payload = entry::encode_payload(StreamId::new(4), 1, b"data");

        channel.append_entry(StreamId::new(4), &payload).unwrap();

        let meta = channel.metadata();
        assert_eq!(
            meta.stream_size(StreamId::new(4)),
            Some(entry::frame_size(payload.len()))
        );
    }

    #[test]
    fn sealed_channel_rejects_appends() {
        let (channel, store) = memory_channel(3, 64);
        let payload = entry::encode_payload(StreamId::new(1), 1, b"x");
        channel.append_entry(StreamId::new(1), &payload).unwrap();

        channel.seal().unwrap();
        assert!(channel.is_sealed());
        assert!(channel.append(b"more").is_err());

        let header = SegmentHeader::decode(&store.data.lock()).unwrap();
        assert!(header.has_index());
        assert_eq!(header.index_offset, HEADER_SIZE + entry::frame_size(payload.len()));
    }

    #[test]
    fn close_releases_store_even_on_failure() {
        let (channel, store) = memory_channel(0, 64);
        channel.append(b"abc").unwrap();
        store.fail_sync.store(true, Ordering::SeqCst);

        assert!(channel.close().is_err());
        assert!(channel.is_closed());
        assert!(matches!(channel.append(b"x"), Err(SegLogError::ShutDown)));
        channel.close().unwrap();
    }
}
