//! In-memory segment store for white-box tests

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::SegmentId;

use super::{SegmentChannel, SegmentStore};

/// Store backed by a shared `Vec`; sync can be made to fail on demand
#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryStore {
    pub data: Arc<Mutex<Vec<u8>>>,
    pub fail_sync: Arc<AtomicBool>,
    pub syncs: Arc<AtomicUsize>,
}

impl SegmentStore for MemoryStore {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut buf = self.data.lock();
        let end = offset as usize + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"));
        }
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) fn memory_channel(id: u64, capacity: usize) -> (SegmentChannel, MemoryStore) {
    let store = MemoryStore::default();
    let channel = SegmentChannel::with_store(
        SegmentId::new(id),
        Path::new("memory"),
        Box::new(store.clone()),
        capacity,
    )
    .expect("memory store never fails writes");
    (channel, store)
}
