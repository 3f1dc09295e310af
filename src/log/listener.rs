//! Segment lifecycle listeners
//!
//! Collaborators that need to know when segments start and when rotated
//! segments become durable (e.g. space reclamation bounding what it may
//! delete).

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::types::SegmentId;

/// Receives segment lifecycle notifications.
///
/// Called synchronously while the manager holds the lock that made the
/// change, so notifications arrive in order. Implementations must be quick and
/// must not call back into the manager.
pub trait SegmentListener: Send + Sync {
    /// A new segment became the current segment
    fn segment_created(&self, segment_id: SegmentId);

    /// A rotated segment was forced to disk and retired
    fn segment_flushed(&self, _segment_id: SegmentId) {}
}

/// Tracks which recently created segments are durable.
///
/// `least_unflushed()` is the lowest segment id that may still have
/// unpersisted data; everything below it is safe to reclaim.
#[derive(Debug)]
pub struct RecentSegmentsStatus {
    inner: Mutex<RecentInner>,
}

#[derive(Debug)]
struct RecentInner {
    /// segment id → flushed
    status: BTreeMap<SegmentId, bool>,
    /// Flushed before their creation was reported
    flushed_early: BTreeSet<SegmentId>,
    least_unflushed: SegmentId,
}

impl RecentSegmentsStatus {
    /// `least_unflushed` starts at the id the allocator will hand out next
    pub fn new(least_unflushed: SegmentId) -> Self {
        Self {
            inner: Mutex::new(RecentInner {
                status: BTreeMap::new(),
                flushed_early: BTreeSet::new(),
                least_unflushed,
            }),
        }
    }

    pub fn created(&self, segment_id: SegmentId) {
        let mut inner = self.inner.lock();
        if segment_id < inner.least_unflushed {
            return;
        }

        let flushed = inner.flushed_early.remove(&segment_id);
        inner.status.entry(segment_id).or_insert(flushed);
        inner.advance();
    }

    pub fn flushed(&self, segment_id: SegmentId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(flushed) = inner.status.get_mut(&segment_id) {
            *flushed = true;
        } else if segment_id >= inner.least_unflushed {
            inner.flushed_early.insert(segment_id);
        }
        inner.advance();
    }

    pub fn least_unflushed(&self) -> SegmentId {
        self.inner.lock().least_unflushed
    }

    pub fn is_flushed(&self, segment_id: SegmentId) -> bool {
        let inner = self.inner.lock();
        inner.status.get(&segment_id).copied().unwrap_or(false)
            || inner.flushed_early.contains(&segment_id)
            || segment_id < inner.least_unflushed
    }
}

impl RecentInner {
    /// Drop the flushed prefix and move the bound past it
    fn advance(&mut self) {
        loop {
            let id = match self.status.first_key_value() {
                Some((&id, &true)) => id,
                _ => break,
            };
            self.status.remove(&id);
            self.least_unflushed = id.next();
        }
        let least = self.least_unflushed;
        self.flushed_early.retain(|id| *id >= least);
    }
}

impl SegmentListener for RecentSegmentsStatus {
    fn segment_created(&self, segment_id: SegmentId) {
        self.created(segment_id);
    }

    fn segment_flushed(&self, segment_id: SegmentId) {
        self.flushed(segment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_unflushed_advances_over_contiguous_flushes() {
        let status = RecentSegmentsStatus::new(SegmentId::new(0));
        for id in 0..4 {
            status.created(SegmentId::new(id));
        }

        status.flushed(SegmentId::new(1));
        assert_eq!(status.least_unflushed(), SegmentId::new(0));
        assert!(status.is_flushed(SegmentId::new(1)));
        assert!(!status.is_flushed(SegmentId::new(0)));

        status.flushed(SegmentId::new(0));
        assert_eq!(status.least_unflushed(), SegmentId::new(2));
        assert!(status.is_flushed(SegmentId::new(0)));
        assert!(!status.is_flushed(SegmentId::new(2)));
    }

    #[test]
    fn unknown_segments_do_not_move_the_bound() {
        let status = RecentSegmentsStatus::new(SegmentId::new(5));
        status.flushed(SegmentId::new(9));

        assert_eq!(status.least_unflushed(), SegmentId::new(5));
        assert!(status.is_flushed(SegmentId::new(4)));
    }

    #[test]
    fn flush_reported_before_creation_still_advances() {
        let status = RecentSegmentsStatus::new(SegmentId::new(5));

        status.flushed(SegmentId::new(5));
        assert_eq!(status.least_unflushed(), SegmentId::new(5));

        status.created(SegmentId::new(5));
        assert_eq!(status.least_unflushed(), SegmentId::new(6));
        assert!(status.is_flushed(SegmentId::new(5)));

        status.created(SegmentId::new(6));
        status.flushed(SegmentId::new(6));
        assert_eq!(status.least_unflushed(), SegmentId::new(7));
    }

    #[test]
    fn late_creation_of_retired_segment_is_ignored() {
        let status = RecentSegmentsStatus::new(SegmentId::new(0));
        status.created(SegmentId::new(0));
        status.flushed(SegmentId::new(0));

        status.created(SegmentId::new(0));

        assert_eq!(status.least_unflushed(), SegmentId::new(1));
        assert!(status.is_flushed(SegmentId::new(0)));
    }
}
