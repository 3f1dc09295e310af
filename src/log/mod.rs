//! Log Module
//!
//! Rotation policy and durability bookkeeping on top of segment channels.
//!
//! ## Segment States
//! ```text
//!   (none) ──allocate──▶ CURRENT ──rotate──▶ PENDING_FLUSH ──checkpoint──▶ RETIRED
//!                           │
//!                           └──shutdown──▶ sealed + closed
//! ```

mod listener;
mod manager;

pub use listener::{RecentSegmentsStatus, SegmentListener};
pub use manager::LogManager;
