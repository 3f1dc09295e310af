//! # SegLog
//!
//! An append-only log segment engine with:
//! - Many streams (ledgers) multiplexed into shared segment files
//! - Buffered appends with explicit, forced durability
//! - Size-based and explicit segment rotation
//! - Per-segment metadata indexes for space reclamation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LogEngine                             │
//! │        append / read_entry / extract_metadata                │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!        ┌─────────────────┐          ┌───────────────────┐
//!        │   LogManager    │          │ MetadataExtractor │
//!        │ current+rotated │          │  (index or scan)  │
//!        └────────┬────────┘          └─────────┬─────────┘
//!                 │                             │
//!        ┌────────┴────────┐                    │
//!        ▼                 ▼                    ▼
//!  ┌───────────┐   ┌────────────────┐   ┌───────────────┐
//!  │ Allocator │──▶│ SegmentChannel │   │ SegmentReader │
//!  │ (dirs, id)│   │   (buffered)   │   │               │
//!  └───────────┘   └───────┬────────┘   └───────┬───────┘
//!                          └──── segment files ─┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod types;

pub mod dirs;
pub mod segment;
pub mod metadata;
pub mod log;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SegLogError, Result};
pub use config::Config;
pub use types::{EntryLocation, SegmentId, StreamId};
pub use metadata::SegmentMetadata;
pub use log::{RecentSegmentsStatus, SegmentListener};
pub use engine::LogEngine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SegLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
