//! Tests for segment metadata extraction
//!
//! These tests verify:
//! - Stream membership of rotated and current segments
//! - Index reads and the scanning fallback agree
//! - Missing segments are reported, not invented
//! - Empty rotated segments yield empty metadata

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use seglog::segment::entry::{encode_payload, frame_size};
use seglog::segment::segment_file_name;
use seglog::{Config, LogEngine, SegLogError, SegmentId, StreamId};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> (TempDir, LogEngine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().segment_dir(temp_dir.path()).build();
    let engine = LogEngine::open(config).unwrap();
    (temp_dir, engine)
}

fn append(engine: &LogEngine, stream: u64, sequence: u64, data: &[u8]) -> u64 {
    let payload = encode_payload(StreamId::new(stream), sequence, data);
    engine.append(StreamId::new(stream), &payload, true).unwrap();
    frame_size(payload.len())
}

// =============================================================================
// Membership Tests
// =============================================================================

#[test]
fn test_streams_belong_to_segment_they_were_written_in() {
    let (_temp_dir, engine) = setup_engine();
    for stream in 1..=4u64 {
        append(&engine, stream, 0, b"entry");
    }
    engine.create_new_segment(StreamId::new(5)).unwrap();
    append(&engine, 5, 0, b"entry");

    let metadata = engine.extract_metadata(SegmentId::new(0)).unwrap();

    for stream in 1..=4u64 {
        assert!(metadata.contains_stream(StreamId::new(stream)));
    }
    assert!(!metadata.contains_stream(StreamId::new(5)));

    let current = engine.extract_metadata(SegmentId::new(1)).unwrap();
    assert!(current.contains_stream(StreamId::new(5)));
    assert_eq!(current.stream_count(), 1);
}

#[test]
fn test_missing_segment_is_not_found() {
    let (_temp_dir, engine) = setup_engine();
    append(&engine, 1, 0, b"entry");

    let result = engine.extract_metadata(SegmentId::new(4));

    assert!(matches!(result, Err(SegLogError::SegmentNotFound(4))));
}

#[test]
fn test_nothing_written_yet_is_not_found() {
    let (_temp_dir, engine) = setup_engine();

    assert!(matches!(
        engine.extract_metadata(SegmentId::new(0)),
        Err(SegLogError::SegmentNotFound(0))
    ));
}

#[test]
fn test_each_stream_found_in_one_segment() {
    let (_temp_dir, engine) = setup_engine();
    for stream in 1..=4u64 {
        engine.create_new_segment(StreamId::new(stream)).unwrap();
        append(&engine, stream, 0, b"entry");
    }
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();

    for segment in 0..4u64 {
        let metadata = engine.extract_metadata(SegmentId::new(segment)).unwrap();
        assert_eq!(metadata.stream_count(), 1);
        assert!(metadata.contains_stream(StreamId::new(segment + 1)));
    }
}

// =============================================================================
// Size Accounting Tests
// =============================================================================

#[test]
fn test_sizes_include_frame_overhead() {
    let (_temp_dir, engine) = setup_engine();
    let mut expected = 0;
    for seq in 0..10u64 {
        expected += append(&engine, 3, seq, &[seq as u8; 64]);
    }
    let other = append(&engine, 8, 0, b"x");
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();

    let metadata = engine.extract_metadata(SegmentId::new(0)).unwrap();

    assert_eq!(metadata.stream_size(StreamId::new(3)), Some(expected));
    assert_eq!(metadata.stream_size(StreamId::new(8)), Some(other));
    assert_eq!(metadata.total_size(), expected + other);
    assert_eq!(metadata.remaining_size(), expected + other);
}

#[test]
fn test_index_and_scan_agree_for_sealed_segment() {
    let (_temp_dir, engine) = setup_engine();
    for stream in 1..=3u64 {
        for seq in 0..4u64 {
            append(&engine, stream, seq, b"payload");
        }
    }
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();

    let indexed = engine.extract_metadata_from_index(SegmentId::new(0)).unwrap();
    let extracted = engine.extract_metadata(SegmentId::new(0)).unwrap();

    assert_eq!(indexed, extracted);
}

#[test]
fn test_current_segment_is_scanned_with_buffered_entries() {
    let (_temp_dir, engine) = setup_engine();
    let size = append(&engine, 2, 0, b"still buffered");

    assert!(matches!(
        engine.extract_metadata_from_index(SegmentId::new(0)),
        Err(SegLogError::Corruption(_))
    ));

    let metadata = engine.extract_metadata(SegmentId::new(0)).unwrap();
    assert_eq!(metadata.stream_size(StreamId::new(2)), Some(size));
}

#[test]
fn test_empty_rotated_segment_has_empty_metadata() {
    let (_temp_dir, engine) = setup_engine();
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();

    let metadata = engine.extract_metadata(SegmentId::new(0)).unwrap();

    assert!(metadata.is_empty());
    assert_eq!(metadata.segment_id(), SegmentId::new(0));
    assert_eq!(metadata.total_size(), 0);
}

#[test]
fn test_corrupt_index_falls_back_to_scan() {
    let (temp_dir, engine) = setup_engine();
    let size = append(&engine, 6, 0, b"entry");
    engine.create_new_segment(StreamId::UNASSIGNED).unwrap();
    engine.checkpoint().unwrap();

    // Flip the stored index checksum
    let path = temp_dir.path().join(segment_file_name(SegmentId::new(0)));
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(20)).unwrap();
    file.write_all(&[0xFF; 4]).unwrap();
    file.sync_all().unwrap();

    assert!(engine.extract_metadata_from_index(SegmentId::new(0)).is_err());

    let metadata = engine.extract_metadata(SegmentId::new(0)).unwrap();
    assert_eq!(metadata.stream_size(StreamId::new(6)), Some(size));
}
