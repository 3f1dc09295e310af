//! SegLog Inspect Binary
//!
//! Prints the per-stream metadata of segment files.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use seglog::dirs::StaticDirs;
use seglog::metadata::MetadataExtractor;
use seglog::segment::parse_segment_id;
use seglog::{SegmentId, SegmentMetadata};
use tracing_subscriber::{fmt, EnvFilter};

/// SegLog segment inspector
#[derive(Parser, Debug)]
#[command(name = "seglog-inspect")]
#[command(about = "Print which streams a segment holds and how many bytes each wrote")]
#[command(version)]
struct Args {
    /// Segment directory (repeat for several)
    #[arg(short, long = "dir", required = true)]
    dirs: Vec<PathBuf>,

    /// Segment id to inspect (repeat for several; default: every segment)
    #[arg(short, long = "segment")]
    segments: Vec<u64>,

    /// Rebuild metadata by scanning entries instead of reading the index
    #[arg(long)]
    scan: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,seglog=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let dirs = match StaticDirs::new(args.dirs.clone()) {
        Ok(dirs) => dirs,
        Err(e) => {
            tracing::error!("Failed to open segment directories: {}", e);
            process::exit(1);
        }
    };
    let extractor = MetadataExtractor::new(Arc::new(dirs));

    let segments = if args.segments.is_empty() {
        discover_segments(&args.dirs)
    } else {
        args.segments.iter().copied().map(SegmentId::new).collect()
    };

    let mut failed = false;
    for segment_id in segments {
        let result = if args.scan {
            extractor.extract_by_scanning(segment_id)
        } else {
            extractor.extract(segment_id)
        };

        match result {
            Ok(metadata) => print_metadata(&metadata),
            Err(e) => {
                tracing::error!(segment = %segment_id, "Failed to read metadata: {}", e);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

fn discover_segments(dirs: &[PathBuf]) -> Vec<SegmentId> {
    let mut ids: Vec<SegmentId> = dirs
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(|entry| entry.ok()))
        .filter_map(|entry| parse_segment_id(&entry.path()))
        .collect();
    ids.sort();
    ids
}

fn print_metadata(metadata: &SegmentMetadata) {
    println!(
        "segment {}: {} streams, {} bytes",
        metadata.segment_id(),
        metadata.stream_count(),
        metadata.total_size()
    );
    for (stream, size) in metadata.streams() {
        println!("  stream {:>20}  {:>12} bytes", stream, size);
    }
}
