//! Configuration for SegLog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a SegLog instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directories segment files are spread across (round-robin).
    /// Internal structure of each:
    ///   {dir}/
    ///     ├── lastId                (highest id allocated in this dir)
    ///     └── segment_000000.log    (segment files)
    pub segment_dirs: Vec<PathBuf>,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Soft size limit of a segment in bytes. Appends that ask for rolling
    /// rotate to a new segment before crossing it.
    pub segment_size_limit: u64,

    /// Capacity of each channel's in-memory write buffer (in bytes)
    pub write_buffer_capacity: usize,

    /// Force the current segment once this many bytes are unpersisted.
    /// Zero disables size-triggered forcing.
    pub flush_interval_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_dirs: vec![PathBuf::from("./seglog_data")],
            segment_size_limit: 1024 * 1024 * 1024, // 1 GB
            write_buffer_capacity: 64 * 1024,       // 64 KB
            flush_interval_bytes: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    dirs_set: bool,
}

impl ConfigBuilder {
    /// Use a single segment directory
    pub fn segment_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.segment_dirs = vec![path.into()];
        self.dirs_set = true;
        self
    }

    /// Add a segment directory (the first call replaces the default)
    pub fn add_segment_dir(mut self, path: impl Into<PathBuf>) -> Self {
        if !self.dirs_set {
            self.config.segment_dirs.clear();
            self.dirs_set = true;
        }
        self.config.segment_dirs.push(path.into());
        self
    }

    /// Set the soft segment size limit (in bytes)
    pub fn segment_size_limit(mut self, size: u64) -> Self {
        self.config.segment_size_limit = size;
        self
    }

    /// Set the write buffer capacity (in bytes)
    pub fn write_buffer_capacity(mut self, size: usize) -> Self {
        self.config.write_buffer_capacity = size;
        self
    }

    /// Set the unpersisted-bytes threshold that forces the current segment
    pub fn flush_interval_bytes(mut self, size: u64) -> Self {
        self.config.flush_interval_bytes = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
