//! Segment Directories
//!
//! Where segment files may live. Capacity and disk-health policy belong to the
//! implementor; the engine only asks for the current candidates each time it
//! allocates, and for every directory when it needs to find a segment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SegLogError};

/// Source of candidate directories for new segments
pub trait SegmentDirs: Send + Sync {
    /// Directories currently able to take a new segment. Asked again on every
    /// allocation, so the set may grow or shrink between calls.
    fn writable_dirs(&self) -> Vec<PathBuf>;

    /// Every directory that may hold segments, writable or not
    fn all_dirs(&self) -> Vec<PathBuf>;
}

/// Fixed directory list; a directory is writable while it exists and is not
/// read-only
#[derive(Debug, Clone)]
pub struct StaticDirs {
    dirs: Vec<PathBuf>,
}

impl StaticDirs {
    /// Create every directory that doesn't exist yet
    pub fn new(dirs: Vec<PathBuf>) -> Result<Self> {
        if dirs.is_empty() {
            return Err(SegLogError::AllocationFailure(
                "no segment directories configured".to_string(),
            ));
        }

        for dir in &dirs {
            fs::create_dir_all(dir)?;
        }

        Ok(Self { dirs })
    }

    fn is_writable(dir: &Path) -> bool {
        match fs::metadata(dir) {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }
}

impl SegmentDirs for StaticDirs {
    fn writable_dirs(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .filter(|dir| Self::is_writable(dir))
            .cloned()
            .collect()
    }

    fn all_dirs(&self) -> Vec<PathBuf> {
        self.dirs.clone()
    }
}

/// Pick the directory for segment number `rotation`: `rotation mod len`.
///
/// The candidate list is taken as given on every call, never cached.
pub fn select_dir(candidates: &[PathBuf], rotation: u64) -> Result<PathBuf> {
    let count = candidates.len();
    if count == 0 {
        return Err(SegLogError::AllocationFailure(
            "no writable segment directory".to_string(),
        ));
    }

    let index = (rotation % count as u64) as usize;
    Ok(candidates[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn select_dir_is_round_robin() {
        let dirs: Vec<PathBuf> = ["/a", "/b", "/c"].iter().map(PathBuf::from).collect();

        let picked: Vec<PathBuf> = (0..6).map(|i| select_dir(&dirs, i).unwrap()).collect();

        assert_eq!(picked[0], PathBuf::from("/a"));
        assert_eq!(picked[1], PathBuf::from("/b"));
        assert_eq!(picked[2], PathBuf::from("/c"));
        assert_eq!(picked[3], PathBuf::from("/a"));
    }

    #[test]
    fn select_dir_follows_a_shrinking_list() {
        let mut dirs: Vec<PathBuf> = ["/a", "/b", "/c"].iter().map(PathBuf::from).collect();
        assert_eq!(select_dir(&dirs, 2).unwrap(), PathBuf::from("/c"));

        dirs.pop();
        assert_eq!(select_dir(&dirs, 2).unwrap(), PathBuf::from("/a"));
    }

    #[test]
    fn select_dir_without_candidates_fails() {
        assert!(matches!(
            select_dir(&[], 0),
            Err(SegLogError::AllocationFailure(_))
        ));
    }

    #[test]
    fn static_dirs_creates_directories() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b").join("nested");

        let dirs = StaticDirs::new(vec![a.clone(), b.clone()]).unwrap();

        assert!(a.is_dir() && b.is_dir());
        assert_eq!(dirs.writable_dirs(), vec![a, b]);
    }

    #[test]
    fn static_dirs_requires_a_directory() {
        assert!(StaticDirs::new(Vec::new()).is_err());
    }
}
