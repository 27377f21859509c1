use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::Result;
use crate::storage::segment::SegmentId;

/// Directory structure for data files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub segments_dir: PathBuf,  // Document data segments (.seg files)
    pub meta_dir: PathBuf,      // Commit point location
}

impl StorageLayout {
    /// Resolves the layout under `base_dir`, creating missing directories.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let layout = Self::at(base_dir);

        // Create directories
        fs::create_dir_all(&layout.segments_dir)?;
        fs::create_dir_all(&layout.meta_dir)?;

        Ok(layout)
    }

    /// Resolves the layout without touching the filesystem.
    pub fn at(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        StorageLayout {
            segments_dir: base_dir.join("segments"),
            meta_dir: base_dir.join("meta"),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.segments_dir.join(format!("{}.seg", id.0))
    }

    pub fn commit_path(&self) -> PathBuf {
        self.meta_dir.join("commit.bin")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn exists(&self) -> bool {
        self.commit_path().exists()
    }
}
