use std::fs::{self, File};
use std::io::Write;
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::error::{IndexError, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentId, SegmentMetadata};

/// A committed segment and the ordinals deleted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedSegment {
    pub id: SegmentId,
    pub metadata: SegmentMetadata,
    deletes: Vec<u8>,
}

impl CommittedSegment {
    pub fn new(id: SegmentId, metadata: SegmentMetadata, deletes: &RoaringBitmap) -> Result<Self> {
        let mut bytes = Vec::with_capacity(deletes.serialized_size());
        deletes.serialize_into(&mut bytes)?;
        Ok(CommittedSegment {
            id,
            metadata,
            deletes: bytes,
        })
    }

    pub fn deletes(&self) -> Result<RoaringBitmap> {
        RoaringBitmap::deserialize_from(&self.deletes[..])
            .map_err(|e| IndexError::corrupted(format!("delete bitmap of segment {}: {}", self.id.0, e)))
    }
}

/// The durable state of an index: which segments are live at which generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPoint {
    pub generation: u64,
    pub next_doc_id: u64,
    pub segments: Vec<CommittedSegment>,
    pub timestamp: DateTime<Utc>,
}

impl CommitPoint {
    pub fn empty() -> Self {
        CommitPoint {
            generation: 0,
            next_doc_id: 0,
            segments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Load commit point from disk
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.commit_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        if data.len() < 4 {
            return Err(IndexError::corrupted(format!("truncated commit point {}", path.display())));
        }
        let mut crc_buf = [0u8; 4];
        crc_buf.copy_from_slice(&data[..4]);

        let mut hasher = Hasher::new();
        hasher.update(&data[4..]);
        if hasher.finalize() != u32::from_le_bytes(crc_buf) {
            return Err(IndexError::corrupted(format!("checksum mismatch in {}", path.display())));
        }

        let commit = bincode::deserialize(&data[4..])?;
        Ok(Some(commit))
    }

    /// Save commit point to disk, replacing the previous one atomically.
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let data = bincode::serialize(self)?;
        let mut hasher = Hasher::new();
        hasher.update(&data);

        let path = storage.commit_path();
        let tmp_path = path.with_extension("bin.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&hasher.finalize().to_le_bytes())?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        debug!(generation = self.generation, segments = self.segments.len(), "commit point saved");
        Ok(())
    }

    pub fn doc_count(&self) -> Result<u64> {
        let mut count = 0u64;
        for segment in &self.segments {
            count += segment.metadata.doc_count as u64 - segment.deletes()?.len();
        }
        Ok(count)
    }
}
