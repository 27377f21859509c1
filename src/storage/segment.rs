use chrono::{DateTime, Utc};
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use crate::core::types::DocId;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub created_at: DateTime<Utc>,
    pub doc_count: u32,
    pub size_bytes: u64,
    pub min_doc_id: DocId,
    pub max_doc_id: DocId,
}

/// Segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,          // Format version
    pub doc_count: u32,        // Number of documents
    pub checksum: u32,         // CRC32 of the compressed body
    pub body_len: u64,         // Compressed body length
}

impl SegmentHeader {
    pub const VERSION: u32 = 1;
    pub const MAGIC: [u8; 4] = *b"EIDX";

    pub fn new(doc_count: u32, checksum: u32, body_len: u64) -> Self {
        SegmentHeader {
            version: Self::VERSION,
            doc_count,
            checksum,
            body_len,
        }
    }
}

/// A document as persisted in a segment file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDoc {
    pub doc_id: DocId,
    pub record: crate::core::types::Record,
}
