use std::fs::{self, File};
use std::io::Write;
use chrono::Utc;
use crc32fast::Hasher;
use serde::Serialize;
use tracing::debug;
use crate::core::error::Result;
use crate::core::types::{DocId, Record};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentHeader, SegmentId, SegmentMetadata};

#[derive(Serialize)]
struct StoredDocRef<'a> {
    doc_id: DocId,
    record: &'a Record,
}

/// Writes immutable segment files.
///
/// Layout: `MAGIC | header_len: u32 LE | header (bincode) | body`, where the
/// body is the lz4-compressed bincode list of stored documents.
pub struct SegmentWriter;

impl SegmentWriter {
    pub fn write<'a, I>(storage: &StorageLayout, segment_id: SegmentId, docs: I) -> Result<SegmentMetadata>
    where
        I: IntoIterator<Item = (DocId, &'a Record)>,
    {
        let docs: Vec<StoredDocRef<'a>> = docs
            .into_iter()
            .map(|(doc_id, record)| StoredDocRef { doc_id, record })
            .collect();

        let min_doc_id = docs.iter().map(|d| d.doc_id).min().unwrap_or(DocId(0));
        let max_doc_id = docs.iter().map(|d| d.doc_id).max().unwrap_or(DocId(0));

        let data = bincode::serialize(&docs)?;
        let body = lz4_flex::compress_prepend_size(&data);

        let mut hasher = Hasher::new();
        hasher.update(&body);
        let header = SegmentHeader::new(docs.len() as u32, hasher.finalize(), body.len() as u64);
        let header_bytes = bincode::serialize(&header)?;

        let path = storage.segment_path(&segment_id);
        let tmp_path = path.with_extension("seg.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&SegmentHeader::MAGIC)?;
            file.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
            file.write_all(&header_bytes)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        let size_bytes = (SegmentHeader::MAGIC.len() + 4 + header_bytes.len() + body.len()) as u64;
        debug!(segment = %segment_id.0, docs = docs.len(), size_bytes, "segment written");

        Ok(SegmentMetadata {
            created_at: Utc::now(),
            doc_count: docs.len() as u32,
            size_bytes,
            min_doc_id,
            max_doc_id,
        })
    }
}
