use std::fs;
use crc32fast::Hasher;
use crate::core::error::{IndexError, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentHeader, SegmentId, StoredDoc};

pub struct SegmentReader;

impl SegmentReader {
    /// Reads and verifies a whole segment file.
    pub fn read_all(storage: &StorageLayout, segment_id: SegmentId) -> Result<Vec<StoredDoc>> {
        let path = storage.segment_path(&segment_id);
        let bytes = fs::read(&path)?;

        let magic_len = SegmentHeader::MAGIC.len();
        if bytes.len() < magic_len + 4 || bytes[..magic_len] != SegmentHeader::MAGIC {
            return Err(IndexError::corrupted(format!("{} is not a segment file", path.display())));
        }

        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&bytes[magic_len..magic_len + 4]);
        let header_len = u32::from_le_bytes(len_buf) as usize;
        let header_start = magic_len + 4;
        let body_start = header_start + header_len;
        if bytes.len() < body_start {
            return Err(IndexError::corrupted(format!("truncated segment header in {}", path.display())));
        }

        let header: SegmentHeader = bincode::deserialize(&bytes[header_start..body_start])?;

        // Verify version
        if header.version != SegmentHeader::VERSION {
            return Err(IndexError::corrupted(format!(
                "incompatible segment version {} in {}",
                header.version,
                path.display()
            )));
        }

        let body = &bytes[body_start..];
        if body.len() as u64 != header.body_len {
            return Err(IndexError::corrupted(format!("truncated segment body in {}", path.display())));
        }

        let mut hasher = Hasher::new();
        hasher.update(body);
        if hasher.finalize() != header.checksum {
            return Err(IndexError::corrupted(format!("checksum mismatch in {}", path.display())));
        }

        let data = lz4_flex::decompress_size_prepended(body)
            .map_err(|e| IndexError::corrupted(format!("{}: {}", path.display(), e)))?;
        let docs: Vec<StoredDoc> = bincode::deserialize(&data)?;

        if docs.len() != header.doc_count as usize {
            return Err(IndexError::corrupted(format!(
                "segment {} declares {} documents but holds {}",
                segment_id.0,
                header.doc_count,
                docs.len()
            )));
        }

        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DocId, FieldValue, Record, StoredValue};
    use crate::storage::segment_writer::SegmentWriter;

    fn record(id: &str) -> Record {
        Record::new()
            .with("_id", FieldValue::Keyword(id.to_string()))
            .with("_source", FieldValue::Stored(StoredValue::Str(format!("{{\"id\":\"{}\"}}", id))))
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let id = SegmentId::new();
        let records = vec![record("a"), record("b")];

        let meta = SegmentWriter::write(
            &layout,
            id,
            records.iter().enumerate().map(|(i, r)| (DocId(10 + i as u64), r)),
        )
        .unwrap();
        assert_eq!(meta.doc_count, 2);
        assert_eq!(meta.min_doc_id, DocId(10));
        assert_eq!(meta.max_doc_id, DocId(11));

        let docs = SegmentReader::read_all(&layout, id).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].doc_id, DocId(11));
        assert_eq!(docs[1].record, records[1]);
    }

    #[test]
    fn test_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let id = SegmentId::new();
        let records = vec![record("a")];
        SegmentWriter::write(&layout, id, records.iter().map(|r| (DocId(0), r))).unwrap();

        let path = layout.segment_path(&id);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = SegmentReader::read_all(&layout, id).unwrap_err();
        assert!(matches!(err, IndexError::Corrupted { .. }));
    }
}
