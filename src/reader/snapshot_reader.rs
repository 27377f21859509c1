use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use tracing::{debug, warn};
use crate::analysis::PerFieldAnalyzer;
use crate::core::error::{IndexError, Result};
use crate::index::inverted::{IndexedDoc, InvertedSegment};
use crate::mvcc::snapshot::{Snapshot, SnapshotOrigin, SnapshotSegment, SnapshotTracker};
use crate::storage::commit::CommitPoint;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::SegmentId;
use crate::storage::segment_reader::SegmentReader;

/// Attempts made when a commit point references a segment removed meanwhile.
const OPEN_RETRIES: usize = 3;

/// Reads a segment file and rebuilds its in-memory structures.
pub fn load_segment(
    storage: &StorageLayout,
    id: SegmentId,
    analyzer: &PerFieldAnalyzer,
) -> Result<Arc<InvertedSegment>> {
    let stored = SegmentReader::read_all(storage, id)?;
    let docs = IndexedDoc::analyze_all(
        stored.into_iter().map(|d| (d.doc_id, d.record)).collect(),
        analyzer,
    );
    Ok(Arc::new(InvertedSegment::build(id, docs)))
}

/// Opens snapshots of the last commit of an index directory.
///
/// Segments still held by a live snapshot are shared with the next one
/// instead of being read again.
pub struct DirectoryReader {
    storage: StorageLayout,
    analyzer: Arc<PerFieldAnalyzer>,
    tracker: Arc<SnapshotTracker>,
    loaded: Mutex<HashMap<SegmentId, Weak<InvertedSegment>>>,
}

impl DirectoryReader {
    pub fn open(storage: StorageLayout, analyzer: Arc<PerFieldAnalyzer>, tracker: Arc<SnapshotTracker>) -> Self {
        DirectoryReader {
            storage,
            analyzer,
            tracker,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Generation of the last commit; 0 when nothing was ever committed.
    pub fn generation(&self) -> Result<u64> {
        Ok(CommitPoint::load(&self.storage)?.map_or(0, |c| c.generation))
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_snapshot() {
                Err(IndexError::Io(e)) if e.kind() == ErrorKind::NotFound && attempt < OPEN_RETRIES => {
                    warn!(attempt, "segment vanished while opening snapshot, retrying");
                }
                result => return result,
            }
        }
    }

    /// A fresh snapshot when a newer commit exists, `None` otherwise.
    pub fn reopen_if_changed(&self, current: &Snapshot) -> Result<Option<Snapshot>> {
        if current.origin() == SnapshotOrigin::Commit(self.generation()?) {
            return Ok(None);
        }
        self.snapshot().map(Some)
    }

    fn try_snapshot(&self) -> Result<Snapshot> {
        let commit = CommitPoint::load(&self.storage)?.unwrap_or_else(CommitPoint::empty);

        let mut loaded = self.loaded.lock();
        loaded.retain(|_, segment| segment.strong_count() > 0);

        let mut segments = Vec::with_capacity(commit.segments.len());
        for committed in &commit.segments {
            let segment = match loaded.get(&committed.id).and_then(Weak::upgrade) {
                Some(segment) => segment,
                None => {
                    let segment = load_segment(&self.storage, committed.id, &self.analyzer)?;
                    loaded.insert(committed.id, Arc::downgrade(&segment));
                    segment
                }
            };
            segments.push(SnapshotSegment::new(segment, committed.deletes()?));
        }
        drop(loaded);

        debug!(generation = commit.generation, segments = segments.len(), "directory snapshot opened");
        Ok(Snapshot::new(SnapshotOrigin::Commit(commit.generation), segments, &self.tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WriterConfig;
    use crate::core::types::{FieldValue, Record};
    use crate::writer::index_writer::IndexWriter;

    fn record(id: &str) -> Record {
        Record::new().with("_id", FieldValue::Keyword(id.to_string()))
    }

    #[test]
    fn test_empty_directory_gives_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let reader = DirectoryReader::open(
            StorageLayout::new(dir.path().to_path_buf()).unwrap(),
            Arc::new(PerFieldAnalyzer::default()),
            SnapshotTracker::new(),
        );
        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.num_docs(), 0);
        assert!(reader.reopen_if_changed(&snapshot).unwrap().is_none());
    }

    #[test]
    fn test_reopen_shares_unchanged_segments() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let analyzer = Arc::new(PerFieldAnalyzer::default());
        let tracker = SnapshotTracker::new();
        let writer = IndexWriter::open(layout.clone(), Arc::clone(&analyzer), WriterConfig::default(), Arc::clone(&tracker)).unwrap();
        writer.add_documents(vec![record("a")]).unwrap();
        writer.commit().unwrap();

        let reader = DirectoryReader::open(layout, analyzer, Arc::clone(&tracker));
        let first = reader.snapshot().unwrap();
        assert!(reader.reopen_if_changed(&first).unwrap().is_none());

        writer.add_documents(vec![record("b")]).unwrap();
        writer.commit().unwrap();
        let second = reader.reopen_if_changed(&first).unwrap().unwrap();
        assert_eq!(second.num_docs(), 2);
        assert!(Arc::ptr_eq(&first.segments()[0].segment, &second.segments()[0].segment));
        writer.close().unwrap();
    }
}
