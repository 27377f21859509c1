use std::collections::HashSet;
use std::fs;
use std::mem;
use std::sync::Arc;
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use tracing::{debug, info, warn};
use crate::analysis::PerFieldAnalyzer;
use crate::core::config::WriterConfig;
use crate::core::error::{IndexError, Result};
use crate::core::types::{DocId, Record};
use crate::index::inverted::{IndexedDoc, InvertedSegment, Term};
use crate::mvcc::snapshot::{Snapshot, SnapshotOrigin, SnapshotSegment, SnapshotTracker};
use crate::query::ast::Query;
use crate::query::matcher::DocumentMatcher;
use crate::reader::snapshot_reader::load_segment;
use crate::scoring::scorer::QueryWeights;
use crate::storage::commit::{CommitPoint, CommittedSegment};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentId, SegmentMetadata};
use crate::storage::segment_writer::SegmentWriter;

struct WriterSegment {
    segment: Arc<InvertedSegment>,
    deletes: RoaringBitmap,
    /// Set once the segment file is on disk.
    metadata: Option<SegmentMetadata>,
}

impl WriterSegment {
    fn live_count(&self) -> u64 {
        self.segment.len() as u64 - self.deletes.len()
    }
}

struct WriterState {
    generation: u64,
    next_doc_id: u64,
    /// Bumped by every mutation; NRT snapshots are keyed on it.
    version: u64,
    committed_version: u64,
    segments: Vec<WriterSegment>,
    pending: Vec<IndexedDoc>,
    closed: bool,
}

/// Single writer over one index directory.
///
/// Exclusivity is enforced with an OS file lock held until `close`. All
/// mutations are serialized by an internal mutex; analysis runs outside it.
pub struct IndexWriter {
    storage: StorageLayout,
    analyzer: Arc<PerFieldAnalyzer>,
    config: WriterConfig,
    tracker: Arc<SnapshotTracker>,
    state: Mutex<WriterState>,
    lock: Mutex<Option<FileLock>>,
}

impl IndexWriter {
    pub fn open(
        storage: StorageLayout,
        analyzer: Arc<PerFieldAnalyzer>,
        config: WriterConfig,
        tracker: Arc<SnapshotTracker>,
    ) -> Result<Self> {
        let lock = FileLock::acquire(&storage)?;

        let commit = match CommitPoint::load(&storage)? {
            Some(commit) => commit,
            None => {
                let commit = CommitPoint::empty();
                commit.save(&storage)?;
                commit
            }
        };

        let mut segments = Vec::with_capacity(commit.segments.len());
        for committed in &commit.segments {
            segments.push(WriterSegment {
                segment: load_segment(&storage, committed.id, &analyzer)?,
                deletes: committed.deletes()?,
                metadata: Some(committed.metadata.clone()),
            });
        }

        let referenced: HashSet<SegmentId> = commit.segments.iter().map(|s| s.id).collect();
        remove_unreferenced_files(&storage, &referenced);

        info!(
            path = %storage.base_dir().display(),
            generation = commit.generation,
            segments = segments.len(),
            "index writer opened"
        );

        Ok(IndexWriter {
            storage,
            analyzer,
            config,
            tracker,
            state: Mutex::new(WriterState {
                generation: commit.generation,
                next_doc_id: commit.next_doc_id,
                version: 0,
                committed_version: 0,
                segments,
                pending: Vec::new(),
                closed: false,
            }),
            lock: Mutex::new(Some(lock)),
        })
    }

    pub fn add_documents(&self, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let docs = self.analyze(records);

        let mut state = self.state.lock();
        ensure_open(&state)?;
        self.push_pending(&mut state, docs);
        Ok(())
    }

    /// Atomically deletes every document containing `term`, then adds `record`.
    pub fn update_document(&self, term: &Term, record: Record) -> Result<()> {
        let docs = self.analyze(vec![record]);

        let mut state = self.state.lock();
        ensure_open(&state)?;
        delete_matching(&mut state, |doc| doc.has_term(term));
        self.push_pending(&mut state, docs);
        Ok(())
    }

    pub fn delete_terms(&self, terms: &[Term]) -> Result<()> {
        let mut state = self.state.lock();
        ensure_open(&state)?;
        let deleted = delete_matching(&mut state, |doc| terms.iter().any(|term| doc.has_term(term)));
        if deleted > 0 {
            state.version += 1;
        }
        Ok(())
    }

    pub fn delete_by_query(&self, query: &Query) -> Result<()> {
        let weights = QueryWeights::unscored();
        let matcher = DocumentMatcher::new(&weights);

        let mut state = self.state.lock();
        ensure_open(&state)?;
        let deleted = delete_matching(&mut state, |doc| matcher.matches(doc, query));
        if deleted > 0 {
            state.version += 1;
        }
        Ok(())
    }

    pub fn delete_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        ensure_open(&state)?;
        if state.segments.is_empty() && state.pending.is_empty() {
            return Ok(());
        }
        state.segments.clear();
        state.pending.clear();
        state.version += 1;
        debug!(path = %self.storage.base_dir().display(), "all documents deleted");
        Ok(())
    }

    /// Persists new segments and deletes, then publishes a new commit point.
    /// Returns the committed generation.
    pub fn commit(&self) -> Result<u64> {
        let mut state = self.state.lock();
        ensure_open(&state)?;
        self.commit_locked(&mut state)
    }

    fn commit_locked(&self, state: &mut WriterState) -> Result<u64> {
        if state.version == state.committed_version {
            return Ok(state.generation);
        }
        freeze_pending(state);

        // Fully deleted segments are dropped from the commit.
        state.segments.retain(|s| s.live_count() > 0);

        let mut committed = Vec::with_capacity(state.segments.len());
        for segment in &mut state.segments {
            let metadata = match &segment.metadata {
                Some(metadata) => metadata.clone(),
                None => {
                    let docs = &segment.segment.docs;
                    let metadata = SegmentWriter::write(
                        &self.storage,
                        segment.segment.id,
                        docs.iter().map(|d| (d.doc_id, &d.record)),
                    )?;
                    segment.metadata = Some(metadata.clone());
                    metadata
                }
            };
            committed.push(CommittedSegment::new(segment.segment.id, metadata, &segment.deletes)?);
        }

        let commit = CommitPoint {
            generation: state.generation + 1,
            next_doc_id: state.next_doc_id,
            segments: committed,
            timestamp: chrono::Utc::now(),
        };
        commit.save(&self.storage)?;

        state.generation = commit.generation;
        state.committed_version = state.version;

        let referenced: HashSet<SegmentId> = commit.segments.iter().map(|s| s.id).collect();
        remove_unreferenced_files(&self.storage, &referenced);

        debug!(generation = commit.generation, "index committed");
        Ok(commit.generation)
    }

    /// Point-in-time view of everything added so far, committed or not.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut state = self.state.lock();
        ensure_open(&state)?;
        freeze_pending(&mut state);

        let segments = state
            .segments
            .iter()
            .map(|s| SnapshotSegment::new(Arc::clone(&s.segment), s.deletes.clone()))
            .collect();
        Ok(Snapshot::new(SnapshotOrigin::Writer(state.version), segments, &self.tracker))
    }

    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        let state = self.state.lock();
        state.version != state.committed_version
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Commits (when configured to) and releases the directory lock.
    /// Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        let result = if self.config.commit_on_close {
            self.commit_locked(&mut state).map(|_| ())
        } else {
            Ok(())
        };
        state.closed = true;
        state.segments.clear();
        state.pending.clear();
        drop(state);

        self.lock.lock().take();
        debug!(path = %self.storage.base_dir().display(), "index writer closed");
        result
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    fn analyze(&self, records: Vec<Record>) -> Vec<IndexedDoc> {
        let docs = records.into_iter().map(|r| (DocId(0), r)).collect();
        IndexedDoc::analyze_all(docs, &self.analyzer)
    }

    fn push_pending(&self, state: &mut WriterState, docs: Vec<IndexedDoc>) {
        for mut doc in docs {
            doc.doc_id = DocId(state.next_doc_id);
            state.next_doc_id += 1;
            state.pending.push(doc);
        }
        state.version += 1;

        if state.pending.len() >= self.config.max_buffered_docs {
            freeze_pending(state);
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.closed && state.version != state.committed_version {
            warn!(
                path = %self.storage.base_dir().display(),
                "index writer dropped without close, uncommitted changes are lost"
            );
        }
    }
}

fn ensure_open(state: &WriterState) -> Result<()> {
    if state.closed {
        return Err(IndexError::Closed("index writer"));
    }
    Ok(())
}

fn freeze_pending(state: &mut WriterState) {
    if state.pending.is_empty() {
        return;
    }
    let docs = mem::take(&mut state.pending);
    state.segments.push(WriterSegment {
        segment: Arc::new(InvertedSegment::build(SegmentId::new(), docs)),
        deletes: RoaringBitmap::new(),
        metadata: None,
    });
}

/// Marks matching live documents deleted; returns how many were.
fn delete_matching<F>(state: &mut WriterState, predicate: F) -> usize
where
    F: Fn(&IndexedDoc) -> bool,
{
    let mut deleted = 0;
    for segment in &mut state.segments {
        for (ord, doc) in segment.segment.docs.iter().enumerate() {
            if !segment.deletes.contains(ord as u32) && predicate(doc) {
                segment.deletes.insert(ord as u32);
                deleted += 1;
            }
        }
    }
    let pending = state.pending.len();
    state.pending.retain(|doc| !predicate(doc));
    deleted + pending - state.pending.len()
}

fn remove_unreferenced_files(storage: &StorageLayout, referenced: &HashSet<SegmentId>) {
    let entries = match fs::read_dir(&storage.segments_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "failed to list segment files");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let keep = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| uuid::Uuid::parse_str(stem).ok())
            .is_some_and(|id| referenced.contains(&SegmentId(id)));
        if keep {
            continue;
        }
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove unreferenced segment file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FieldValue, StoredValue};
    use crate::reader::snapshot_reader::DirectoryReader;
    use crate::search::executor::Searcher;

    fn record(id: &str, body: &str) -> Record {
        Record::new()
            .with("_id", FieldValue::Keyword(id.to_string()))
            .with("_id", FieldValue::Stored(StoredValue::Str(id.to_string())))
            .with("body", FieldValue::Text(body.to_string()))
    }

    fn open(dir: &std::path::Path, tracker: &Arc<SnapshotTracker>) -> IndexWriter {
        IndexWriter::open(
            StorageLayout::new(dir.to_path_buf()).unwrap(),
            Arc::new(PerFieldAnalyzer::default()),
            WriterConfig::default(),
            Arc::clone(tracker),
        )
        .unwrap()
    }

    #[test]
    fn test_nrt_snapshot_sees_uncommitted_docs() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);

        writer
            .add_documents(vec![record("a", "red fox"), record("b", "blue whale")])
            .unwrap();
        let snapshot = writer.snapshot().unwrap();
        assert_eq!(snapshot.num_docs(), 2);
        assert_eq!(snapshot.origin(), SnapshotOrigin::Writer(writer.version()));

        writer.delete_terms(&[Term::new("_id", "a")]).unwrap();
        assert_eq!(snapshot.num_docs(), 2);
        assert_eq!(writer.snapshot().unwrap().num_docs(), 1);
    }

    #[test]
    fn test_delete_without_match_keeps_version() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);

        writer.add_documents(vec![record("a", "red fox")]).unwrap();
        let version = writer.version();
        writer.delete_terms(&[Term::new("_id", "missing")]).unwrap();
        writer.delete_by_query(&Query::term("body", "whale")).unwrap();
        assert_eq!(writer.version(), version);

        writer.delete_by_query(&Query::term("body", "fox")).unwrap();
        assert!(writer.version() > version);
        let version = writer.version();
        writer.commit().unwrap();
        writer.delete_all().unwrap();
        assert_eq!(writer.version(), version);
        assert!(!writer.has_uncommitted_changes());
    }

    #[test]
    fn test_update_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);

        writer.add_documents(vec![record("a", "red fox")]).unwrap();
        writer.commit().unwrap();
        writer
            .update_document(&Term::new("_id", "a"), record("a", "green frog"))
            .unwrap();

        let snapshot = writer.snapshot().unwrap();
        let searcher = Searcher::new(&snapshot, 1000);
        assert_eq!(snapshot.num_docs(), 1);
        assert_eq!(searcher.count(&Query::term("body", "frog")), 1);
        assert_eq!(searcher.count(&Query::term("body", "fox")), 0);
    }

    #[test]
    fn test_commit_is_visible_to_directory_readers() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);
        writer
            .add_documents(vec![record("a", "one"), record("b", "two"), record("c", "three")])
            .unwrap();
        writer.delete_by_query(&Query::term("body", "two")).unwrap();
        let generation = writer.commit().unwrap();
        assert_eq!(generation, 1);
        assert!(!writer.has_uncommitted_changes());
        assert_eq!(writer.commit().unwrap(), 1);
        writer.close().unwrap();

        let reader = DirectoryReader::open(
            StorageLayout::new(dir.path().to_path_buf()).unwrap(),
            Arc::new(PerFieldAnalyzer::default()),
            Arc::clone(&tracker),
        );
        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.origin(), SnapshotOrigin::Commit(1));
        assert_eq!(snapshot.num_docs(), 2);
    }

    #[test]
    fn test_reopen_keeps_doc_ids_growing() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);
        writer.add_documents(vec![record("a", "x"), record("b", "y")]).unwrap();
        writer.close().unwrap();

        let writer = open(dir.path(), &tracker);
        writer.add_documents(vec![record("c", "z")]).unwrap();
        let snapshot = writer.snapshot().unwrap();
        let ids: Vec<u64> = snapshot
            .segments()
            .iter()
            .flat_map(|s| s.live_docs().map(|(_, d)| d.doc_id.0))
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_closed_writer_rejects_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);
        writer.close().unwrap();
        writer.close().unwrap();

        let err = writer.add_documents(vec![record("a", "x")]).unwrap_err();
        assert!(matches!(err, IndexError::Closed(_)));

        // the directory lock is released on close
        let _second = open(dir.path(), &tracker);
    }

    #[test]
    fn test_delete_all_then_commit_drops_segment_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SnapshotTracker::new();
        let writer = open(dir.path(), &tracker);
        writer.add_documents(vec![record("a", "x")]).unwrap();
        writer.commit().unwrap();
        writer.delete_all().unwrap();
        writer.commit().unwrap();

        let files = fs::read_dir(&writer.storage().segments_dir).unwrap().count();
        assert_eq!(files, 0);
        assert_eq!(writer.snapshot().unwrap().num_docs(), 0);
    }
}
