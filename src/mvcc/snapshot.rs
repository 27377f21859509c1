use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use chrono::{DateTime, Utc};
use roaring::RoaringBitmap;
use tracing::debug;
use crate::index::inverted::{IndexedDoc, InvertedSegment};

/// Where a snapshot was taken from, and the version it reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// A committed generation read from the directory.
    Commit(u64),
    /// The in-memory state of an open writer at a given version.
    Writer(u64),
}

/// Counts snapshots created and still alive for one index directory.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    created: AtomicU64,
    live: AtomicUsize,
}

impl SnapshotTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(SnapshotTracker::default())
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

/// Position of a document inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocAddress {
    pub segment: u32,
    pub ord: u32,
}

#[derive(Debug, Clone)]
pub struct SnapshotSegment {
    pub segment: Arc<InvertedSegment>,
    pub deletes: Arc<RoaringBitmap>,
}

impl SnapshotSegment {
    pub fn new(segment: Arc<InvertedSegment>, deletes: RoaringBitmap) -> Self {
        SnapshotSegment {
            segment,
            deletes: Arc::new(deletes),
        }
    }

    pub fn is_live(&self, ord: u32) -> bool {
        !self.deletes.contains(ord)
    }

    pub fn live_count(&self) -> usize {
        self.segment.len() - self.deletes.len() as usize
    }

    pub fn live_docs(&self) -> impl Iterator<Item = (u32, &IndexedDoc)> {
        self.segment
            .docs
            .iter()
            .enumerate()
            .map(|(ord, doc)| (ord as u32, doc))
            .filter(|(ord, _)| self.is_live(*ord))
    }
}

/// Immutable point-in-time view of an index.
///
/// Dropping the last handle releases the view; the tracker's live count goes
/// down at that moment.
#[derive(Debug)]
pub struct Snapshot {
    id: u64,
    origin: SnapshotOrigin,
    segments: Vec<SnapshotSegment>,
    timestamp: DateTime<Utc>,
    num_docs: usize,
    max_doc: usize,
    tracker: Arc<SnapshotTracker>,
}

impl Snapshot {
    pub fn new(origin: SnapshotOrigin, segments: Vec<SnapshotSegment>, tracker: &Arc<SnapshotTracker>) -> Self {
        let id = tracker.created.fetch_add(1, Ordering::SeqCst) + 1;
        tracker.live.fetch_add(1, Ordering::SeqCst);
        let num_docs = segments.iter().map(SnapshotSegment::live_count).sum();
        let max_doc = segments.iter().map(|s| s.segment.len()).sum();
        debug!(snapshot = id, ?origin, num_docs, "snapshot opened");
        Snapshot {
            id,
            origin,
            segments,
            timestamp: Utc::now(),
            num_docs,
            max_doc,
            tracker: Arc::clone(tracker),
        }
    }

    /// Unique per tracker; two handles with the same id share one view.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn segments(&self) -> &[SnapshotSegment] {
        &self.segments
    }

    /// Live documents.
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    /// Documents including deleted ones, as used for collection statistics.
    pub fn max_doc(&self) -> usize {
        self.max_doc
    }

    pub fn doc(&self, address: DocAddress) -> Option<&IndexedDoc> {
        let segment = self.segments.get(address.segment as usize)?;
        if !segment.is_live(address.ord) {
            return None;
        }
        segment.segment.docs.get(address.ord as usize)
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments
            .iter()
            .map(|s| s.segment.doc_freq(field, term) as u64)
            .sum()
    }

    pub fn avg_field_length(&self, field: &str) -> f32 {
        let (total, docs) = self.segments.iter().fold((0u64, 0u64), |acc, s| {
            let (total, docs) = s.segment.field_lengths(field);
            (acc.0 + total, acc.1 + docs as u64)
        });
        if docs == 0 { 1.0 } else { total as f32 / docs as f32 }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
        debug!(snapshot = self.id, "snapshot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PerFieldAnalyzer;
    use crate::core::types::{DocId, FieldValue, Record};
    use crate::storage::segment::SegmentId;

    fn segment(ids: &[u64]) -> Arc<InvertedSegment> {
        let docs = ids
            .iter()
            .map(|id| {
                let record = Record::new().with("body", FieldValue::Text(format!("word{} shared", id)));
                IndexedDoc::analyze(DocId(*id), record, &PerFieldAnalyzer::default())
            })
            .collect();
        Arc::new(InvertedSegment::build(SegmentId::new(), docs))
    }

    #[test]
    fn test_live_tracking() {
        let tracker = SnapshotTracker::new();
        let first = Snapshot::new(SnapshotOrigin::Commit(1), vec![], &tracker);
        let second = Snapshot::new(SnapshotOrigin::Commit(1), vec![], &tracker);
        assert_ne!(first.id(), second.id());
        assert_eq!(tracker.live(), 2);

        drop(first);
        assert_eq!(tracker.live(), 1);
        drop(second);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.created(), 2);
    }

    #[test]
    fn test_deletes_hide_documents() {
        let tracker = SnapshotTracker::new();
        let mut deletes = RoaringBitmap::new();
        deletes.insert(1);
        let snapshot = Snapshot::new(
            SnapshotOrigin::Writer(3),
            vec![SnapshotSegment::new(segment(&[0, 1, 2]), deletes)],
            &tracker,
        );

        assert_eq!(snapshot.num_docs(), 2);
        assert_eq!(snapshot.max_doc(), 3);
        assert!(snapshot.doc(DocAddress { segment: 0, ord: 1 }).is_none());
        assert_eq!(snapshot.doc(DocAddress { segment: 0, ord: 2 }).map(|d| d.doc_id), Some(DocId(2)));
        assert_eq!(snapshot.doc_freq("body", "shared"), 3);
        assert_eq!(snapshot.avg_field_length("body"), 2.0);
    }
}
