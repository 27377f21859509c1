use std::collections::BTreeSet;
use crate::core::error::{IndexError, Result};
use crate::core::types::Record;
use crate::index::inverted::IndexedDoc;
use crate::mvcc::snapshot::{DocAddress, Snapshot};
use crate::query::ast::Query;
use crate::query::matcher::DocumentMatcher;
use crate::scoring::scorer::QueryWeights;
use crate::search::results::{ScoreDoc, SortValue, TopDocs, TotalHits};
use crate::search::sort::{Sort, SortField};

/// Stateless query execution over one snapshot.
pub struct Searcher<'a> {
    snapshot: &'a Snapshot,
    total_hits_threshold: usize,
}

impl<'a> Searcher<'a> {
    pub fn new(snapshot: &'a Snapshot, total_hits_threshold: usize) -> Self {
        Searcher {
            snapshot,
            total_hits_threshold,
        }
    }

    pub fn num_docs(&self) -> usize {
        self.snapshot.num_docs()
    }

    /// Returns up to `max_hits` hits sorting strictly after `after`.
    ///
    /// The total is exact, except for ascending index order where collection
    /// stops once enough hits were gathered and at least
    /// `total_hits_threshold` matches were counted.
    pub fn search(
        &self,
        query: &Query,
        sort: &Sort,
        after: Option<&ScoreDoc>,
        max_hits: usize,
        with_scores: bool,
    ) -> Result<TopDocs> {
        if max_hits == 0 {
            return Err(IndexError::invalid_argument("max_hits must be greater than zero"));
        }

        let weights = if with_scores || sort.needs_scores() {
            QueryWeights::build(query, self.snapshot)
        } else {
            QueryWeights::unscored()
        };
        let matcher = DocumentMatcher::new(&weights);

        if sort.is_index_order() {
            return Ok(self.collect_in_order(query, &matcher, after, max_hits, with_scores));
        }

        let mut total = 0u64;
        let mut hits = Vec::new();
        for (segment_ord, segment) in self.snapshot.segments().iter().enumerate() {
            for (ord, doc) in segment.live_docs() {
                let Some(score) = matcher.score(doc, query) else {
                    continue;
                };
                total += 1;

                let score = if weights.is_enabled() { score } else { f32::NAN };
                let hit = ScoreDoc {
                    address: DocAddress {
                        segment: segment_ord as u32,
                        ord,
                    },
                    doc_id: doc.doc_id,
                    score,
                    sort_values: sort_values(sort, doc, score),
                };
                if let Some(after) = after {
                    if sort
                        .compare(&hit.sort_values, hit.doc_id, &after.sort_values, after.doc_id)
                        .is_le()
                    {
                        continue;
                    }
                }
                hits.push(hit);
            }
        }

        hits.sort_by(|a, b| sort.compare(&a.sort_values, a.doc_id, &b.sort_values, b.doc_id));
        hits.truncate(max_hits);

        Ok(TopDocs {
            hits,
            total_hits: TotalHits::exact(total),
        })
    }

    fn collect_in_order(
        &self,
        query: &Query,
        matcher: &DocumentMatcher<'_>,
        after: Option<&ScoreDoc>,
        max_hits: usize,
        with_scores: bool,
    ) -> TopDocs {
        let mut total = 0u64;
        let mut hits = Vec::with_capacity(max_hits.min(1024));
        let mut terminated_early = false;

        'segments: for (segment_ord, segment) in self.snapshot.segments().iter().enumerate() {
            for (ord, doc) in segment.live_docs() {
                if hits.len() >= max_hits && total >= self.total_hits_threshold as u64 {
                    terminated_early = true;
                    break 'segments;
                }
                let Some(score) = matcher.score(doc, query) else {
                    continue;
                };
                total += 1;

                if hits.len() >= max_hits || after.is_some_and(|a| doc.doc_id <= a.doc_id) {
                    continue;
                }
                let score = if with_scores { score } else { f32::NAN };
                hits.push(ScoreDoc {
                    address: DocAddress {
                        segment: segment_ord as u32,
                        ord,
                    },
                    doc_id: doc.doc_id,
                    score,
                    sort_values: vec![SortValue::Doc(doc.doc_id)],
                });
            }
        }

        let total_hits = if terminated_early {
            TotalHits::at_least(total)
        } else {
            TotalHits::exact(total)
        };
        TopDocs { hits, total_hits }
    }

    /// Exact number of live documents matching `query`.
    pub fn count(&self, query: &Query) -> usize {
        if matches!(query, Query::MatchAll) {
            return self.snapshot.num_docs();
        }
        let weights = QueryWeights::unscored();
        let matcher = DocumentMatcher::new(&weights);
        self.snapshot
            .segments()
            .iter()
            .flat_map(|segment| segment.live_docs())
            .filter(|(_, doc)| matcher.matches(doc, query))
            .count()
    }

    /// Stored fields of a hit, restricted to `projection` unless it is empty.
    pub fn stored_fields(&self, address: DocAddress, projection: &BTreeSet<String>) -> Result<Record> {
        self.snapshot
            .doc(address)
            .map(|doc| doc.record.stored_only(projection))
            .ok_or_else(|| {
                IndexError::invalid_argument(format!(
                    "no live document at segment {} ord {}",
                    address.segment, address.ord
                ))
            })
    }
}

fn sort_values(sort: &Sort, doc: &IndexedDoc, score: f32) -> Vec<SortValue> {
    sort.fields()
        .iter()
        .map(|field| match field {
            SortField::Score { .. } => SortValue::Score(score),
            SortField::Doc { .. } => SortValue::Doc(doc.doc_id),
            SortField::Field { name, .. } => SortValue::Field(doc.sort_keys.get(name).cloned()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use roaring::RoaringBitmap;
    use crate::analysis::PerFieldAnalyzer;
    use crate::core::types::{DocId, FieldValue, Number, SortKey, SortType, StoredValue};
    use crate::index::inverted::InvertedSegment;
    use crate::mvcc::snapshot::{SnapshotOrigin, SnapshotSegment, SnapshotTracker};
    use crate::query::ast::PointRangeQuery;
    use crate::storage::segment::SegmentId;

    fn snapshot(sizes: &[i32]) -> Snapshot {
        let docs = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let record = Record::new()
                    .with("_id", FieldValue::Keyword(format!("d{}", i)))
                    .with("body", FieldValue::Text(if i % 2 == 0 { "fox fox".into() } else { "fox dog cat".into() }))
                    .with("size", FieldValue::Point(Number::Int(*size)))
                    .with("size", FieldValue::Sorted(SortKey::Long(*size as i64)))
                    .with("_id", FieldValue::Stored(StoredValue::Str(format!("d{}", i))));
                IndexedDoc::analyze(DocId(i as u64), record, &PerFieldAnalyzer::default())
            })
            .collect();
        let segment = Arc::new(InvertedSegment::build(SegmentId::new(), docs));
        Snapshot::new(
            SnapshotOrigin::Writer(1),
            vec![SnapshotSegment::new(segment, RoaringBitmap::new())],
            &SnapshotTracker::new(),
        )
    }

    #[test]
    fn test_sorted_search_after() {
        let snapshot = snapshot(&[5, 3, 9, 1]);
        let searcher = Searcher::new(&snapshot, 1000);
        let sort = Sort::new(vec![SortField::Field {
            name: "size".into(),
            sort_type: SortType::Int,
            reverse: false,
        }]);

        let first = searcher.search(&Query::MatchAll, &sort, None, 2, false).unwrap();
        let ids: Vec<u64> = first.hits.iter().map(|h| h.doc_id.0).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(first.total_hits, TotalHits::exact(4));
        assert!(first.hits[0].score.is_nan());

        let next = searcher
            .search(&Query::MatchAll, &sort, first.hits.last(), 2, false)
            .unwrap();
        let ids: Vec<u64> = next.hits.iter().map(|h| h.doc_id.0).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_relevance_prefers_higher_term_frequency() {
        let snapshot = snapshot(&[1, 2, 3]);
        let searcher = Searcher::new(&snapshot, 1000);
        let top = searcher
            .search(&Query::term("body", "fox"), &Sort::relevance(), None, 10, true)
            .unwrap();
        assert_eq!(top.hits.len(), 3);
        assert!(top.hits[0].score >= top.hits[2].score);
        assert_eq!(top.hits[0].doc_id, DocId(0));
    }

    #[test]
    fn test_index_order_terminates_early() {
        let snapshot = snapshot(&[1, 2, 3, 4, 5, 6]);
        let searcher = Searcher::new(&snapshot, 2);
        let top = searcher
            .search(&Query::MatchAll, &Sort::index_order(), None, 2, false)
            .unwrap();
        assert_eq!(top.hits.len(), 2);
        assert!(!top.total_hits.is_exact());
        assert!(top.total_hits.value >= 2);
        assert_eq!(searcher.count(&Query::MatchAll), 6);

        let rest = searcher
            .search(&Query::MatchAll, &Sort::index_order(), top.hits.last(), 10, false)
            .unwrap();
        assert_eq!(rest.hits.len(), 4);
        assert_eq!(rest.total_hits, TotalHits::exact(6));
    }

    #[test]
    fn test_count_and_stored_fields() {
        let snapshot = snapshot(&[1, 2, 3, 4]);
        let searcher = Searcher::new(&snapshot, 1000);
        let query = Query::PointRange(PointRangeQuery::int("size", 2, 3));
        assert_eq!(searcher.count(&query), 2);

        let top = searcher.search(&query, &Sort::index_order(), None, 1, false).unwrap();
        let record = searcher.stored_fields(top.hits[0].address, &BTreeSet::new()).unwrap();
        assert_eq!(record.stored_str("_id"), Some("d1"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_rejects_zero_hits() {
        let snapshot = snapshot(&[1]);
        let searcher = Searcher::new(&snapshot, 1000);
        let err = searcher
            .search(&Query::MatchAll, &Sort::relevance(), None, 0, false)
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }
}
