use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;
use crate::core::error::{IndexError, Result};
use crate::core::types::Record;
use crate::query::ast::Query;
use crate::reader::reader_pool::ReaderLease;
use crate::search::executor::Searcher;
use crate::search::results::{ScoreDoc, TotalHits};
use crate::search::sort::Sort;

/// Turns a hit and its stored fields into a cursor item.
pub type HitMapper<T> = Box<dyn Fn(&ScoreDoc, &Record) -> Result<T> + Send + Sync>;

/// What a cursor executes, already compiled against the mapper.
#[derive(Debug, Clone)]
pub struct CursorRequest {
    pub query: Query,
    pub sort: Sort,
    pub limit: usize,
    pub skip: usize,
    /// Stored fields to load; empty loads all of them.
    pub projection: BTreeSet<String>,
    pub batch_size: usize,
    pub with_scores: bool,
    pub total_hits_threshold: usize,
}

/// Lazy, batched, forward-only iteration over one reader snapshot.
///
/// The cursor holds one lease on its reader instance from creation until
/// `close` (or drop). Each batch resumes after the last hit of the previous
/// one, so results stay consistent while other threads write.
pub struct SearchCursor<T> {
    lease: ReaderLease,
    request: CursorRequest,
    map_hit: HitMapper<T>,
    remaining: usize,
    batch: Vec<ScoreDoc>,
    index: usize,
    last: Option<ScoreDoc>,
    total_hits: TotalHits,
    started: bool,
    exhausted: bool,
}

impl<T> SearchCursor<T> {
    /// Fetches the first batch right away.
    pub fn open(lease: ReaderLease, request: CursorRequest, map_hit: HitMapper<T>) -> Result<Self> {
        if request.batch_size == 0 {
            return Err(IndexError::invalid_argument("batch size must be greater than zero"));
        }
        let mut cursor = SearchCursor {
            lease,
            remaining: request.limit,
            request,
            map_hit,
            batch: Vec::new(),
            index: 0,
            last: None,
            total_hits: TotalHits::exact(0),
            started: false,
            exhausted: false,
        };
        cursor.fetch()?;
        debug!(
            query = %cursor.request.query,
            batch_size = cursor.request.batch_size,
            min_total_hits = cursor.total_hits.value,
            "cursor opened"
        );
        Ok(cursor)
    }

    /// Exact hit count, recounted when the searcher only reported a lower bound.
    pub fn total_hits(&self) -> Result<u64> {
        if self.total_hits.is_exact() {
            return Ok(self.total_hits.value);
        }
        let snapshot = self.lease.snapshot()?;
        let searcher = Searcher::new(&snapshot, self.request.total_hits_threshold);
        Ok(searcher.count(&self.request.query) as u64)
    }

    /// Hit count as reported by the last fetch, exact or a lower bound.
    pub fn min_total_hits(&self) -> u64 {
        self.total_hits.value
    }

    /// Result budget not fetched yet.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Fetches the next batch when the current one is consumed.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.index < self.batch.len() {
            return Ok(true);
        }
        if self.exhausted {
            return Ok(false);
        }
        self.fetch()?;
        Ok(self.index < self.batch.len())
    }

    /// Fails with `NoSuchElement` past the last result.
    pub fn next_element(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(IndexError::NoSuchElement);
        }
        let hit = &self.batch[self.index];
        self.index += 1;

        let snapshot = self.lease.snapshot()?;
        let searcher = Searcher::new(&snapshot, self.request.total_hits_threshold);
        let record = searcher.stored_fields(hit.address, &self.request.projection)?;
        (self.map_hit)(hit, &record)
    }

    /// Releases the reader lease; later calls do nothing.
    pub fn close(&mut self) {
        if self.lease.is_closed() {
            return;
        }
        self.lease.close();
        self.batch.clear();
        self.index = 0;
        self.remaining = 0;
        self.exhausted = true;
        debug!("cursor closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_closed()
    }

    fn fetch(&mut self) -> Result<()> {
        if let Some(last) = self.batch.pop() {
            self.last = Some(last);
        }
        self.batch.clear();
        self.index = 0;

        if self.remaining == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let snapshot = self.lease.snapshot()?;
        let searcher = Searcher::new(&snapshot, self.request.total_hits_threshold);
        let request = &self.request;

        if !self.started {
            self.started = true;
            if request.skip > 0 {
                let skipped = searcher.search(&request.query, &request.sort, None, request.skip, false)?;
                if skipped.hits.len() < request.skip {
                    self.total_hits = skipped.total_hits;
                    self.remaining = 0;
                    self.exhausted = true;
                    return Ok(());
                }
                self.last = skipped.hits.into_iter().last();
            }
        }

        let max_hits = self.remaining.min(request.batch_size);
        let top = searcher.search(
            &request.query,
            &request.sort,
            self.last.as_ref(),
            max_hits,
            request.with_scores,
        )?;

        self.total_hits = top.total_hits;
        self.remaining -= top.hits.len();
        if top.hits.len() < max_hits || self.remaining == 0 {
            self.exhausted = true;
        }
        self.batch = top.hits;
        Ok(())
    }
}

impl<T> Iterator for SearchCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_element()),
            Ok(false) => None,
            Err(error) => {
                self.exhausted = true;
                self.batch.clear();
                Some(Err(error))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = self.batch.len() - self.index;
        let upper = buffered.saturating_add(self.remaining);
        (buffered, Some(upper.min(buffered.saturating_add(self.total_hits.value as usize))))
    }
}

impl<T> fmt::Debug for SearchCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCursor")
            .field("query", &self.request.query)
            .field("remaining", &self.remaining)
            .field("buffered", &(self.batch.len() - self.index))
            .field("total_hits", &self.total_hits)
            .field("closed", &self.lease.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::analysis::PerFieldAnalyzer;
    use crate::core::config::WriterConfig;
    use crate::core::types::{FieldValue, Number, SortKey, SortType, StoredValue};
    use crate::mvcc::snapshot::SnapshotTracker;
    use crate::query::ast::PointRangeQuery;
    use crate::reader::reader_pool::{ReaderManager, ReaderSource};
    use crate::search::sort::SortField;
    use crate::storage::layout::StorageLayout;
    use crate::writer::index_writer::IndexWriter;

    fn manager(dir: &std::path::Path, count: i32) -> ReaderManager {
        let writer = IndexWriter::open(
            StorageLayout::new(dir.to_path_buf()).unwrap(),
            Arc::new(PerFieldAnalyzer::default()),
            WriterConfig::default(),
            SnapshotTracker::new(),
        )
        .unwrap();
        let records = (0..count)
            .map(|i| {
                Record::new()
                    .with("id", FieldValue::Stored(StoredValue::Str(format!("r{}", i))))
                    .with("size", FieldValue::Point(Number::Int(i)))
                    .with("size", FieldValue::Sorted(SortKey::Long((count - i) as i64)))
            })
            .collect();
        writer.add_documents(records).unwrap();
        ReaderManager::new(ReaderSource::Writer(Arc::new(writer)))
    }

    fn request(limit: usize, skip: usize, batch_size: usize) -> CursorRequest {
        CursorRequest {
            query: Query::MatchAll,
            sort: Sort::index_order(),
            limit,
            skip,
            projection: BTreeSet::new(),
            batch_size,
            with_scores: false,
            total_hits_threshold: 1000,
        }
    }

    fn ids() -> HitMapper<String> {
        Box::new(|_: &ScoreDoc, record: &Record| {
            record
                .stored_str("id")
                .map(str::to_string)
                .ok_or_else(|| IndexError::Decode("no id".into()))
        })
    }

    #[test]
    fn test_batches_respect_limit() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 10);
        let cursor = SearchCursor::open(manager.acquire().unwrap(), request(7, 0, 3), ids()).unwrap();

        let items: Vec<String> = cursor.collect::<Result<_>>().unwrap();
        assert_eq!(items, vec!["r0", "r1", "r2", "r3", "r4", "r5", "r6"]);
    }

    #[test]
    fn test_skip_and_sorted_resume() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 6);
        let mut req = request(usize::MAX, 2, 2);
        req.sort = Sort::new(vec![SortField::Field {
            name: "size".into(),
            sort_type: SortType::Long,
            reverse: false,
        }]);
        let mut cursor = SearchCursor::open(manager.acquire().unwrap(), req, ids()).unwrap();

        assert_eq!(cursor.min_total_hits(), 6);
        let items: Vec<String> = cursor.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(items, vec!["r3", "r2", "r1", "r0"]);
        assert!(matches!(cursor.next_element(), Err(IndexError::NoSuchElement)));
    }

    #[test]
    fn test_skip_past_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 3);
        let mut cursor = SearchCursor::open(manager.acquire().unwrap(), request(10, 5, 2), ids()).unwrap();
        assert!(!cursor.has_next().unwrap());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_total_hits_recounts_lower_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 20);
        let mut req = request(2, 0, 2);
        req.total_hits_threshold = 1;
        let cursor = SearchCursor::open(manager.acquire().unwrap(), req, ids()).unwrap();
        assert!(cursor.min_total_hits() < 20);
        assert!(cursor.min_total_hits() <= cursor.total_hits().unwrap());
        assert_eq!(cursor.total_hits().unwrap(), 20);

        let mut req = request(5, 0, 5);
        req.query = Query::PointRange(PointRangeQuery::int("size", 0, 3));
        req.sort = Sort::relevance();
        let cursor = SearchCursor::open(manager.acquire().unwrap(), req, ids()).unwrap();
        assert_eq!(cursor.min_total_hits(), 4);
        assert_eq!(cursor.total_hits().unwrap(), 4);
    }

    #[test]
    fn test_close_releases_lease() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 3);
        let mut cursor = SearchCursor::open(manager.acquire().unwrap(), request(10, 0, 1), ids()).unwrap();
        let instance = Arc::clone(cursor.lease.instance().unwrap());
        assert_eq!(instance.ref_count(), 2);

        cursor.close();
        cursor.close();
        assert_eq!(instance.ref_count(), 1);
        assert!(cursor.is_closed());
        assert!(cursor.next().is_none());
    }
}
