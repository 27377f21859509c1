use std::sync::Arc;
use tracing::{debug, info};
use crate::api::index::{IndexCursor, IndexReader, IndexWriter, ProgressCallback, ScoredElement};
use crate::core::error::Result;
use crate::core::types::Record;
use crate::entity::index::IndexCore;
use crate::query::ast::{BoolQuery, Occur, Query};
use crate::query::builder::IndexQueryBuilder;
use crate::query::index_query::IndexQuery;
use crate::reader::reader_pool::ReaderManager;
use crate::search::cursor::{CursorRequest, HitMapper, SearchCursor};
use crate::search::executor::Searcher;
use crate::search::results::ScoreDoc;

/// Typed reader of an [`EntityIndex`](crate::entity::EntityIndex).
///
/// Every cursor leases the snapshot cached by the reader's manager; a new
/// snapshot is only opened once the underlying data changed.
pub struct EntityReader<T> {
    core: Arc<IndexCore<T>>,
    manager: ReaderManager,
}

impl<T: 'static> EntityReader<T> {
    pub(crate) fn new(core: Arc<IndexCore<T>>, manager: ReaderManager) -> Self {
        debug!(
            path = %core.path.display(),
            near_real_time = manager.source().is_writer(),
            "entity reader opened"
        );
        EntityReader { core, manager }
    }

    /// Identifier of the snapshot the next cursor would read.
    pub fn snapshot_id(&self) -> Result<u64> {
        let lease = self.manager.acquire()?;
        Ok(lease.snapshot()?.id())
    }

    pub fn is_closed(&self) -> bool {
        self.manager.is_closed()
    }

    /// Streams every element through `transform` into `target`, in batches
    /// of `reindex_batch_size`.
    ///
    /// Progress expects one unit per element plus one per batch.
    pub fn reindex_into<V, W, F>(&self, target: &W, mut transform: F, progress: &dyn ProgressCallback) -> Result<()>
    where
        W: IndexWriter<V> + ?Sized,
        F: FnMut(T) -> V,
    {
        let count = self.count()? as u64;
        let batch_size = self.core.settings.reindex_batch_size;
        let batches = count.div_ceil(batch_size as u64);
        progress.set_expected(count + batches);
        if count == 0 {
            return Ok(());
        }

        info!(path = %self.core.path.display(), count, batches, "reindex started");
        let cursor = self.query(&IndexQuery::all(), self.core.settings.reindex_fetch_size)?;
        let mut chunk = Vec::with_capacity(batch_size.min(count as usize));
        for element in cursor {
            chunk.push(transform(element?));
            progress.add_completed();
            if chunk.len() == batch_size {
                target.add(&chunk)?;
                progress.add_completed();
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            target.add(&chunk)?;
            progress.add_completed();
        }
        info!(path = %self.core.path.display(), count, "reindex finished");
        Ok(())
    }

    fn request(&self, query: &IndexQuery, batch_size: usize, with_scores: bool) -> Result<CursorRequest> {
        let sort = query.sort().to_sort(self.core.mapper.field_types())?;
        let mut projection = query.projection().clone();
        if !projection.is_empty() {
            if let Some(payload) = self.core.mapper.payload_field() {
                projection.insert(payload.to_string());
            }
        }
        Ok(CursorRequest {
            query: query.query().clone(),
            sort,
            limit: query.limit(),
            skip: query.skip(),
            projection,
            batch_size,
            with_scores,
            total_hits_threshold: self.core.settings.total_hits_threshold,
        })
    }

    fn open_cursor<R>(&self, request: CursorRequest, map_hit: HitMapper<R>) -> Result<SearchCursor<R>> {
        let lease = self.manager.acquire()?;
        SearchCursor::open(lease, request, map_hit)
    }
}

impl<T: 'static> IndexReader<T> for EntityReader<T> {
    fn count(&self) -> Result<usize> {
        let lease = self.manager.acquire()?;
        Ok(lease.snapshot()?.num_docs())
    }

    fn count_query(&self, query: &IndexQuery) -> Result<usize> {
        let lease = self.manager.acquire()?;
        let snapshot = lease.snapshot()?;
        let searcher = Searcher::new(&snapshot, self.core.settings.total_hits_threshold);
        Ok(searcher.count(query.query()))
    }

    fn prepare_query(&self) -> IndexQueryBuilder {
        IndexQueryBuilder::new(self.core.query_context.clone())
    }

    fn find(&self, ids: &[&str]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_field = self.core.id_field()?;
        let mut clauses = BoolQuery::new();
        for id in ids {
            clauses.add(Occur::Should, Query::term(id_field, *id));
        }
        let cursor = self.query(&IndexQuery::of(Query::Bool(clauses)), ids.len())?;
        cursor.collect()
    }

    fn query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<T>> {
        let request = self.request(query, batch_size, false)?;
        let mapper = Arc::clone(&self.core.mapper);
        self.open_cursor(request, Box::new(move |_: &ScoreDoc, record: &Record| mapper.from_record(record)))
    }

    fn list(&self, query: &IndexQuery) -> Result<Vec<T>> {
        self.query(query, self.core.settings.list_batch_size)?.collect()
    }

    fn find_first(&self, query: &IndexQuery) -> Result<Option<T>> {
        let mut cursor = self.query(query, 1)?;
        cursor.next().transpose()
    }

    fn scored_query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<ScoredElement<T>>> {
        let request = self.request(query, batch_size, true)?;
        let mapper = Arc::clone(&self.core.mapper);
        self.open_cursor(
            request,
            Box::new(move |hit: &ScoreDoc, record: &Record| -> Result<ScoredElement<T>> {
                Ok(ScoredElement::new(mapper.from_record(record)?, hit.score))
            }),
        )
    }

    fn scored_list(&self, query: &IndexQuery) -> Result<Vec<ScoredElement<T>>> {
        self.scored_query(query, self.core.settings.list_batch_size)?.collect()
    }

    fn close(&self) -> Result<()> {
        if !self.manager.is_closed() {
            self.manager.close();
            debug!(path = %self.core.path.display(), "entity reader closed");
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for EntityReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityReader")
            .field("path", &self.core.path)
            .field("near_real_time", &self.manager.source().is_writer())
            .field("closed", &self.manager.is_closed())
            .finish()
    }
}
