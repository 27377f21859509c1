use std::marker::PhantomData;
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, warn};
use crate::api::index::{Index, IndexCursor, IndexReader, IndexWriter, ScoredElement};
use crate::core::error::Result;
use crate::query::builder::IndexQueryBuilder;
use crate::query::index_query::IndexQuery;

/// A handle borrowed from an [`IndexHolder`].
///
/// Every call is delegated except `close`, which does nothing: the handle is
/// shared with other borrowers and only the holder disposes of it.
#[derive(Debug)]
pub struct Shared<H> {
    inner: Arc<H>,
}

impl<H> Shared<H> {
    fn new(inner: Arc<H>) -> Self {
        Shared { inner }
    }

    /// Both handles wrap the same underlying writer or reader.
    pub fn same_as(&self, other: &Shared<H>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<H> Clone for Shared<H> {
    fn clone(&self) -> Self {
        Shared::new(Arc::clone(&self.inner))
    }
}

impl<T, W: IndexWriter<T>> IndexWriter<T> for Shared<W> {
    fn add(&self, elements: &[T]) -> Result<()> {
        self.inner.add(elements)
    }

    fn update(&self, elements: &[T]) -> Result<()> {
        self.inner.update(elements)
    }

    fn delete(&self, ids: &[&str]) -> Result<()> {
        self.inner.delete(ids)
    }

    fn delete_query(&self, query: &IndexQuery) -> Result<()> {
        self.inner.delete_query(query)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn commit(&self) -> Result<u64> {
        self.inner.commit()
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<T, R: IndexReader<T>> IndexReader<T> for Shared<R> {
    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn count_query(&self, query: &IndexQuery) -> Result<usize> {
        self.inner.count_query(query)
    }

    fn prepare_query(&self) -> IndexQueryBuilder {
        self.inner.prepare_query()
    }

    fn find(&self, ids: &[&str]) -> Result<Vec<T>> {
        self.inner.find(ids)
    }

    fn query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<T>> {
        self.inner.query(query, batch_size)
    }

    fn list(&self, query: &IndexQuery) -> Result<Vec<T>> {
        self.inner.list(query)
    }

    fn find_first(&self, query: &IndexQuery) -> Result<Option<T>> {
        self.inner.find_first(query)
    }

    fn find_one(&self, id: &str) -> Result<Option<T>> {
        self.inner.find_one(id)
    }

    fn get(&self, id: &str) -> Result<T> {
        self.inner.get(id)
    }

    fn scored_query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<ScoredElement<T>>> {
        self.inner.scored_query(query, batch_size)
    }

    fn scored_list(&self, query: &IndexQuery) -> Result<Vec<ScoredElement<T>>> {
        self.inner.scored_list(query)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct Handles<W, R> {
    writer: Option<Arc<W>>,
    reader: Option<Arc<R>>,
}

/// Opens at most one writer and one reader per index, on demand.
///
/// While a writer is open the reader is a near-real-time reader over it.
/// Opening a writer closes a reader opened over the last commit, closing the
/// writer closes the reader derived from it.
pub struct IndexHolder<T, I: Index<T>> {
    index: I,
    handles: Mutex<Handles<I::Writer, I::Reader>>,
    _element: PhantomData<fn() -> T>,
}

impl<T, I: Index<T>> IndexHolder<T, I> {
    pub fn new(index: I) -> Self {
        IndexHolder {
            index,
            handles: Mutex::new(Handles {
                writer: None,
                reader: None,
            }),
            _element: PhantomData,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn writer(&self) -> Result<Shared<I::Writer>> {
        let mut handles = self.handles.lock();
        if let Some(writer) = &handles.writer {
            return Ok(Shared::new(Arc::clone(writer)));
        }
        let writer = Arc::new(self.index.open_writer()?);
        handles.writer = Some(Arc::clone(&writer));
        close_reader::<T, _, _>(&mut *handles);
        Ok(Shared::new(writer))
    }

    pub fn reader(&self) -> Result<Shared<I::Reader>> {
        let mut handles = self.handles.lock();
        if let Some(reader) = &handles.reader {
            return Ok(Shared::new(Arc::clone(reader)));
        }
        let reader = Arc::new(self.index.open_reader_for(handles.writer.as_deref())?);
        handles.reader = Some(Arc::clone(&reader));
        Ok(Shared::new(reader))
    }

    pub fn close_writer(&self) {
        let mut handles = self.handles.lock();
        close_writer::<T, _, _>(&mut *handles);
    }

    pub fn close_reader(&self) {
        let mut handles = self.handles.lock();
        close_reader::<T, _, _>(&mut *handles);
    }

    /// Closes the writer then the reader. The holder can be used again
    /// afterwards.
    pub fn close(&self) {
        let mut handles = self.handles.lock();
        close_writer::<T, _, _>(&mut *handles);
        close_reader::<T, _, _>(&mut *handles);
    }
}

impl<T, I: Index<T>> Drop for IndexHolder<T, I> {
    fn drop(&mut self) {
        self.close();
    }
}

fn close_writer<T, W: IndexWriter<T>, R: IndexReader<T>>(handles: &mut Handles<W, R>) {
    if let Some(writer) = handles.writer.take() {
        if let Err(error) = writer.close() {
            warn!(%error, "failed to close index writer");
        }
        debug!("held writer closed");
        close_reader::<T, W, R>(handles);
    }
}

fn close_reader<T, W, R: IndexReader<T>>(handles: &mut Handles<W, R>) {
    if let Some(reader) = handles.reader.take() {
        if let Err(error) = reader.close() {
            warn!(%error, "failed to close index reader");
        }
        debug!("held reader closed");
    }
}
