use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use crate::api::index::IndexWriter;
use crate::core::error::Result;
use crate::entity::index::IndexCore;
use crate::index::inverted::Term;
use crate::query::index_query::IndexQuery;
use crate::writer::index_writer::IndexWriter as BackendWriter;

/// Typed writer of an [`EntityIndex`](crate::entity::EntityIndex).
///
/// Changes are visible to near-real-time readers right away and become
/// durable on `commit` or `close`.
pub struct EntityWriter<T> {
    core: Arc<IndexCore<T>>,
    backend: Arc<BackendWriter>,
}

impl<T> EntityWriter<T> {
    pub(crate) fn new(core: Arc<IndexCore<T>>, backend: BackendWriter) -> Self {
        debug!(path = %core.path.display(), "entity writer opened");
        EntityWriter {
            core,
            backend: Arc::new(backend),
        }
    }

    pub(crate) fn backend(&self) -> &Arc<BackendWriter> {
        &self.backend
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        self.backend.has_uncommitted_changes()
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_closed()
    }

    fn id_term(&self, element: &T) -> Result<Term> {
        let id = self.core.mapper.element_id(element)?;
        Ok(Term::new(self.core.id_field()?, id))
    }
}

impl<T> IndexWriter<T> for EntityWriter<T> {
    fn add(&self, elements: &[T]) -> Result<()> {
        let records = elements
            .iter()
            .map(|element| self.core.mapper.to_record(element))
            .collect::<Result<Vec<_>>>()?;
        self.backend.add_documents(records)
    }

    fn update(&self, elements: &[T]) -> Result<()> {
        for element in elements {
            let term = self.id_term(element)?;
            self.backend.update_document(&term, self.core.mapper.to_record(element)?)?;
        }
        Ok(())
    }

    fn delete(&self, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let id_field = self.core.id_field()?;
        let terms: Vec<Term> = ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| Term::new(id_field, id))
            .collect();
        self.backend.delete_terms(&terms)
    }

    fn delete_query(&self, query: &IndexQuery) -> Result<()> {
        self.backend.delete_by_query(query.query())
    }

    fn clear(&self) -> Result<()> {
        self.backend.delete_all()
    }

    fn commit(&self) -> Result<u64> {
        self.backend.commit()
    }

    fn close(&self) -> Result<()> {
        self.backend.close()?;
        debug!(path = %self.core.path.display(), "entity writer closed");
        Ok(())
    }
}

impl<T> std::fmt::Debug for EntityWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityWriter")
            .field("path", &self.core.path)
            .field("closed", &self.backend.is_closed())
            .finish()
    }
}
