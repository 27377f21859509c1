use std::fmt;
use crate::core::error::{IndexError, Result};
use crate::query::builder::IndexQueryBuilder;
use crate::query::index_query::IndexQuery;
use crate::search::cursor::SearchCursor;

/// Lazy, batched sequence of query results. Holds one reader reference
/// until closed or dropped.
pub type IndexCursor<T> = SearchCursor<T>;

/// An element and the relevance score the searcher gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredElement<T> {
    pub element: T,
    pub score: f32,
}

impl<T> ScoredElement<T> {
    pub fn new(element: T, score: f32) -> Self {
        ScoredElement { element, score }
    }

    pub fn element(&self) -> &T {
        &self.element
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn into_element(self) -> T {
        self.element
    }
}

impl<T: fmt::Display> ScoredElement<T> {
    /// One `element : score` line per entry, elements padded to a common width.
    pub fn print(elements: &[ScoredElement<T>]) -> String {
        Self::print_with(elements, |e| e.to_string())
    }
}

impl<T> ScoredElement<T> {
    pub fn print_with<F>(elements: &[ScoredElement<T>], describe: F) -> String
    where
        F: Fn(&T) -> String,
    {
        let labels: Vec<String> = elements.iter().map(|e| describe(&e.element)).collect();
        let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let mut out = String::new();
        for (label, scored) in labels.iter().zip(elements) {
            out.push_str(&format!("{:<width$} : {:.3}\n", label, scored.score, width = width));
        }
        out
    }
}

impl<T: fmt::Display> fmt::Display for ScoredElement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.element, self.score)
    }
}

/// Progress of a reindex: one unit per copied element plus one per written
/// batch.
pub trait ProgressCallback {
    fn set_expected(&self, expected: u64);

    fn add_completed(&self);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn set_expected(&self, _expected: u64) {}

    fn add_completed(&self) {}
}

/// Typed write access to an index.
pub trait IndexWriter<T>: Send + Sync {
    fn add(&self, elements: &[T]) -> Result<()>;

    fn add_one(&self, element: &T) -> Result<()> {
        self.add(std::slice::from_ref(element))
    }

    /// Replaces the indexed element sharing each element's identifier.
    fn update(&self, elements: &[T]) -> Result<()>;

    fn update_one(&self, element: &T) -> Result<()> {
        self.update(std::slice::from_ref(element))
    }

    fn delete(&self, ids: &[&str]) -> Result<()>;

    fn delete_one(&self, id: &str) -> Result<()> {
        self.delete(&[id])
    }

    fn delete_query(&self, query: &IndexQuery) -> Result<()>;

    /// Removes every element.
    fn clear(&self) -> Result<()>;

    /// Makes pending changes durable; returns the commit generation.
    fn commit(&self) -> Result<u64>;

    fn close(&self) -> Result<()>;
}

/// Typed read access to an index.
pub trait IndexReader<T>: Send + Sync {
    /// Live elements.
    fn count(&self) -> Result<usize>;

    fn count_query(&self, query: &IndexQuery) -> Result<usize>;

    fn prepare_query(&self) -> IndexQueryBuilder;

    /// Elements with any of `ids`, in no particular order.
    fn find(&self, ids: &[&str]) -> Result<Vec<T>>;

    fn query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<T>>;

    fn list(&self, query: &IndexQuery) -> Result<Vec<T>>;

    fn find_first(&self, query: &IndexQuery) -> Result<Option<T>>;

    fn find_one(&self, id: &str) -> Result<Option<T>> {
        Ok(self.find(&[id])?.into_iter().next())
    }

    /// Fails with `NotFound` when no element has this identifier.
    fn get(&self, id: &str) -> Result<T> {
        self.find_one(id)?
            .ok_or_else(|| IndexError::NotFound(format!("element {} not found", id)))
    }

    fn scored_query(&self, query: &IndexQuery, batch_size: usize) -> Result<IndexCursor<ScoredElement<T>>>;

    fn scored_list(&self, query: &IndexQuery) -> Result<Vec<ScoredElement<T>>>;

    fn close(&self) -> Result<()>;
}

/// A logical index: opens readers and writers over one storage location.
pub trait Index<T>: Send + Sync {
    type Writer: IndexWriter<T>;
    type Reader: IndexReader<T>;

    fn open_writer(&self) -> Result<Self::Writer>;

    /// Reader over the last commit.
    fn open_reader(&self) -> Result<Self::Reader>;

    /// Near-real-time reader over `writer`, committed or not.
    fn open_reader_with(&self, writer: &Self::Writer) -> Result<Self::Reader>;

    /// Reader over `writer` when one is given, over the last commit otherwise.
    fn open_reader_for(&self, writer: Option<&Self::Writer>) -> Result<Self::Reader> {
        match writer {
            Some(writer) => self.open_reader_with(writer),
            None => self.open_reader(),
        }
    }

    /// Copies every element through `transform` into `target`.
    fn reindex<V, I, F>(&self, target: &I, transform: F, progress: &dyn ProgressCallback) -> Result<()>
    where
        I: Index<V>,
        F: FnMut(T) -> V;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_aligns_scores() {
        let elements = vec![ScoredElement::new("fox", 1.5), ScoredElement::new("a", 0.25)];
        assert_eq!(ScoredElement::print(&elements), "fox : 1.500\na   : 0.250\n");
        assert_eq!(elements[0].to_string(), "fox: 1.5");
        assert_eq!(ScoredElement::<&str>::print(&[]), "");
    }
}
