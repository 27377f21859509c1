pub mod holder;
pub mod index;

pub use holder::{IndexHolder, Shared};
pub use index::{Index, IndexCursor, IndexReader, IndexWriter, NoProgress, ProgressCallback, ScoredElement};
