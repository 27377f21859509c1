pub mod cursor;
pub mod executor;
pub mod results;
pub mod sort;

pub use cursor::{CursorRequest, SearchCursor};
pub use executor::Searcher;
pub use results::{Relation, ScoreDoc, TopDocs, TotalHits};
pub use sort::{Sort, SortField};
