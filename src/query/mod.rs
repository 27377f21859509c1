pub mod ast;
pub mod builder;
pub mod index_query;
pub mod matcher;
pub mod parser;

pub use ast::{Occur, Query, RangeRelation};
pub use builder::{IndexQueryBuilder, QueryContext, TermOccur};
pub use index_query::{IndexQuery, IndexSort, IndexSortField, SortDirection};
pub use parser::QueryParser;
