pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod mvcc;
pub mod writer;
pub mod reader;
pub mod mapper;
pub mod api;
pub mod entity;

pub use api::{Index, IndexCursor, IndexHolder, IndexReader, IndexWriter, NoProgress, ProgressCallback, ScoredElement};
pub use core::config::Config;
pub use core::error::{IndexError, Result};
pub use entity::{EntityIndex, EntityReader, EntityWriter, IndexFactory, IndexOptions};
pub use mapper::{DocumentMapper, EntityMapper, IndexRange, IndexedFieldType, MapperBuilder, RecordMapper};
pub use query::{
    IndexQuery, IndexQueryBuilder, IndexSort, IndexSortField, Occur, RangeRelation, SortDirection, TermOccur,
};

/*
┌──────────────────────────────────────────────────────────────────────────────────┐
│                              ENTIDX ARCHITECTURE                                  │
└──────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── FACADE LAYER ────────────────────────────────────┐
│                                                                                  │
│  ┌──────────────────────────┐   ┌────────────────────────────────────────────┐  │
│  │ struct IndexFactory      │   │ struct IndexHolder<T, I: Index<T>>         │  │
│  │ • config: Config         │   │ • at most one writer + one reader          │  │
│  │ • registry: Analyzers    │   │ • hands out Shared<_> (close is a no-op)   │  │
│  │ • build_index::<T>()     │   └────────────────────────────────────────────┘  │
│  └──────────────────────────┘                                                    │
│  ┌──────────────────────────┐   ┌──────────────────────┐  ┌──────────────────┐  │
│  │ struct EntityIndex<T>    │   │ EntityWriter<T>      │  │ EntityReader<T>  │  │
│  │ • core: Arc<IndexCore>   │──>│ • add/update/delete  │  │ • find/get/list  │  │
│  │ • open_writer/reader     │   │ • clear/commit       │  │ • query -> cursor│  │
│  │ • reindex/rebuild        │   └──────────────────────┘  │ • ReaderManager  │  │
│  └──────────────────────────┘                             └──────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────── MAPPING & QUERY LAYER ──────────────────────────────┐
│                                                                                  │
│  trait DocumentMapper<T>    EntityMapper<T> (MapperBuilder)   RecordMapper       │
│     T ──to_record──> Record{_id, _source, fields}  ──from_record──> T            │
│                                                                                  │
│  IndexQueryBuilder ──build──> IndexQuery{Query, IndexSort, limit, skip, proj}    │
│  QueryParser (nom) ──parse──> Query::{Term, Phrase, Bool, PointRange, ...}       │
└──────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────── BACKEND LAYER ──────────────────────────────────┐
│                                                                                  │
│  IndexWriter ──freezes──> InvertedSegment ──commit──> segments/<id>.seg + commit   │
│       │                                                                          │
│       └──NRT──> Snapshot <──reopen_if_changed── DirectoryReader                  │
│                    │                                                             │
│  ReaderManager ──caches──> ReaderInstance(refcount) ──leases──> SearchCursor     │
│                                                       │                          │
│                                   Searcher(BM25, sort, search_after) <──┘        │
└──────────────────────────────────────────────────────────────────────────────────┘
*/
