use crate::core::types::{DocId, SortKey};
use crate::mvcc::snapshot::DocAddress;

/// Whether a reported hit count is precise or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Exact,
    AtLeast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalHits {
    pub value: u64,
    pub relation: Relation,
}

impl TotalHits {
    pub fn exact(value: u64) -> Self {
        TotalHits {
            value,
            relation: Relation::Exact,
        }
    }

    pub fn at_least(value: u64) -> Self {
        TotalHits {
            value,
            relation: Relation::AtLeast,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.relation == Relation::Exact
    }
}

/// One component of a hit's position in the sort order.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Score(f32),
    Doc(DocId),
    Field(Option<SortKey>),
}

/// A hit. Also serves as the resume marker for `search_after`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDoc {
    pub address: DocAddress,
    pub doc_id: DocId,
    /// `NaN` when scores were not computed.
    pub score: f32,
    pub sort_values: Vec<SortValue>,
}

#[derive(Debug, Clone)]
pub struct TopDocs {
    pub hits: Vec<ScoreDoc>,
    pub total_hits: TotalHits,
}
