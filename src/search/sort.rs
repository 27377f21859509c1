use std::cmp::Ordering;
use crate::core::types::{DocId, SortType};
use crate::search::results::SortValue;

/// One sort criterion understood by the searcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SortField {
    /// Highest score first unless reversed.
    Score { reverse: bool },
    /// Index order, oldest first unless reversed.
    Doc { reverse: bool },
    /// Doc-values order, smallest first unless reversed. Missing values sort last.
    Field {
        name: String,
        sort_type: SortType,
        reverse: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        if fields.is_empty() {
            return Sort::relevance();
        }
        Sort { fields }
    }

    pub fn relevance() -> Self {
        Sort {
            fields: vec![SortField::Score { reverse: false }],
        }
    }

    pub fn index_order() -> Self {
        Sort {
            fields: vec![SortField::Doc { reverse: false }],
        }
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn needs_scores(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f, SortField::Score { .. }))
    }

    /// Hits come out in ascending doc order, so collection can stop early.
    pub fn is_index_order(&self) -> bool {
        matches!(self.fields.as_slice(), [SortField::Doc { reverse: false }])
    }

    /// Orders two hits; ties are broken by ascending doc id.
    pub fn compare(&self, a: &[SortValue], a_doc: DocId, b: &[SortValue], b_doc: DocId) -> Ordering {
        for (i, field) in self.fields.iter().enumerate() {
            let ordering = match (field, a.get(i), b.get(i)) {
                (SortField::Score { reverse }, Some(SortValue::Score(x)), Some(SortValue::Score(y))) => {
                    apply(y.total_cmp(x), *reverse)
                }
                (SortField::Doc { reverse }, Some(SortValue::Doc(x)), Some(SortValue::Doc(y))) => {
                    apply(x.cmp(y), *reverse)
                }
                (SortField::Field { reverse, .. }, Some(SortValue::Field(x)), Some(SortValue::Field(y))) => {
                    match (x, y) {
                        (Some(x), Some(y)) => apply(x.compare(y), *reverse),
                        (None, Some(_)) => Ordering::Greater,
                        (Some(_), None) => Ordering::Less,
                        (None, None) => Ordering::Equal,
                    }
                }
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a_doc.cmp(&b_doc)
    }
}

impl Default for Sort {
    fn default() -> Self {
        Sort::relevance()
    }
}

fn apply(ordering: Ordering, reverse: bool) -> Ordering {
    if reverse { ordering.reverse() } else { ordering }
}
