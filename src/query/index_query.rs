use std::collections::BTreeSet;
use crate::core::error::{IndexError, Result};
use crate::mapper::field::FieldTypes;
use crate::query::ast::Query;
use crate::search::sort::{Sort, SortField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Natural order: best score first, oldest document first, smallest value first.
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn is_reverse(self) -> bool {
        self == SortDirection::Desc
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexSortField {
    Score(SortDirection),
    IndexOrder(SortDirection),
    /// A field declared sortable by the mapper.
    Property { name: String, direction: SortDirection },
}

impl IndexSortField {
    pub fn property(name: impl Into<String>) -> Self {
        Self::property_with(name, SortDirection::Asc)
    }

    pub fn property_with(name: impl Into<String>, direction: SortDirection) -> Self {
        IndexSortField::Property {
            name: name.into(),
            direction,
        }
    }

    fn to_sort_field(&self, field_types: &FieldTypes) -> Result<SortField> {
        match self {
            IndexSortField::Score(direction) => Ok(SortField::Score {
                reverse: direction.is_reverse(),
            }),
            IndexSortField::IndexOrder(direction) => Ok(SortField::Doc {
                reverse: direction.is_reverse(),
            }),
            IndexSortField::Property { name, direction } => {
                let sort_type = field_types.sort_type(name).ok_or_else(|| {
                    IndexError::invalid_argument(format!("field '{}' is not sortable", name))
                })?;
                Ok(SortField::Field {
                    name: name.clone(),
                    sort_type,
                    reverse: direction.is_reverse(),
                })
            }
        }
    }
}

/// Ordered sort keys. The default sort (no keys) is backend relevance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IndexSort {
    fields: Vec<IndexSortField>,
}

impl IndexSort {
    pub fn new(fields: Vec<IndexSortField>) -> Self {
        IndexSort { fields }
    }

    pub fn relevance() -> Self {
        Self::relevance_with(SortDirection::Asc)
    }

    pub fn relevance_with(direction: SortDirection) -> Self {
        IndexSort::new(vec![IndexSortField::Score(direction)])
    }

    pub fn index_order() -> Self {
        Self::index_order_with(SortDirection::Asc)
    }

    pub fn index_order_with(direction: SortDirection) -> Self {
        IndexSort::new(vec![IndexSortField::IndexOrder(direction)])
    }

    pub fn by(name: impl Into<String>, direction: SortDirection) -> Self {
        IndexSort::new(vec![IndexSortField::property_with(name, direction)])
    }

    /// Appends a tie-breaking key.
    pub fn then(mut self, field: IndexSortField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[IndexSortField] {
        &self.fields
    }

    pub fn is_default(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compiles to the searcher's sort, resolving property types through the
    /// mapper. Unknown or unsortable properties are an `InvalidArgument`.
    pub fn to_sort(&self, field_types: &FieldTypes) -> Result<Sort> {
        if self.is_default() {
            return Ok(Sort::relevance());
        }
        let fields = self
            .fields
            .iter()
            .map(|field| field.to_sort_field(field_types))
            .collect::<Result<Vec<_>>>()?;
        Ok(Sort::new(fields))
    }
}

/// An immutable query: boolean tree, sort, limit, skip and projection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    query: Query,
    sort: IndexSort,
    limit: usize,
    skip: usize,
    projection: BTreeSet<String>,
}

impl IndexQuery {
    pub(crate) fn new(
        query: Query,
        sort: IndexSort,
        limit: usize,
        skip: usize,
        projection: BTreeSet<String>,
    ) -> Self {
        IndexQuery {
            query,
            sort,
            limit,
            skip,
            projection,
        }
    }

    /// Everything, in index order, unlimited.
    pub fn all() -> Self {
        IndexQuery::new(Query::MatchAll, IndexSort::index_order(), usize::MAX, 0, BTreeSet::new())
    }

    /// A bare query tree, sorted by relevance.
    pub fn of(query: Query) -> Self {
        IndexQuery::new(query, IndexSort::default(), usize::MAX, 0, BTreeSet::new())
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn sort(&self) -> &IndexSort {
        &self.sort
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Stored fields to materialize; empty means all of them.
    pub fn projection(&self) -> &BTreeSet<String> {
        &self.projection
    }

    pub(crate) fn into_query(self) -> Query {
        self.query
    }
}

impl Default for IndexQuery {
    fn default() -> Self {
        IndexQuery::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SortType, ValueType};

    fn types() -> FieldTypes {
        FieldTypes::new()
            .with_indexed("size", ValueType::Integer)
            .with_sorted("theSize", SortType::Int)
            .with_sorted("price", SortType::Double)
    }

    #[test]
    fn test_default_sort_is_relevance() {
        assert_eq!(IndexSort::default().to_sort(&types()).unwrap(), Sort::relevance());
        assert_eq!(IndexQuery::all().sort(), &IndexSort::index_order());
        assert_eq!(IndexQuery::all().limit(), usize::MAX);
    }

    #[test]
    fn test_property_sort_uses_declared_type() {
        let sort = IndexSort::by("price", SortDirection::Desc)
            .then(IndexSortField::IndexOrder(SortDirection::Asc))
            .to_sort(&types())
            .unwrap();
        assert_eq!(
            sort.fields(),
            &[
                SortField::Field {
                    name: "price".into(),
                    sort_type: SortType::Double,
                    reverse: true,
                },
                SortField::Doc { reverse: false },
            ]
        );
    }

    #[test]
    fn test_unsortable_field_is_rejected() {
        let err = IndexSort::by("size", SortDirection::Asc).to_sort(&types()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }
}
