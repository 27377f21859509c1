use std::collections::BTreeSet;
use std::sync::Arc;
use chrono::FixedOffset;
use crate::analysis::PerFieldAnalyzer;
use crate::core::error::{IndexError, Result};
use crate::core::types::{Number, NumberRange, ValueType};
use crate::mapper::field::FieldTypes;
use crate::mapper::value::{IndexValue, Scalar};
use crate::query::ast::{BoolQuery, Occur, PointRangeQuery, Query, RangeFieldQuery, RangeRelation};
use crate::query::index_query::{IndexQuery, IndexSort};
use crate::query::parser::{QueryParser, phrase_query, terms_query};

/// How the terms of an analyzed text are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermOccur {
    /// Every term is required.
    Must,
    /// Any term matches.
    #[default]
    Should,
}

impl From<TermOccur> for Occur {
    fn from(occur: TermOccur) -> Self {
        match occur {
            TermOccur::Must => Occur::Must,
            TermOccur::Should => Occur::Should,
        }
    }
}

/// What a builder needs from its index: analyzers, field types and the zone
/// used to convert temporal range bounds.
#[derive(Debug, Clone)]
pub struct QueryContext {
    analyzer: Arc<PerFieldAnalyzer>,
    field_types: Arc<FieldTypes>,
    zone: FixedOffset,
}

impl QueryContext {
    pub fn new(analyzer: Arc<PerFieldAnalyzer>, field_types: Arc<FieldTypes>, zone: FixedOffset) -> Self {
        QueryContext {
            analyzer,
            field_types,
            zone,
        }
    }

    pub fn analyzer(&self) -> &PerFieldAnalyzer {
        &self.analyzer
    }

    pub fn field_types(&self) -> &FieldTypes {
        &self.field_types
    }
}

/// Accumulates clauses into one boolean query.
///
/// Argument errors are kept until `build`, which returns the first one.
#[derive(Debug)]
pub struct IndexQueryBuilder {
    context: QueryContext,
    clauses: BoolQuery,
    sort: IndexSort,
    limit: usize,
    skip: usize,
    projection: BTreeSet<String>,
    error: Option<IndexError>,
}

impl IndexQueryBuilder {
    pub fn new(context: QueryContext) -> Self {
        IndexQueryBuilder {
            context,
            clauses: BoolQuery::new(),
            sort: IndexSort::default(),
            limit: usize::MAX,
            skip: 0,
            projection: BTreeSet::new(),
            error: None,
        }
    }

    /// Replaces the projection.
    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.clear();
        self.add_projection(fields)
    }

    pub fn add_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Must be greater than zero.
    pub fn limit(mut self, limit: usize) -> Self {
        if limit == 0 {
            self.fail(IndexError::invalid_argument("limit 0 must be > 0"));
        }
        self.limit = limit;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn sort(mut self, sort: IndexSort) -> Self {
        self.sort = sort;
        self
    }

    /// Exact, unanalyzed term.
    pub fn with_keyword(self, field: &str, keyword: &str, occur: Occur, boost: f32) -> Self {
        self.with_clause(Query::term(field, keyword), occur, boost)
    }

    /// Analyzed text, terms combined with `terms_occur`.
    pub fn with_terms(self, field: &str, text: &str, occur: Occur, terms_occur: TermOccur, boost: f32) -> Self {
        match terms_query(self.context.analyzer(), field, text, terms_occur.into()) {
            Some(query) => self.with_clause(query, occur, boost),
            None => self,
        }
    }

    /// Analyzed phrase; `slop` is the allowed positional spread.
    pub fn with_phrase(self, field: &str, phrase: &str, occur: Occur, slop: u32, boost: f32) -> Self {
        match phrase_query(self.context.analyzer(), field, phrase, slop) {
            Some(query) => self.with_clause(query, occur, boost),
            None => self,
        }
    }

    /// Numeric or temporal range; a missing bound is open.
    pub fn with_range<V: IndexValue>(
        mut self,
        field: &str,
        min: Option<V>,
        max: Option<V>,
        occur: Occur,
        boost: f32,
    ) -> Self {
        match self.range_query(field, min, max) {
            Ok(query) => self.with_clause(query, occur, boost),
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// Matches range fields whose interval stands in `relation` to `[min, max]`.
    pub fn with_range_relation<V: IndexValue>(
        mut self,
        field: &str,
        min: V,
        max: V,
        relation: RangeRelation,
        occur: Occur,
        boost: f32,
    ) -> Self {
        let zone = self.context.zone;
        let range = match (min.to_scalar(&zone), max.to_scalar(&zone)) {
            (Scalar::Number(min), Scalar::Number(max)) if min.compare(&max).is_le() => NumberRange::new(min, max),
            (Scalar::Number(_), Scalar::Number(_)) => {
                self.fail(IndexError::invalid_argument(format!(
                    "range on '{}' has its minimum above its maximum",
                    field
                )));
                return self;
            }
            _ => {
                self.fail(IndexError::invalid_argument(format!(
                    "range on '{}' needs numeric or temporal bounds",
                    field
                )));
                return self;
            }
        };
        let query = Query::RangeField(RangeFieldQuery {
            field: field.to_string(),
            range,
            relation,
        });
        self.with_clause(query, occur, boost)
    }

    /// Composes a previously built query; only its tree is kept.
    pub fn with_query(self, query: IndexQuery, occur: Occur, boost: f32) -> Self {
        self.with_clause(query.into_query(), occur, boost)
    }

    /// Parses a free-text expression against `default_field`.
    pub fn with_text_query(mut self, default_field: &str, text: &str, occur: Occur, boost: f32) -> Self {
        let parsed = QueryParser::new(default_field, self.context.analyzer(), self.context.field_types()).parse(text);
        match parsed {
            Ok(query) => self.with_clause(query, occur, boost),
            Err(error) => {
                self.fail(error);
                self
            }
        }
    }

    /// An empty clause set matches everything.
    pub fn build(self) -> Result<IndexQuery> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let query = if self.clauses.is_empty() {
            Query::MatchAll
        } else {
            Query::Bool(self.clauses)
        };
        Ok(IndexQuery::new(query, self.sort, self.limit, self.skip, self.projection))
    }

    fn with_clause(mut self, query: Query, occur: Occur, boost: f32) -> Self {
        self.clauses.add(occur, query.boosted(boost));
        self
    }

    fn fail(&mut self, error: IndexError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn range_query<V: IndexValue>(&self, field: &str, min: Option<V>, max: Option<V>) -> Result<Query> {
        if min.is_none() && max.is_none() {
            return Err(IndexError::invalid_argument(format!(
                "range on '{}' needs at least one bound",
                field
            )));
        }
        if V::value_type() == ValueType::String {
            return Err(IndexError::invalid_argument(format!(
                "range on '{}' needs numeric or temporal bounds",
                field
            )));
        }

        let zone = self.context.zone;
        let bound = |value: Option<V>| match value.map(|v| v.to_scalar(&zone)) {
            Some(Scalar::Number(n)) => Some(n),
            _ => None,
        };
        let (lower, upper) = (bound(min), bound(max));
        let range = match V::value_type() {
            ValueType::Integer => PointRangeQuery::int(
                field,
                lower.map_or(i32::MIN, as_int),
                upper.map_or(i32::MAX, as_int),
            ),
            ValueType::Long => PointRangeQuery::long(
                field,
                lower.map_or(i64::MIN, as_long),
                upper.map_or(i64::MAX, as_long),
            ),
            ValueType::Float => PointRangeQuery::float(
                field,
                lower.map_or(f32::NEG_INFINITY, |n| n.as_f64() as f32),
                upper.map_or(f32::INFINITY, |n| n.as_f64() as f32),
            ),
            ValueType::Double | ValueType::String => PointRangeQuery::double(
                field,
                lower.map_or(f64::NEG_INFINITY, |n| n.as_f64()),
                upper.map_or(f64::INFINITY, |n| n.as_f64()),
            ),
        };
        Ok(Query::PointRange(range))
    }
}

fn as_int(number: Number) -> i32 {
    match number {
        Number::Int(v) => v,
        other => other.as_f64() as i32,
    }
}

fn as_long(number: Number) -> i64 {
    match number {
        Number::Int(v) => v as i64,
        Number::Long(v) => v,
        other => other.as_f64() as i64,
    }
}
