use std::fmt;
use serde::{Serialize, Deserialize};
use crate::core::types::{Number, NumberRange};

/// Clause requirement inside a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occur {
    /// Required, contributes to the score.
    Must,
    /// Excluded.
    MustNot,
    /// Optional, contributes to the score.
    Should,
    /// Required, does not contribute to the score.
    Filter,
}

/// Main query enum representing all query types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),              // Single exact term
    Phrase(PhraseQuery),          // Ordered / sloppy phrase
    Bool(BoolQuery),              // Boolean combinations
    PointRange(PointRangeQuery),  // Numeric range over point values
    TermRange(TermRangeQuery),    // Lexicographic range over terms
    RangeField(RangeFieldQuery),  // Interval relation over range fields
    Boost(BoostQuery),            // Score multiplier
    MatchAll,                     // Match all documents
}

/// Single term query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

/// Phrase query; each term carries its position relative to the phrase start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<(u32, String)>,
    pub slop: u32,  // Max positional spread allowed
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // Optional unless nothing else is required
    pub must_not: Vec<Query>,  // None must match (NOT)
    pub filter: Vec<Query>,    // Must match but don't affect score
    pub minimum_should_match: Option<u32>,
}

/// Inclusive numeric range; both bounds have the same number variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRangeQuery {
    pub field: String,
    pub lower: Number,
    pub upper: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRangeQuery {
    pub field: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub include_lower: bool,
    pub include_upper: bool,
}

/// How an indexed interval must relate to the query interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeRelation {
    /// Shares at least one value.
    Intersects,
    /// Covers the whole query interval.
    Contains,
    /// Lies inside the query interval.
    Within,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFieldQuery {
    pub field: String,
    pub range: NumberRange,
    pub relation: RangeRelation,
}

impl RangeFieldQuery {
    pub fn matches(&self, indexed: &NumberRange) -> bool {
        match self.relation {
            RangeRelation::Intersects => indexed.intersects(&self.range),
            RangeRelation::Contains => indexed.contains(&self.range),
            RangeRelation::Within => self.range.contains(indexed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostQuery {
    pub query: Box<Query>,
    pub boost: f32,
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Query {
        Query::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Wraps in a boost node unless the boost is neutral.
    pub fn boosted(self, boost: f32) -> Query {
        if boost == 1.0 {
            self
        } else {
            Query::Boost(BoostQuery {
                query: Box::new(self),
                boost,
            })
        }
    }

    /// Every (field, term) pair that takes part in scoring.
    pub fn scoring_terms(&self, out: &mut Vec<(String, String)>) {
        match self {
            Query::Term(q) => out.push((q.field.clone(), q.value.clone())),
            Query::Phrase(q) => {
                out.extend(q.terms.iter().map(|(_, t)| (q.field.clone(), t.clone())));
            }
            Query::Bool(q) => {
                for clause in q.must.iter().chain(&q.should) {
                    clause.scoring_terms(out);
                }
            }
            Query::Boost(q) => q.query.scoring_terms(out),
            Query::PointRange(_) | Query::TermRange(_) | Query::RangeField(_) | Query::MatchAll => {}
        }
    }
}

impl PointRangeQuery {
    pub fn int(field: impl Into<String>, lower: i32, upper: i32) -> Self {
        Self::new(field, Number::Int(lower), Number::Int(upper))
    }

    pub fn long(field: impl Into<String>, lower: i64, upper: i64) -> Self {
        Self::new(field, Number::Long(lower), Number::Long(upper))
    }

    pub fn float(field: impl Into<String>, lower: f32, upper: f32) -> Self {
        Self::new(field, Number::Float(lower), Number::Float(upper))
    }

    pub fn double(field: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::new(field, Number::Double(lower), Number::Double(upper))
    }

    fn new(field: impl Into<String>, lower: Number, upper: Number) -> Self {
        PointRangeQuery {
            field: field.into(),
            lower,
            upper,
        }
    }

    pub fn contains(&self, value: &Number) -> bool {
        match (self.lower, self.upper, *value) {
            (Number::Int(lo), Number::Int(hi), Number::Int(v)) => lo <= v && v <= hi,
            (Number::Long(lo), Number::Long(hi), Number::Long(v)) => lo <= v && v <= hi,
            (Number::Float(lo), Number::Float(hi), Number::Float(v)) => lo <= v && v <= hi,
            (Number::Double(lo), Number::Double(hi), Number::Double(v)) => lo <= v && v <= hi,
            _ => {
                let v = value.as_f64();
                self.lower.as_f64() <= v && v <= self.upper.as_f64()
            }
        }
    }
}

impl TermRangeQuery {
    pub fn contains(&self, term: &str) -> bool {
        let above = match &self.lower {
            None => true,
            Some(lo) if self.include_lower => term >= lo.as_str(),
            Some(lo) => term > lo.as_str(),
        };
        let below = match &self.upper {
            None => true,
            Some(hi) if self.include_upper => term <= hi.as_str(),
            Some(hi) => term < hi.as_str(),
        };
        above && below
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn add(&mut self, occur: Occur, query: Query) {
        match occur {
            Occur::Must => self.must.push(query),
            Occur::MustNot => self.must_not.push(query),
            Occur::Should => self.should.push(query),
            Occur::Filter => self.filter.push(query),
        }
    }

    pub fn clause_count(&self) -> usize {
        self.must.len() + self.should.len() + self.must_not.len() + self.filter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clause_count() == 0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => write!(f, "{}:{}", q.field, q.value),
            Query::Phrase(q) => {
                let words: Vec<&str> = q.terms.iter().map(|(_, t)| t.as_str()).collect();
                write!(f, "{}:\"{}\"", q.field, words.join(" "))?;
                if q.slop > 0 {
                    write!(f, "~{}", q.slop)?;
                }
                Ok(())
            }
            Query::Bool(q) => {
                let mut parts = Vec::with_capacity(q.clause_count());
                parts.extend(q.must.iter().map(|c| format!("+{}", nested(c))));
                parts.extend(q.filter.iter().map(|c| format!("#{}", nested(c))));
                parts.extend(q.should.iter().map(nested));
                parts.extend(q.must_not.iter().map(|c| format!("-{}", nested(c))));
                write!(f, "{}", parts.join(" "))
            }
            Query::PointRange(q) => write!(f, "{}:[{} TO {}]", q.field, q.lower, q.upper),
            Query::TermRange(q) => write!(
                f,
                "{}:{}{} TO {}{}",
                q.field,
                if q.include_lower { '[' } else { '{' },
                q.lower.as_deref().unwrap_or("*"),
                q.upper.as_deref().unwrap_or("*"),
                if q.include_upper { ']' } else { '}' },
            ),
            Query::RangeField(q) => write!(f, "{}:{:?}{}", q.field, q.relation, q.range),
            Query::Boost(q) => write!(f, "({})^{}", q.query, q.boost),
            Query::MatchAll => write!(f, "*:*"),
        }
    }
}

fn nested(query: &Query) -> String {
    match query {
        Query::Bool(_) => format!("({})", query),
        _ => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_boost_is_not_wrapped() {
        assert_eq!(Query::term("f", "v").boosted(1.0), Query::term("f", "v"));
        assert!(matches!(Query::term("f", "v").boosted(2.0), Query::Boost(_)));
    }

    #[test]
    fn test_display() {
        let query = Query::Bool(
            BoolQuery::new()
                .with_must(Query::term("name", "fox"))
                .with_should(Query::PointRange(PointRangeQuery::int("size", 1, 5)))
                .with_must_not(Query::term("color", "red").boosted(2.0)),
        );
        assert_eq!(query.to_string(), "+name:fox size:[1 TO 5] -(color:red)^2");
    }

    #[test]
    fn test_ranges() {
        let range = PointRangeQuery::long("date", 10, 20);
        assert!(range.contains(&Number::Long(10)));
        assert!(!range.contains(&Number::Long(21)));
        assert!(range.contains(&Number::Int(15)));

        let terms = TermRangeQuery {
            field: "name".into(),
            lower: Some("b".into()),
            upper: None,
            include_lower: false,
            include_upper: true,
        };
        assert!(!terms.contains("b"));
        assert!(terms.contains("ba"));
    }

    #[test]
    fn test_range_field_relations() {
        let query = |relation| RangeFieldQuery {
            field: "span".into(),
            range: NumberRange::new(Number::Int(10), Number::Int(20)),
            relation,
        };
        let wide = NumberRange::new(Number::Int(0), Number::Int(30));
        let inner = NumberRange::new(Number::Int(12), Number::Int(15));
        let overlapping = NumberRange::new(Number::Int(18), Number::Int(25));

        assert!(query(RangeRelation::Intersects).matches(&overlapping));
        assert!(!query(RangeRelation::Contains).matches(&overlapping));
        assert!(query(RangeRelation::Contains).matches(&wide));
        assert!(query(RangeRelation::Within).matches(&inner));
        assert!(!query(RangeRelation::Within).matches(&wide));
        assert_eq!(Query::RangeField(query(RangeRelation::Within)).to_string(), "span:Within[10 TO 20]");
    }
}
