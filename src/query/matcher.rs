use crate::index::inverted::IndexedDoc;
use crate::query::ast::{BoolQuery, PhraseQuery, Query, TermQuery};
use crate::scoring::scorer::QueryWeights;

/// Evaluates a query against one document.
///
/// `score` returns `None` when the document does not match, and its
/// relevance otherwise. Range and match-all clauses score a constant 1.
pub struct DocumentMatcher<'a> {
    weights: &'a QueryWeights,
}

impl<'a> DocumentMatcher<'a> {
    pub fn new(weights: &'a QueryWeights) -> Self {
        DocumentMatcher { weights }
    }

    pub fn matches(&self, doc: &IndexedDoc, query: &Query) -> bool {
        self.score(doc, query).is_some()
    }

    pub fn score(&self, doc: &IndexedDoc, query: &Query) -> Option<f32> {
        match query {
            Query::Term(q) => self.score_term(doc, q),
            Query::Phrase(q) => self.score_phrase(doc, q),
            Query::Bool(q) => self.score_bool(doc, q),
            Query::PointRange(q) => doc
                .points
                .get(&q.field)
                .filter(|values| values.iter().any(|v| q.contains(v)))
                .map(|_| 1.0),
            Query::RangeField(q) => doc
                .ranges
                .get(&q.field)
                .filter(|values| values.iter().any(|r| q.matches(r)))
                .map(|_| 1.0),
            Query::TermRange(q) => doc
                .fields
                .get(&q.field)
                .filter(|terms| terms.terms.keys().any(|t| q.contains(t)))
                .map(|_| 1.0),
            Query::Boost(q) => self.score(doc, &q.query).map(|s| s * q.boost),
            Query::MatchAll => Some(1.0),
        }
    }

    fn score_term(&self, doc: &IndexedDoc, query: &TermQuery) -> Option<f32> {
        let positions = doc.positions(&query.field, &query.value)?;
        let idf = self.weights.idf(&query.field, &query.value);
        Some(self.weights.score(
            &query.field,
            idf,
            positions.len() as f32,
            doc.field_length(&query.field),
        ))
    }

    /// Match phrase query - proximity search with slop
    fn score_phrase(&self, doc: &IndexedDoc, query: &PhraseQuery) -> Option<f32> {
        if query.terms.is_empty() {
            return None;
        }

        // Offsets of each term relative to where the phrase would start
        let mut offsets: Vec<Vec<i64>> = Vec::with_capacity(query.terms.len());
        for (query_position, term) in &query.terms {
            let positions = doc.positions(&query.field, term)?;
            offsets.push(
                positions
                    .iter()
                    .map(|p| *p as i64 - *query_position as i64)
                    .collect(),
            );
        }

        let starts: Vec<i64> = query.terms.iter().map(|(p, _)| *p as i64).collect();
        let freq = phrase_freq(&offsets, &starts, query.slop);
        if freq == 0 {
            return None;
        }

        let idf: f32 = query
            .terms
            .iter()
            .map(|(_, term)| self.weights.idf(&query.field, term))
            .sum();
        Some(self.weights.score(&query.field, idf, freq as f32, doc.field_length(&query.field)))
    }

    fn score_bool(&self, doc: &IndexedDoc, query: &BoolQuery) -> Option<f32> {
        // A purely negative query matches nothing
        if query.must.is_empty() && query.filter.is_empty() && query.should.is_empty() {
            return None;
        }

        let mut score = 0.0;

        // All must clauses must match
        for clause in &query.must {
            score += self.score(doc, clause)?;
        }

        // Filters must match but do not score
        for clause in &query.filter {
            self.score(doc, clause)?;
        }

        // No must_not clause may match
        if query.must_not.iter().any(|clause| self.matches(doc, clause)) {
            return None;
        }

        let mut matched = 0u32;
        for clause in &query.should {
            if let Some(s) = self.score(doc, clause) {
                score += s;
                matched += 1;
            }
        }

        let required = query.minimum_should_match.unwrap_or(
            if query.must.is_empty() && query.filter.is_empty() { 1 } else { 0 },
        );
        if matched < required {
            return None;
        }

        Some(score)
    }
}

/// Number of windows where one offset per term lies within `slop` of the others.
///
/// `starts` holds each term's position in the phrase. A window only counts
/// when its terms sit at distinct document positions, so a repeated phrase
/// term can not be satisfied by a single occurrence.
fn phrase_freq(offsets: &[Vec<i64>], starts: &[i64], slop: u32) -> u32 {
    let mut cursor = vec![0usize; offsets.len()];
    let mut freq = 0;
    let mut positions = Vec::with_capacity(offsets.len());

    loop {
        let mut min_list = 0;
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for (i, list) in offsets.iter().enumerate() {
            let value = list[cursor[i]];
            if value < min {
                min = value;
                min_list = i;
            }
            max = max.max(value);
        }

        if max - min <= slop as i64 {
            positions.clear();
            positions.extend(offsets.iter().zip(starts).enumerate().map(|(i, (list, start))| list[cursor[i]] + start));
            positions.sort_unstable();
            if positions.windows(2).all(|pair| pair[0] != pair[1]) {
                freq += 1;
            }
        }

        cursor[min_list] += 1;
        if cursor[min_list] >= offsets[min_list].len() {
            break;
        }
    }

    freq
}
