use std::collections::HashMap;
use rayon::prelude::*;
use crate::analysis::PerFieldAnalyzer;
use crate::core::types::{DocId, FieldValue, Number, NumberRange, Record, SortKey};
use crate::storage::segment::SegmentId;

/// Position gap between two values of the same field, so a phrase never
/// spans the boundary between repeated values.
pub const POSITION_GAP: u32 = 100;

/// Documents analyzed in a single batch before rayon is used.
const PARALLEL_THRESHOLD: usize = 256;

/// Term representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

/// Terms of one field in one document, with their positions.
#[derive(Debug, Default, Clone)]
pub struct FieldTerms {
    pub terms: HashMap<String, Vec<u32>>,
    pub length: u32,
    next_position: u32,
}

impl FieldTerms {
    fn push(&mut self, text: String, position: u32) {
        self.terms.entry(text).or_default().push(position);
        self.length += 1;
        self.next_position = self.next_position.max(position + 1);
    }

    fn base(&self) -> u32 {
        if self.length == 0 { 0 } else { self.next_position + POSITION_GAP }
    }
}

/// A document with its indexed structures, ready to be matched and sorted.
#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub doc_id: DocId,
    pub record: Record,
    pub fields: HashMap<String, FieldTerms>,
    pub points: HashMap<String, Vec<Number>>,
    pub ranges: HashMap<String, Vec<NumberRange>>,
    pub sort_keys: HashMap<String, SortKey>,
}

impl IndexedDoc {
    pub fn analyze(doc_id: DocId, record: Record, analyzer: &PerFieldAnalyzer) -> Self {
        let mut fields: HashMap<String, FieldTerms> = HashMap::new();
        let mut points: HashMap<String, Vec<Number>> = HashMap::new();
        let mut ranges: HashMap<String, Vec<NumberRange>> = HashMap::new();
        let mut sort_keys = HashMap::new();

        for field in record.fields() {
            match &field.value {
                FieldValue::Keyword(term) => {
                    let terms = fields.entry(field.name.clone()).or_default();
                    let position = terms.base();
                    terms.push(term.clone(), position);
                }
                FieldValue::Text(text) => {
                    let terms = fields.entry(field.name.clone()).or_default();
                    let base = terms.base();
                    for token in analyzer.analyze(&field.name, text) {
                        terms.push(token.text, base + token.position);
                    }
                }
                FieldValue::Point(number) => {
                    points.entry(field.name.clone()).or_default().push(*number);
                }
                FieldValue::Range(range) => {
                    ranges.entry(field.name.clone()).or_default().push(*range);
                }
                FieldValue::Sorted(key) | FieldValue::DocValue(key) => {
                    // First value wins, a sort field is single-valued.
                    sort_keys.entry(field.name.clone()).or_insert_with(|| key.clone());
                }
                FieldValue::Stored(_) => {}
            }
        }

        IndexedDoc {
            doc_id,
            record,
            fields,
            points,
            ranges,
            sort_keys,
        }
    }

    /// Analyzes a batch, in parallel when it is large enough to pay off.
    pub fn analyze_all(docs: Vec<(DocId, Record)>, analyzer: &PerFieldAnalyzer) -> Vec<IndexedDoc> {
        if docs.len() < PARALLEL_THRESHOLD {
            return docs
                .into_iter()
                .map(|(doc_id, record)| IndexedDoc::analyze(doc_id, record, analyzer))
                .collect();
        }
        docs.into_par_iter()
            .map(|(doc_id, record)| IndexedDoc::analyze(doc_id, record, analyzer))
            .collect()
    }

    pub fn positions(&self, field: &str, term: &str) -> Option<&[u32]> {
        self.fields
            .get(field)
            .and_then(|f| f.terms.get(term))
            .map(Vec::as_slice)
    }

    pub fn has_term(&self, term: &Term) -> bool {
        self.positions(&term.field, &term.text).is_some()
    }

    pub fn field_length(&self, field: &str) -> u32 {
        self.fields.get(field).map(|f| f.length).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct SegmentStats {
    doc_freq: HashMap<String, HashMap<String, u32>>,
    // field -> (sum of lengths, docs having the field)
    field_lengths: HashMap<String, (u64, u32)>,
}

impl SegmentStats {
    fn add(&mut self, doc: &IndexedDoc) {
        for (field, terms) in &doc.fields {
            let freqs = self.doc_freq.entry(field.clone()).or_default();
            for term in terms.terms.keys() {
                *freqs.entry(term.clone()).or_default() += 1;
            }
            let lengths = self.field_lengths.entry(field.clone()).or_default();
            lengths.0 += terms.length as u64;
            lengths.1 += 1;
        }
    }
}

/// An immutable set of analyzed documents, sorted by doc id.
#[derive(Debug)]
pub struct InvertedSegment {
    pub id: SegmentId,
    pub docs: Vec<IndexedDoc>,
    pub stats: SegmentStats,
}

impl InvertedSegment {
    pub fn build(id: SegmentId, mut docs: Vec<IndexedDoc>) -> Self {
        docs.sort_by_key(|d| d.doc_id);
        let mut stats = SegmentStats::default();
        for doc in &docs {
            stats.add(doc);
        }
        InvertedSegment { id, docs, stats }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> u32 {
        self.stats
            .doc_freq
            .get(field)
            .and_then(|terms| terms.get(term))
            .copied()
            .unwrap_or(0)
    }

    pub fn field_lengths(&self, field: &str) -> (u64, u32) {
        self.stats.field_lengths.get(field).copied().unwrap_or((0, 0))
    }

    pub fn max_doc_id(&self) -> Option<DocId> {
        self.docs.last().map(|d| d.doc_id)
    }
}
