use std::collections::HashMap;
use crate::mvcc::snapshot::Snapshot;
use crate::query::ast::Query;

/// Collection-level statistics a scorer needs.
pub trait CollectionStats {
    fn max_doc(&self) -> u64;
    fn doc_freq(&self, field: &str, term: &str) -> u64;
    fn avg_field_length(&self, field: &str) -> f32;
}

impl CollectionStats for Snapshot {
    fn max_doc(&self) -> u64 {
        Snapshot::max_doc(self) as u64
    }

    fn doc_freq(&self, field: &str, term: &str) -> u64 {
        Snapshot::doc_freq(self, field, term)
    }

    fn avg_field_length(&self, field: &str) -> f32 {
        Snapshot::avg_field_length(self, field)
    }
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub doc_length: u32,      // Number of tokens in the field
    pub avg_doc_length: f32,  // Average field length in collection
}

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, freq: f32, idf: f32, doc_stats: &DocStats) -> f32;

    fn idf(&self, doc_freq: u64, doc_count: u64) -> f32;

    fn name(&self) -> &str;
}

/// BM25 Scorer
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, freq: f32, idf: f32, doc_stats: &DocStats) -> f32 {
        let doc_len = doc_stats.doc_length as f32;
        let avg_doc_len = doc_stats.avg_doc_length.max(f32::EPSILON);

        // BM25 formula
        let numerator = idf * freq * (self.k1 + 1.0);
        let denominator = freq + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn idf(&self, doc_freq: u64, doc_count: u64) -> f32 {
        let n = doc_count as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

/// Per-query scoring weights, computed once against a snapshot.
pub struct QueryWeights {
    scorer: BM25Scorer,
    idf: HashMap<(String, String), f32>,
    avg_length: HashMap<String, f32>,
    enabled: bool,
}

impl QueryWeights {
    pub fn build(query: &Query, stats: &dyn CollectionStats) -> Self {
        let scorer = BM25Scorer::default();
        let mut terms = Vec::new();
        query.scoring_terms(&mut terms);

        let doc_count = stats.max_doc();
        let mut idf = HashMap::with_capacity(terms.len());
        let mut avg_length = HashMap::new();
        for (field, term) in terms {
            avg_length
                .entry(field.clone())
                .or_insert_with(|| stats.avg_field_length(&field));
            let value = scorer.idf(stats.doc_freq(&field, &term), doc_count);
            idf.insert((field, term), value);
        }

        QueryWeights {
            scorer,
            idf,
            avg_length,
            enabled: true,
        }
    }

    /// Matching only; every matching clause scores 1.
    pub fn unscored() -> Self {
        QueryWeights {
            scorer: BM25Scorer::default(),
            idf: HashMap::new(),
            avg_length: HashMap::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn idf(&self, field: &str, term: &str) -> f32 {
        self.idf
            .get(&(field.to_string(), term.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn score(&self, field: &str, idf: f32, freq: f32, doc_length: u32) -> f32 {
        if !self.enabled {
            return 1.0;
        }
        let stats = DocStats {
            doc_length,
            avg_doc_length: self.avg_length.get(field).copied().unwrap_or(1.0),
        };
        self.scorer.score(freq, idf, &stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_rewards_rare_terms() {
        let scorer = BM25Scorer::default();
        assert!(scorer.idf(1, 100) > scorer.idf(50, 100));
        assert!(scorer.idf(100, 100) > 0.0);
    }

    #[test]
    fn test_frequency_saturates() {
        let scorer = BM25Scorer::default();
        let stats = DocStats { doc_length: 10, avg_doc_length: 10.0 };
        let one = scorer.score(1.0, 1.0, &stats);
        let two = scorer.score(2.0, 1.0, &stats);
        let twenty = scorer.score(20.0, 1.0, &stats);
        assert!(two > one);
        assert!(twenty < one * (scorer.k1 + 1.0));
    }

    #[test]
    fn test_shorter_fields_score_higher() {
        let scorer = BM25Scorer::default();
        let short = scorer.score(1.0, 1.0, &DocStats { doc_length: 2, avg_doc_length: 10.0 });
        let long = scorer.score(1.0, 1.0, &DocStats { doc_length: 40, avg_doc_length: 10.0 });
        assert!(short > long);
    }
}
