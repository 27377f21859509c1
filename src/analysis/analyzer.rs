use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use parking_lot::RwLock;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer, WhitespaceTokenizer};
use crate::core::error::{IndexError, Result};

pub const STANDARD: &str = "standard";
pub const SIMPLE: &str = "simple";
pub const ENGLISH: &str = "english";
pub const FRENCH: &str = "french";
pub const WHITESPACE: &str = "whitespace";
pub const KEYWORD: &str = "keyword";

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: impl Into<String>, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name: name.into(),
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Unicode words, lowercased.
    pub fn standard() -> Self {
        Analyzer::new(STANDARD, Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    /// Whitespace-separated tokens, lowercased.
    pub fn simple() -> Self {
        Analyzer::new(SIMPLE, Box::new(WhitespaceTokenizer))
            .add_filter(Box::new(LowercaseFilter))
    }

    pub fn english() -> Self {
        Analyzer::new(ENGLISH, Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::english()))
    }

    pub fn french() -> Self {
        Analyzer::new(FRENCH, Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StemmerFilter::french()))
    }

    pub fn whitespace() -> Self {
        Analyzer::new(WHITESPACE, Box::new(WhitespaceTokenizer))
    }

    /// The whole value as one untokenized term.
    pub fn keyword() -> Self {
        Analyzer::new(KEYWORD, Box::new(KeywordTokenizer))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|filter| filter.name()).collect();
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &filters)
            .finish()
    }
}

/// Registry for managing analyzers
#[derive(Debug)]
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
        };

        // Register default analyzers
        registry.register(Analyzer::standard());
        registry.register(Analyzer::simple());
        registry.register(Analyzer::english());
        registry.register(Analyzer::french());
        registry.register(Analyzer::whitespace());
        registry.register(Analyzer::keyword());
        registry
    }

    pub fn register(&self, analyzer: Analyzer) {
        self.analyzers
            .write()
            .insert(analyzer.name.clone(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Result<Arc<Analyzer>> {
        self.analyzers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::configuration(format!("analyzer '{}' is not registered", name)))
    }

    /// Builds the per-field wrapper for a mapper's analyzer table.
    pub fn per_field(&self, default: &str, fields: &BTreeMap<String, String>) -> Result<PerFieldAnalyzer> {
        let mut analyzer = PerFieldAnalyzer::new(self.get(default)?);
        for (field, name) in fields {
            analyzer = analyzer.with_field(field.clone(), self.get(name)?);
        }
        Ok(analyzer)
    }
}

/// Default analyzer plus per-field overrides.
#[derive(Debug, Clone)]
pub struct PerFieldAnalyzer {
    default: Arc<Analyzer>,
    fields: HashMap<String, Arc<Analyzer>>,
}

impl PerFieldAnalyzer {
    pub fn new(default: Arc<Analyzer>) -> Self {
        PerFieldAnalyzer {
            default,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, analyzer: Arc<Analyzer>) -> Self {
        self.fields.insert(field.into(), analyzer);
        self
    }

    pub fn analyzer(&self, field: &str) -> &Analyzer {
        self.fields.get(field).unwrap_or(&self.default)
    }

    pub fn analyze(&self, field: &str, text: &str) -> Vec<Token> {
        self.analyzer(field).analyze(text)
    }
}

impl Default for PerFieldAnalyzer {
    fn default() -> Self {
        PerFieldAnalyzer::new(Arc::new(Analyzer::standard()))
    }
}
