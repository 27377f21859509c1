use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

pub struct StemmerFilter {
    stemmer: Stemmer,
    name: &'static str,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm, name: &'static str) -> Self {
        StemmerFilter {
            stemmer: Stemmer::create(algorithm),
            name,
        }
    }

    pub fn english() -> Self {
        Self::new(Algorithm::English, "stemmer_english")
    }

    pub fn french() -> Self {
        Self::new(Algorithm::French, "stemmer_french")
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .map(|mut token| {
                token.text = self.stemmer.stem(&token.text).to_string();
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        self.name
    }
}
