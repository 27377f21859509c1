use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Drops stop words. Positions of the remaining tokens are left untouched,
/// so phrase queries still see the gaps.
pub struct StopWordFilter {
    pub stop_words: HashSet<String>,
}

impl StopWordFilter {
    pub fn new(stop_words: Vec<String>) -> Self {
        StopWordFilter {
            stop_words: stop_words.into_iter().collect(),
        }
    }

    pub fn english() -> Self {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for",
            "if", "in", "into", "is", "it", "no", "not", "of", "on", "or",
            "such", "that", "the", "their", "then", "there", "these", "they",
            "this", "to", "was", "will", "with"
        ].into_iter().map(String::from).collect();

        StopWordFilter::new(words)
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .filter(|token| !self.stop_words.contains(&token.text))
            .collect()
    }

    fn name(&self) -> &str {
        "stop_words"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_survive_removal() {
        let tokens = vec![
            Token::new("quick".into(), 0, 0),
            Token::new("the".into(), 1, 6),
            Token::new("fox".into(), 2, 10),
        ];
        let filtered = StopWordFilter::english().filter(tokens);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[1].text, "fox");
        assert_eq!(filtered[1].position, 2);
    }
}
