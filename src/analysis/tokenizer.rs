use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Standard Unicode tokenizer
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        // Use unicode_segmentation to split into words
        for (offset, word) in text.unicode_word_indices() {
            if word.len() <= self.max_token_length {
                tokens.push(Token::new(word.to_string(), position, offset));
                position += 1;
            }
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Splits on whitespace only, keeping punctuation attached.
#[derive(Clone, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;

        for (i, c) in text.char_indices() {
            if c.is_whitespace() {
                if let Some(s) = start.take() {
                    let position = tokens.len() as u32;
                    tokens.push(Token::new(text[s..i].to_string(), position, s));
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            let position = tokens.len() as u32;
            tokens.push(Token::new(text[s..].to_string(), position, s));
        }

        tokens
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// Emits the whole input as a single token.
#[derive(Clone, Default)]
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::new(text.to_string(), 0, 0)]
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_positions_and_offsets() {
        let tokens = StandardTokenizer::default().tokenize("Hello, brave new-world");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "brave", "new", "world"]);
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[1].offset, 7);
    }

    #[test]
    fn test_whitespace_keeps_punctuation() {
        let tokens = WhitespaceTokenizer.tokenize("foo-bar  baz!");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["foo-bar", "baz!"]);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_keyword_single_token() {
        let tokens = KeywordTokenizer.tokenize("Red Fox");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "Red Fox");
        assert!(KeywordTokenizer.tokenize("").is_empty());
    }
}
