use serde::{Serialize, Deserialize};

/// A term produced by a tokenizer, before filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,     // Position in the field (for phrase queries)
    pub offset: usize,     // Byte offset in original text
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        Token { text, position, offset }
    }
}
