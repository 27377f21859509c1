use crate::analysis::token::Token;

/// One stage of an analyzer chain; may drop, rewrite or keep tokens.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token>;

    fn name(&self) -> &str;
}
