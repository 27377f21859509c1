use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};
use crate::analysis::PerFieldAnalyzer;
use crate::core::error::{IndexError, Result};
use crate::core::types::ValueType;
use crate::mapper::field::FieldTypes;
use crate::query::ast::{BoolQuery, Occur, PhraseQuery, PointRangeQuery, Query, TermRangeQuery};

/// Characters that end a bare word.
const SPECIAL: &str = "()[]{}\":^~";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Colon,
    Plus,
    Minus,
    LParen,
    RParen,
    RangeStart { inclusive: bool },
    RangeEnd { inclusive: bool },
    Caret(f32),
    Tilde(Option<u32>),
}

fn word(input: &str) -> IResult<&str, Token> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !SPECIAL.contains(c)),
        |w: &str| Token::Word(w.to_string()),
    )
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        |s: &str| Token::Quoted(s.to_string()),
    )
    .parse(input)
}

fn boost(input: &str) -> IResult<&str, Token> {
    map(
        preceded(
            char('^'),
            map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), str::parse::<f32>),
        ),
        Token::Caret,
    )
    .parse(input)
}

fn slop(input: &str) -> IResult<&str, Token> {
    map(
        preceded(char('~'), opt(map_res(digit1, str::parse::<u32>))),
        Token::Tilde,
    )
    .parse(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::Colon, char(':')),
        value(Token::RangeStart { inclusive: true }, char('[')),
        value(Token::RangeStart { inclusive: false }, char('{')),
        value(Token::RangeEnd { inclusive: true }, char(']')),
        value(Token::RangeEnd { inclusive: false }, char('}')),
        value(Token::Plus, char('+')),
        value(Token::Minus, char('-')),
        boost,
        slop,
        quoted,
        word,
    ))
    .parse(input)
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    all_consuming(preceded(multispace0, many0(terminated(token, multispace0))))
        .parse(input)
        .map(|(_, tokens)| tokens)
        .map_err(|e| IndexError::invalid_argument(format!("malformed query '{}': {}", input, e)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conjunction {
    None,
    And,
    Or,
}

/// Free-text query parser.
///
/// Syntax: `term`, `field:term`, `"a phrase"~2`, `(group)`, `field:(group)`,
/// `[a TO b]`/`{a TO b}` ranges with `*` for an open bound, `+`/`-`/`NOT`
/// prefixes, `AND`/`OR` conjunctions and `^boost`. Clauses default to SHOULD.
///
/// Words and phrases go through the field's analyzer. Range bounds are typed
/// from the mapper: numeric fields become point ranges, string fields term
/// ranges.
pub struct QueryParser<'a> {
    default_field: String,
    analyzer: &'a PerFieldAnalyzer,
    field_types: &'a FieldTypes,
}

impl<'a> QueryParser<'a> {
    pub fn new(default_field: impl Into<String>, analyzer: &'a PerFieldAnalyzer, field_types: &'a FieldTypes) -> Self {
        QueryParser {
            default_field: default_field.into(),
            analyzer,
            field_types,
        }
    }

    /// A query whose terms were all analyzed away matches nothing.
    pub fn parse(&self, input: &str) -> Result<Query> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(IndexError::invalid_argument("empty query"));
        }

        let mut stream = TokenStream { tokens, pos: 0 };
        let query = self.parse_clauses(&mut stream, &self.default_field)?;
        if let Some(token) = stream.peek() {
            return Err(IndexError::invalid_argument(format!("unexpected {:?} in '{}'", token, input)));
        }
        Ok(query.unwrap_or_else(|| Query::Bool(BoolQuery::new())))
    }

    fn parse_clauses(&self, stream: &mut TokenStream, field: &str) -> Result<Option<Query>> {
        let mut clauses: Vec<(Occur, Query)> = Vec::new();
        let mut first_unmodified = false;

        while let Some(token) = stream.peek() {
            if *token == Token::RParen {
                break;
            }

            let conjunction = if stream.eat_word("AND") {
                Conjunction::And
            } else if stream.eat_word("OR") {
                Conjunction::Or
            } else {
                Conjunction::None
            };

            let modifier = match stream.peek() {
                Some(Token::Plus) => {
                    stream.advance();
                    Some(Occur::Must)
                }
                Some(Token::Minus) => {
                    stream.advance();
                    Some(Occur::MustNot)
                }
                Some(Token::Word(w)) if w == "NOT" => {
                    stream.advance();
                    Some(Occur::MustNot)
                }
                _ => None,
            };

            let is_first = clauses.is_empty() && conjunction == Conjunction::None;
            let query = self.parse_clause(stream, field)?;
            add_clause(&mut clauses, conjunction, modifier, query);
            if is_first && modifier.is_none() && clauses.len() == 1 {
                first_unmodified = true;
            }
        }

        Ok(match clauses.len() {
            0 => None,
            1 if first_unmodified && clauses[0].0 == Occur::Should => clauses.pop().map(|(_, q)| q),
            _ => {
                let mut bool_query = BoolQuery::new();
                for (occur, query) in clauses {
                    bool_query.add(occur, query);
                }
                Some(Query::Bool(bool_query))
            }
        })
    }

    fn parse_clause(&self, stream: &mut TokenStream, field: &str) -> Result<Option<Query>> {
        let mut field = field.to_string();
        if let (Some(Token::Word(name)), Some(Token::Colon)) = (stream.peek(), stream.peek_at(1)) {
            field = name.clone();
            stream.advance();
            stream.advance();
        }

        let query = match stream.next() {
            Some(Token::LParen) => {
                let query = self.parse_clauses(stream, &field)?;
                stream.expect(&Token::RParen, "')'")?;
                query
            }
            Some(Token::Quoted(text)) => {
                let slop = match stream.peek() {
                    Some(Token::Tilde(slop)) => {
                        let slop = slop.unwrap_or(0);
                        stream.advance();
                        slop
                    }
                    _ => 0,
                };
                phrase_query(self.analyzer, &field, &text, slop)
            }
            Some(Token::RangeStart { inclusive }) => Some(self.parse_range(stream, &field, inclusive)?),
            Some(Token::Word(text)) => {
                if let Some(Token::Tilde(_)) = stream.peek() {
                    return Err(IndexError::invalid_argument(format!(
                        "fuzzy query '{}~' is not supported",
                        text
                    )));
                }
                if field == "*" && text == "*" {
                    Some(Query::MatchAll)
                } else {
                    terms_query(self.analyzer, &field, &text, Occur::Should)
                }
            }
            other => {
                return Err(IndexError::invalid_argument(format!(
                    "expected a term, found {:?}",
                    other
                )));
            }
        };

        if let Some(Token::Caret(boost)) = stream.peek() {
            let boost = *boost;
            stream.advance();
            return Ok(query.map(|q| q.boosted(boost)));
        }
        Ok(query)
    }

    fn parse_range(&self, stream: &mut TokenStream, field: &str, include_lower: bool) -> Result<Query> {
        let lower = stream.range_bound()?;
        if !stream.eat_word("TO") {
            return Err(IndexError::invalid_argument(format!("expected TO in range on '{}'", field)));
        }
        let upper = stream.range_bound()?;
        let include_upper = match stream.next() {
            Some(Token::RangeEnd { inclusive }) => inclusive,
            other => {
                return Err(IndexError::invalid_argument(format!(
                    "expected ']' or '}}' closing range on '{}', found {:?}",
                    field, other
                )));
            }
        };

        let value_type = self.field_types.value_type(field).map_err(|_| {
            IndexError::invalid_argument(format!("range on unknown field '{}'", field))
        })?;
        let bounds = RangeBounds {
            field,
            lower: lower.as_deref(),
            upper: upper.as_deref(),
            include_lower,
            include_upper,
        };
        match value_type {
            ValueType::Integer => bounds.int(),
            ValueType::Long => bounds.long(),
            ValueType::Float => bounds.float(),
            ValueType::Double => bounds.double(),
            ValueType::String => Ok(Query::TermRange(TermRangeQuery {
                field: field.to_string(),
                lower: lower.map(|b| normalize(self.analyzer, field, b)),
                upper: upper.map(|b| normalize(self.analyzer, field, b)),
                include_lower,
                include_upper,
            })),
        }
    }
}

/// Classic boolean clause combination: `AND` makes the previous clause required.
fn add_clause(
    clauses: &mut Vec<(Occur, Query)>,
    conjunction: Conjunction,
    modifier: Option<Occur>,
    query: Option<Query>,
) {
    if conjunction == Conjunction::And {
        if let Some(last) = clauses.last_mut() {
            if last.0 != Occur::MustNot {
                last.0 = Occur::Must;
            }
        }
    }
    let Some(query) = query else {
        return;
    };
    let occur = match modifier {
        Some(occur) => occur,
        None if conjunction == Conjunction::And => Occur::Must,
        None => Occur::Should,
    };
    clauses.push((occur, query));
}

/// Analyzes `text`: nothing for no token, a term for one, a boolean of
/// terms combined with `terms_occur` otherwise.
pub(crate) fn terms_query(analyzer: &PerFieldAnalyzer, field: &str, text: &str, terms_occur: Occur) -> Option<Query> {
    let mut tokens = analyzer.analyze(field, text);
    match tokens.len() {
        0 => None,
        1 => tokens.pop().map(|t| Query::term(field, t.text)),
        _ => {
            let mut bool_query = BoolQuery::new();
            for token in tokens {
                bool_query.add(terms_occur, Query::term(field, token.text));
            }
            Some(Query::Bool(bool_query))
        }
    }
}

/// Analyzes `text` into a phrase, keeping token positions relative to the
/// first token so removed stop words still count as gaps.
pub(crate) fn phrase_query(analyzer: &PerFieldAnalyzer, field: &str, text: &str, slop: u32) -> Option<Query> {
    let mut tokens = analyzer.analyze(field, text);
    match tokens.len() {
        0 => None,
        1 => tokens.pop().map(|t| Query::term(field, t.text)),
        _ => {
            let start = tokens[0].position;
            Some(Query::Phrase(PhraseQuery {
                field: field.to_string(),
                terms: tokens.into_iter().map(|t| (t.position - start, t.text)).collect(),
                slop,
            }))
        }
    }
}

fn normalize(analyzer: &PerFieldAnalyzer, field: &str, bound: String) -> String {
    let mut tokens = analyzer.analyze(field, &bound);
    if tokens.len() == 1 {
        tokens.pop().map_or(bound, |t| t.text)
    } else {
        bound
    }
}

struct RangeBounds<'a> {
    field: &'a str,
    lower: Option<&'a str>,
    upper: Option<&'a str>,
    include_lower: bool,
    include_upper: bool,
}

macro_rules! integer_range {
    ($name:ident, $ty:ty, $ctor:ident) => {
        fn $name(&self) -> Result<Query> {
            let mut lower = self.parse::<$ty>(self.lower)?.unwrap_or(<$ty>::MIN);
            let mut upper = self.parse::<$ty>(self.upper)?.unwrap_or(<$ty>::MAX);
            if !self.include_lower && self.lower.is_some() {
                lower = lower.saturating_add(1);
            }
            if !self.include_upper && self.upper.is_some() {
                upper = upper.saturating_sub(1);
            }
            Ok(Query::PointRange(PointRangeQuery::$ctor(self.field, lower, upper)))
        }
    };
}

macro_rules! float_range {
    ($name:ident, $ty:ty, $ctor:ident, $up:ident, $down:ident) => {
        fn $name(&self) -> Result<Query> {
            let mut lower = self.parse::<$ty>(self.lower)?.unwrap_or(<$ty>::NEG_INFINITY);
            let mut upper = self.parse::<$ty>(self.upper)?.unwrap_or(<$ty>::INFINITY);
            if !self.include_lower && self.lower.is_some() {
                lower = $up(lower);
            }
            if !self.include_upper && self.upper.is_some() {
                upper = $down(upper);
            }
            Ok(Query::PointRange(PointRangeQuery::$ctor(self.field, lower, upper)))
        }
    };
}

impl RangeBounds<'_> {
    integer_range!(int, i32, int);
    integer_range!(long, i64, long);
    float_range!(float, f32, float, next_up_f32, next_down_f32);
    float_range!(double, f64, double, next_up_f64, next_down_f64);

    fn parse<N: std::str::FromStr>(&self, bound: Option<&str>) -> Result<Option<N>> {
        bound
            .map(|b| {
                b.parse::<N>().map_err(|_| {
                    IndexError::invalid_argument(format!("invalid range bound '{}' for field '{}'", b, self.field))
                })
            })
            .transpose()
    }
}

fn next_up_f64(v: f64) -> f64 {
    if v.is_nan() || v == f64::INFINITY {
        v
    } else if v == 0.0 {
        f64::from_bits(1)
    } else if v > 0.0 {
        f64::from_bits(v.to_bits() + 1)
    } else {
        f64::from_bits(v.to_bits() - 1)
    }
}

fn next_down_f64(v: f64) -> f64 {
    -next_up_f64(-v)
}

fn next_up_f32(v: f32) -> f32 {
    if v.is_nan() || v == f32::INFINITY {
        v
    } else if v == 0.0 {
        f32::from_bits(1)
    } else if v > 0.0 {
        f32::from_bits(v.to_bits() + 1)
    } else {
        f32::from_bits(v.to_bits() - 1)
    }
}

fn next_down_f32(v: f32) -> f32 {
    -next_up_f32(-v)
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_word(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, label: &str) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(IndexError::invalid_argument(format!("expected {}, found {:?}", label, other))),
        }
    }

    /// A bound word, quoted string or negative number; `*` is open.
    fn range_bound(&mut self) -> Result<Option<String>> {
        match self.next() {
            Some(Token::Word(w)) if w == "*" => Ok(None),
            Some(Token::Word(w)) | Some(Token::Quoted(w)) => Ok(Some(w)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Word(w)) => Ok(Some(format!("-{}", w))),
                other => Err(IndexError::invalid_argument(format!("invalid range bound -{:?}", other))),
            },
            other => Err(IndexError::invalid_argument(format!("invalid range bound {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::analysis::Analyzer;
    use crate::core::types::Number;

    fn types() -> FieldTypes {
        FieldTypes::new()
            .with_indexed("title", ValueType::String)
            .with_indexed("size", ValueType::Integer)
            .with_indexed("date", ValueType::Long)
            .with_indexed("price", ValueType::Double)
    }

    fn parse(input: &str) -> Result<Query> {
        let analyzer = PerFieldAnalyzer::new(Arc::new(Analyzer::english()));
        QueryParser::new("title", &analyzer, &types()).parse(input)
    }

    #[test]
    fn test_single_term_is_not_wrapped() {
        assert_eq!(parse("Foxes").unwrap(), Query::term("title", "fox"));
        assert_eq!(parse("*:*").unwrap(), Query::MatchAll);
    }

    #[test]
    fn test_modifiers_and_conjunctions() {
        let query = parse("+quick -lazy brown").unwrap();
        assert_eq!(query.to_string(), "+title:quick title:brown -title:lazi");

        let query = parse("quick AND brown OR fox").unwrap();
        assert_eq!(query.to_string(), "+title:quick +title:brown title:fox");

        let query = parse("quick NOT fox").unwrap();
        assert_eq!(query.to_string(), "title:quick -title:fox");
    }

    #[test]
    fn test_phrase_keeps_stop_word_gaps() {
        let query = parse("\"quick the fox\"~2^3").unwrap();
        let Query::Boost(boost) = query else {
            panic!("expected a boost");
        };
        assert_eq!(boost.boost, 3.0);
        assert_eq!(
            *boost.query,
            Query::Phrase(PhraseQuery {
                field: "title".into(),
                terms: vec![(0, "quick".into()), (2, "fox".into())],
                slop: 2,
            })
        );
    }

    #[test]
    fn test_field_groups() {
        let query = parse("size:[1 TO 5] title:(red OR blue)").unwrap();
        assert_eq!(query.to_string(), "size:[1 TO 5] (title:red title:blue)");
    }

    #[test]
    fn test_typed_ranges() {
        let query = parse("size:{1 TO 5}").unwrap();
        assert_eq!(query, Query::PointRange(PointRangeQuery::int("size", 2, 4)));

        let query = parse("date:[-10 TO *]").unwrap();
        assert_eq!(query, Query::PointRange(PointRangeQuery::long("date", -10, i64::MAX)));

        let Query::PointRange(range) = parse("price:{1.5 TO 2]").unwrap() else {
            panic!("expected a point range");
        };
        assert!(!range.contains(&Number::Double(1.5)));
        assert!(range.contains(&Number::Double(1.5000001)));
        assert!(range.contains(&Number::Double(2.0)));

        let query = parse("title:[Apple TO banana}").unwrap();
        assert_eq!(query.to_string(), "title:[appl TO banana}");
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(parse(""), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse("\"open phrase"), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse("color:[a TO b]"), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse("size:[one TO 5]"), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse("(quick"), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse("quick~1"), Err(IndexError::InvalidArgument(_))));
    }

    #[test]
    fn test_stop_words_only_match_nothing() {
        assert_eq!(parse("the").unwrap(), Query::Bool(BoolQuery::new()));
    }
}
