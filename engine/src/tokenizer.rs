//! Delimiter-driven tokenization.
//!
//! A [`Tokenizer`] is a small strategy value: a delimiter policy plus an
//! optional pre-scan filter. Scanning produces a lazy, restartable
//! [`TokenStream`]; each [`Token`] carries its byte span in the scanned text,
//! an auto-detected [`TokenType`] and a CRC32 fingerprint of its value.

use crate::error::{EngineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use time::macros::format_description;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^\d+\.?\d*$").expect("valid regex");
    static ref EMAIL: Regex =
        Regex::new(r"^[\w.+-]+@[\w-]+(?:\.[\w-]+)+$").expect("valid regex");
    static ref ALPHA_WORD: Regex =
        Regex::new(r"^[\p{L}_]+(?:['-][\p{L}_]+)*$").expect("valid regex");
    static ref ALNUM: Regex = Regex::new(r"^[\p{L}\p{N}]*\p{L}[\p{L}\p{N}]*$").expect("valid regex");
    static ref ACRONYM: Regex = Regex::new(r"^(?:\p{L}{1,2}\.)+\p{L}{0,2}$").expect("valid regex");
    static ref OPERATOR: Regex = Regex::new(r"^[^\w\s]+$").expect("valid regex");
}

/// Lexical category of a token. Detection order is fixed, see [`TokenType::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Character,
    Number,
    Link,
    Date,
    Word,
    Acronym,
    Operator,
    Path,
    Unknown,
}

impl TokenType {
    /// First matching test wins: single letter, number, email, date, word,
    /// acronym, operator, URI.
    pub fn detect(value: &str) -> TokenType {
        if value.len() == 1 && value.as_bytes()[0].is_ascii_alphabetic() {
            TokenType::Character
        } else if NUMBER.is_match(value) {
            TokenType::Number
        } else if EMAIL.is_match(value) {
            TokenType::Link
        } else if parses_as_date(value) {
            TokenType::Date
        } else if ALPHA_WORD.is_match(value) || (ALNUM.is_match(value) && !has_char_run(value, 3)) {
            TokenType::Word
        } else if ACRONYM.is_match(value) {
            TokenType::Acronym
        } else if OPERATOR.is_match(value) {
            TokenType::Operator
        } else if url::Url::parse(value).is_ok() {
            TokenType::Path
        } else {
            TokenType::Unknown
        }
    }
}

fn parses_as_date(value: &str) -> bool {
    let formats = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[year]/[month]/[day]"),
        format_description!("[day]/[month]/[year]"),
        format_description!("[day].[month].[year]"),
        format_description!("[month]/[day]/[year]"),
    ];
    formats
        .iter()
        .any(|fmt| time::Date::parse(value, *fmt).is_ok())
}

/// True when some character repeats `run` or more times in a row.
fn has_char_run(value: &str, run: usize) -> bool {
    let mut prev = None;
    let mut count = 0;
    for c in value.chars() {
        if Some(c) == prev {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            prev = Some(c);
            count = 1;
        }
    }
    false
}

/// An immutable lexical token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    start: usize,
    end: usize,
    value: String,
    kind: TokenType,
    fingerprint: u32,
}

impl Token {
    /// Builds a token starting at byte offset `start` with an auto-detected type.
    pub fn new(value: impl Into<String>, start: usize) -> Self {
        let value = value.into();
        let kind = TokenType::detect(&value);
        Self::with_type(value, start, kind)
    }

    pub fn with_type(value: impl Into<String>, start: usize, kind: TokenType) -> Self {
        let value = value.into();
        let fingerprint = crc32fast::hash(value.as_bytes());
        Self { start, end: start + value.len(), value, kind, fingerprint }
    }

    pub fn start(&self) -> usize { self.start }
    pub fn end(&self) -> usize { self.end }
    pub fn len(&self) -> usize { self.end - self.start }
    pub fn is_empty(&self) -> bool { self.value.is_empty() }
    pub fn value(&self) -> &str { &self.value }
    pub fn kind(&self) -> TokenType { self.kind }
    pub fn fingerprint(&self) -> u32 { self.fingerprint }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]:{:?}", self.value, self.start, self.end, self.kind)
    }
}

/// Which characters split tokens.
///
/// Whitespace always splits. `numeric_separators` split only when they are
/// not flanked by digits on both sides, so `3.14` and `1,000` stay whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    explicit: BTreeSet<char>,
    non_word: bool,
    numeric_separators: BTreeSet<char>,
}

impl Delimiters {
    /// Only whitespace splits.
    pub fn whitespace() -> Self {
        Self { explicit: BTreeSet::new(), non_word: false, numeric_separators: BTreeSet::new() }
    }

    /// Everything outside `\w` splits.
    pub fn non_word() -> Self {
        Self { non_word: true, ..Self::whitespace() }
    }

    /// An explicit delimiter set. Letters are rejected since they would cut words apart.
    pub fn from_chars(chars: &str) -> Result<Self> {
        if chars.is_empty() {
            return Err(EngineError::invalid("delimiter set is empty"));
        }
        if let Some(c) = chars.chars().find(|c| c.is_alphabetic()) {
            return Err(EngineError::invalid(format!("letter {c:?} cannot be a delimiter")));
        }
        Ok(Self { explicit: chars.chars().collect(), ..Self::whitespace() })
    }

    pub fn with_numeric_separators(mut self, chars: &str) -> Result<Self> {
        if let Some(c) = chars.chars().find(|c| c.is_alphanumeric() || c.is_whitespace()) {
            return Err(EngineError::invalid(format!("{c:?} cannot be a numeric separator")));
        }
        self.numeric_separators = chars.chars().collect();
        Ok(self)
    }

    fn is_delimiter(&self, prev: Option<char>, c: char, next: Option<char>) -> bool {
        if c.is_whitespace() {
            return true;
        }
        if self.numeric_separators.contains(&c) {
            let digit = |x: Option<char>| x.map_or(false, |x| x.is_ascii_digit());
            return !(digit(prev) && digit(next));
        }
        self.explicit.contains(&c) || (self.non_word && !(c.is_alphanumeric() || c == '_'))
    }
}

/// The built-in tokenizer strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    Whitespace,
    #[default]
    Character,
    Numeric,
    Bias,
}

impl FromStr for TokenizerKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "whitespace" => Ok(TokenizerKind::Whitespace),
            "character" => Ok(TokenizerKind::Character),
            "numeric" => Ok(TokenizerKind::Numeric),
            "bias" | "per_field" => Ok(TokenizerKind::Bias),
            other => Err(EngineError::invalid(format!("unknown tokenizer {other:?}"))),
        }
    }
}

const BIAS_DELIMITERS: &str = ",;:!?()[]{}<>\"`/\\|+=*&^%$#~«»“”‘’0123456789";
const NUMERIC_DELIMITERS: &str = ";:!?()[]{}<>\"'`/\\|+=*&^%$#~@";
const QUOTE_BROKERS: &[char] = &['"', '\'', '`', '«', '»', '“', '”', '‘', '’', '-'];

type Prefilter = fn(&str) -> Cow<'_, str>;

/// Splits text into tokens using a delimiter policy and an optional pre-scan filter.
#[derive(Clone)]
pub struct Tokenizer {
    kind: TokenizerKind,
    delimiters: Delimiters,
    return_delimiters: bool,
    prefilter: Option<Prefilter>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("kind", &self.kind)
            .field("delimiters", &self.delimiters)
            .field("return_delimiters", &self.return_delimiters)
            .finish()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new(TokenizerKind::default())
    }
}

impl Tokenizer {
    pub fn new(kind: TokenizerKind) -> Self {
        let (delimiters, prefilter): (Delimiters, Option<Prefilter>) = match kind {
            TokenizerKind::Whitespace => (Delimiters::whitespace(), None),
            TokenizerKind::Character => (Delimiters::non_word(), None),
            TokenizerKind::Numeric => (
                Delimiters {
                    explicit: NUMERIC_DELIMITERS.chars().collect(),
                    non_word: false,
                    numeric_separators: ".,".chars().collect(),
                },
                None,
            ),
            TokenizerKind::Bias => (
                Delimiters {
                    explicit: BIAS_DELIMITERS.chars().collect(),
                    non_word: false,
                    numeric_separators: BTreeSet::new(),
                },
                Some(bias_filter as Prefilter),
            ),
        };
        Self { kind, delimiters, return_delimiters: false, prefilter }
    }

    /// Replaces the delimiter policy while keeping the strategy's filter.
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Emit non-whitespace delimiters as single-character tokens.
    pub fn returning_delimiters(mut self, yes: bool) -> Self {
        self.return_delimiters = yes;
        self
    }

    pub fn kind(&self) -> TokenizerKind { self.kind }

    /// Starts a lazy scan of `text`. Offsets refer to the filtered text.
    pub fn scan<'a>(&'a self, text: &'a str) -> TokenStream<'a> {
        let text = match self.prefilter {
            Some(filter) => filter(text),
            None => Cow::Borrowed(text),
        };
        TokenStream { tokenizer: self, text, cursor: 0, current: None }
    }

    /// Convenience for `scan(text).tokens()`.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.scan(text).tokens()
    }
}

/// Pull-style, restartable sequence of tokens over one text.
#[derive(Clone)]
pub struct TokenStream<'a> {
    tokenizer: &'a Tokenizer,
    text: Cow<'a, str>,
    cursor: usize,
    current: Option<Token>,
}

impl<'a> TokenStream<'a> {
    /// The text actually scanned, after the strategy's filter ran.
    pub fn text(&self) -> &str { &self.text }

    pub fn has_more_tokens(&self) -> bool {
        self.peek_span(self.cursor).is_some()
    }

    /// The token most recently returned by `next`.
    pub fn current_token(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Remaining tokens, without advancing.
    pub fn count_tokens(&self) -> usize {
        let mut at = self.cursor;
        let mut n = 0;
        while let Some((_, end)) = self.peek_span(at) {
            n += 1;
            at = end;
        }
        n
    }

    /// Rewinds to the beginning of the text.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.current = None;
    }

    /// Materializes all remaining tokens.
    pub fn tokens(self) -> Vec<Token> {
        self.collect()
    }

    fn is_delim_at(&self, at: usize, c: char) -> bool {
        let prev = self.text[..at].chars().next_back();
        let next = self.text[at + c.len_utf8()..].chars().next();
        self.tokenizer.delimiters.is_delimiter(prev, c, next)
    }

    /// Byte span of the next token at or after `from`.
    fn peek_span(&self, from: usize) -> Option<(usize, usize)> {
        let text = &self.text[..];
        let mut chars = text[from..].char_indices().map(|(i, c)| (i + from, c)).peekable();
        while let Some(&(i, c)) = chars.peek() {
            if !self.is_delim_at(i, c) {
                break;
            }
            if self.tokenizer.return_delimiters && !c.is_whitespace() {
                return Some((i, i + c.len_utf8()));
            }
            chars.next();
        }
        let (start, _) = *chars.peek()?;
        let mut end = text.len();
        for (i, c) in chars {
            if self.is_delim_at(i, c) {
                end = i;
                break;
            }
        }
        Some((start, end))
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let (start, end) = self.peek_span(self.cursor)?;
        self.cursor = end;
        let token = Token::new(&self.text[start..end], start);
        self.current = Some(token.clone());
        Some(token)
    }
}

/// Pre-scan filter of the bias strategy, applied per whitespace-separated chunk:
/// strips quote-like brokers from chunk edges, collapses hyphen and apostrophe
/// runs, and turns sentence periods into spaces unless the chunk is an acronym
/// or an email address.
fn bias_filter(text: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(text.len());
    let mut chunk_start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), chunk_start) {
            (true, Some(s)) => {
                filter_chunk(&text[s..i], &mut out);
                chunk_start = None;
                out.push(c);
            }
            (true, None) => out.push(c),
            (false, None) => chunk_start = Some(i),
            (false, Some(_)) => {}
        }
    }
    if let Some(s) = chunk_start {
        filter_chunk(&text[s..], &mut out);
    }
    if out == text { Cow::Borrowed(text) } else { Cow::Owned(out) }
}

fn filter_chunk(chunk: &str, out: &mut String) {
    let trimmed = chunk.trim_matches(QUOTE_BROKERS);
    let mut collapsed = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if (c == '-' || c == '\'') && collapsed.ends_with(c) {
            continue;
        }
        collapsed.push(c);
    }
    if ACRONYM.is_match(&collapsed) {
        out.push_str(&collapsed);
        return;
    }
    // an email may close a sentence, so check it without the final periods
    let body = collapsed.trim_end_matches('.');
    if EMAIL.is_match(body) {
        out.push_str(body);
        if body.len() < collapsed.len() {
            out.push(' ');
        }
        return;
    }
    for c in collapsed.chars() {
        if c == '.' {
            if !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.value()).collect()
    }

    #[test]
    fn detects_types_in_precedence_order() {
        assert_eq!(TokenType::detect("a"), TokenType::Character);
        assert_eq!(TokenType::detect("42"), TokenType::Number);
        assert_eq!(TokenType::detect("3.14"), TokenType::Number);
        assert_eq!(TokenType::detect("bob@example.com"), TokenType::Link);
        assert_eq!(TokenType::detect("2024-01-31"), TokenType::Date);
        assert_eq!(TokenType::detect("31.01.2024"), TokenType::Date);
        assert_eq!(TokenType::detect("snake_case"), TokenType::Word);
        assert_eq!(TokenType::detect("mp3"), TokenType::Word);
        assert_eq!(TokenType::detect("U.S.A."), TokenType::Acronym);
        assert_eq!(TokenType::detect("=="), TokenType::Operator);
        assert_eq!(TokenType::detect("https://example.com/a?b"), TokenType::Path);
        assert_eq!(TokenType::detect("zzz999"), TokenType::Unknown);
    }

    #[test]
    fn token_spans_and_fingerprint() {
        let t = Token::new("cat", 4);
        assert_eq!((t.start(), t.end(), t.len()), (4, 7, 3));
        assert_eq!(t.fingerprint(), Token::new("cat", 99).fingerprint());
        assert_ne!(t.fingerprint(), Token::new("cab", 4).fingerprint());
    }

    #[test]
    fn whitespace_keeps_punctuation() {
        let tok = Tokenizer::new(TokenizerKind::Whitespace);
        let tokens = tok.tokenize("hello,  world!\tbye\n");
        assert_eq!(values(&tokens), ["hello,", "world!", "bye"]);
        assert_eq!(tokens[1].start(), 8);
    }

    #[test]
    fn character_splits_on_non_word() {
        let tok = Tokenizer::new(TokenizerKind::Character);
        assert_eq!(values(&tok.tokenize("the cat, sat; on_the-mat.")), ["the", "cat", "sat", "on_the", "mat"]);
    }

    #[test]
    fn character_can_return_delimiters() {
        let tok = Tokenizer::new(TokenizerKind::Character).returning_delimiters(true);
        let tokens = tok.tokenize("a+b = c");
        assert_eq!(values(&tokens), ["a", "+", "b", "=", "c"]);
        assert_eq!(tokens[1].kind(), TokenType::Operator);
    }

    #[test]
    fn numeric_keeps_decimal_and_grouping() {
        let tok = Tokenizer::new(TokenizerKind::Numeric);
        let tokens = tok.tokenize("pay 1,000.50 now. ok, 3.14");
        assert_eq!(values(&tokens), ["pay", "1,000.50", "now", "ok", "3.14"]);
        assert_eq!(tokens[4].kind(), TokenType::Number);
    }

    #[test]
    fn bias_filters_quotes_hyphens_and_periods() {
        let tok = Tokenizer::new(TokenizerKind::Bias);
        let tokens = tok.tokenize("\"Hello\" co--op it''s end. See U.S.A. and bob@mail.com.");
        assert_eq!(
            values(&tokens),
            ["Hello", "co-op", "it's", "end", "See", "U.S.A.", "and", "bob@mail.com"]
        );
    }

    #[test]
    fn bias_keeps_email_without_trailing_period() {
        let tok = Tokenizer::new(TokenizerKind::Bias);
        let tokens = tok.tokenize("mail bob@mail.com today");
        assert_eq!(tokens[1].value(), "bob@mail.com");
        assert_eq!(tokens[1].kind(), TokenType::Link);
    }

    #[test]
    fn bias_keeps_sentence_final_email() {
        let tok = Tokenizer::new(TokenizerKind::Bias);
        let tokens = tok.tokenize("write to bob@mail.com... or alice@example.org. Thanks");
        assert_eq!(values(&tokens), ["write", "to", "bob@mail.com", "or", "alice@example.org", "Thanks"]);
        assert_eq!(tokens[2].kind(), TokenType::Link);
    }

    #[test]
    fn bias_treats_digits_as_delimiters() {
        let tok = Tokenizer::new(TokenizerKind::Bias);
        assert_eq!(values(&tok.tokenize("abc123def")), ["abc", "def"]);
    }

    #[test]
    fn stream_is_lazy_and_restartable() {
        let tok = Tokenizer::default();
        let mut stream = tok.scan("one two three");
        assert_eq!(stream.count_tokens(), 3);
        assert!(stream.current_token().is_none());
        assert_eq!(stream.next().unwrap().value(), "one");
        assert_eq!(stream.current_token().unwrap().value(), "one");
        assert_eq!(stream.count_tokens(), 2);
        assert!(stream.has_more_tokens());
        stream.next();
        stream.next();
        assert!(!stream.has_more_tokens());
        assert!(stream.next().is_none());
        stream.reset();
        assert_eq!(stream.tokens().len(), 3);
    }

    #[test]
    fn empty_and_delimiter_only_input() {
        let tok = Tokenizer::default();
        assert!(tok.tokenize("").is_empty());
        assert!(tok.tokenize(" ,;. ").is_empty());
    }

    #[test]
    fn rejects_bad_delimiter_sets() {
        assert!(Delimiters::from_chars("").is_err());
        assert!(Delimiters::from_chars(",a").is_err());
        assert!(Delimiters::from_chars(",;").is_ok());
        assert!(Delimiters::whitespace().with_numeric_separators("5").is_err());
    }

    #[test]
    fn custom_delimiters_keep_strategy() {
        let tok = Tokenizer::new(TokenizerKind::Whitespace)
            .with_delimiters(Delimiters::from_chars("|").unwrap());
        assert_eq!(values(&tok.tokenize("a|b c")), ["a", "b", "c"]);
    }

    #[test]
    fn tokenizing_twice_is_identical() {
        let text = "Mixed input: 12.5 kg, e.g. bob@x.org on 2024-01-31 -> done!";
        for kind in [TokenizerKind::Whitespace, TokenizerKind::Character, TokenizerKind::Numeric, TokenizerKind::Bias] {
            let tok = Tokenizer::new(kind);
            assert_eq!(tok.tokenize(text), tok.tokenize(text));
        }
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("Bias".parse::<TokenizerKind>().unwrap(), TokenizerKind::Bias);
        assert!("fancy".parse::<TokenizerKind>().is_err());
    }
}
