use crate::stemmer::{Language, Stemmer};
use crate::tokenizer::{Token, TokenType, Tokenizer, TokenizerKind};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use unicode_normalization::UnicodeNormalization;

/// Canonical search unit and index key.
///
/// Identity is the normalized text alone; the fingerprint is derived from it
/// and only used for sharding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    value: String,
    fingerprint: u32,
}

impl Term {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let fingerprint = crc32fast::hash(value.as_bytes());
        Self { value, fingerprint }
    }

    pub fn as_str(&self) -> &str { &self.value }
    pub fn fingerprint(&self) -> u32 { self.fingerprint }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Borrow<str> for Term {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Maps tokens of one language onto terms. Built once per session and shared
/// by reference; it holds no mutable state.
pub struct Normalizer {
    language: Language,
    stemmer: Box<dyn Stemmer>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer").field("language", &self.language).finish()
    }
}

impl Normalizer {
    pub fn new(language: Language) -> Self {
        Self { language, stemmer: language.stemmer() }
    }

    pub fn language(&self) -> Language { self.language }

    /// NFKC + lowercase, then stemming for word-like tokens. Numbers, links,
    /// dates and the rest keep their lowercased form.
    pub fn normalize(&self, token: &Token) -> Term {
        let lowered = token.value().nfkc().collect::<String>().to_lowercase();
        match token.kind() {
            TokenType::Word | TokenType::Character => Term::new(self.stemmer.stem(&lowered).into_owned()),
            _ => Term::new(lowered),
        }
    }
}

/// Tokenizer and normalizer pair. Documents and queries go through the same
/// analyzer so that their terms line up.
#[derive(Debug)]
pub struct Analyzer {
    tokenizer: Tokenizer,
    normalizer: Normalizer,
}

impl Analyzer {
    pub fn new(kind: TokenizerKind, language: Language) -> Self {
        Self::from_parts(Tokenizer::new(kind), Normalizer::new(language))
    }

    pub fn from_parts(tokenizer: Tokenizer, normalizer: Normalizer) -> Self {
        Self { tokenizer, normalizer }
    }

    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }
    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    /// Terms of `text` paired with their zero-based token ordinal.
    pub fn analyze<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (u64, Term)> + 'a {
        self.tokenizer
            .scan(text)
            .enumerate()
            .map(move |(pos, token)| (pos as u64, self.normalizer.normalize(&token)))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new(TokenizerKind::default(), Language::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_is_by_value() {
        let a = Term::new("cat");
        let b = Term::new(String::from("cat"));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        let set: HashSet<Term> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert!(set.contains("cat"));
    }

    #[test]
    fn normalizes_words_through_stemmer() {
        let n = Normalizer::new(Language::English);
        assert_eq!(n.normalize(&Token::new("Matting", 0)).as_str(), "mat");
        assert_eq!(n.normalize(&Token::new("CARESSES", 0)).as_str(), "caress");
        assert_eq!(n.normalize(&Token::new("A", 0)).as_str(), "a");
    }

    #[test]
    fn leaves_non_words_unstemmed() {
        let n = Normalizer::new(Language::English);
        assert_eq!(n.normalize(&Token::new("2024-01-31", 0)).as_str(), "2024-01-31");
        assert_eq!(n.normalize(&Token::new("Bob@Example.com", 0)).as_str(), "bob@example.com");
    }

    #[test]
    fn applies_nfkc() {
        let n = Normalizer::new(Language::Neutral);
        assert_eq!(n.normalize(&Token::new("ﬁle", 0)).as_str(), "file");
    }

    #[test]
    fn analyze_counts_positions_from_zero() {
        let analyzer = Analyzer::default();
        let terms: Vec<(u64, String)> = analyzer
            .analyze("Cats running, cats!")
            .map(|(p, t)| (p, t.as_str().to_string()))
            .collect();
        assert_eq!(terms, vec![(0, "cat".into()), (1, "run".into()), (2, "cat".into())]);
    }
}
