//! Language-specific stemming.
//!
//! English uses the classic Porter suffix-stripping algorithm implemented
//! here; the remaining languages delegate to the Snowball stemmers from
//! `rust-stemmers`.

use crate::error::{EngineError, Result};
use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Lowercasing only, no stemming.
    Neutral,
    #[default]
    English,
    Danish,
    Dutch,
    Finnish,
    French,
    German,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Turkish,
}

impl Language {
    fn snowball(self) -> Option<Algorithm> {
        Some(match self {
            Language::Neutral | Language::English => return None,
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Hungarian => Algorithm::Hungarian,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Romanian => Algorithm::Romanian,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
            Language::Turkish => Algorithm::Turkish,
        })
    }

    /// Builds the stemmer for this language.
    pub fn stemmer(self) -> Box<dyn Stemmer> {
        match (self, self.snowball()) {
            (Language::English, _) => Box::new(PorterStemmer),
            (_, Some(algorithm)) => Box::new(SnowballStemmer::new(algorithm)),
            _ => Box::new(IdentityStemmer),
        }
    }
}

impl FromStr for Language {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let lang = match s.to_ascii_lowercase().as_str() {
            "neutral" | "none" => Language::Neutral,
            "english" | "en" => Language::English,
            "danish" | "da" => Language::Danish,
            "dutch" | "nl" => Language::Dutch,
            "finnish" | "fi" => Language::Finnish,
            "french" | "fr" => Language::French,
            "german" | "de" => Language::German,
            "hungarian" | "hu" => Language::Hungarian,
            "italian" | "it" => Language::Italian,
            "norwegian" | "no" => Language::Norwegian,
            "portuguese" | "pt" => Language::Portuguese,
            "romanian" | "ro" => Language::Romanian,
            "russian" | "ru" => Language::Russian,
            "spanish" | "es" => Language::Spanish,
            "swedish" | "sv" => Language::Swedish,
            "turkish" | "tr" => Language::Turkish,
            other => return Err(EngineError::invalid(format!("unsupported language {other:?}"))),
        };
        Ok(lang)
    }
}

/// Reduces an already lowercased word to its stem.
pub trait Stemmer: Send + Sync {
    fn stem<'a>(&self, word: &'a str) -> Cow<'a, str>;
}

pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem<'a>(&self, word: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(word)
    }
}

pub struct SnowballStemmer(rust_stemmers::Stemmer);

impl SnowballStemmer {
    pub fn new(algorithm: Algorithm) -> Self {
        Self(rust_stemmers::Stemmer::create(algorithm))
    }
}

impl Stemmer for SnowballStemmer {
    fn stem<'a>(&self, word: &'a str) -> Cow<'a, str> {
        self.0.stem(word)
    }
}

/// Porter (1980) stemmer. Words that are not plain ASCII lowercase, or are
/// two letters or shorter, pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PorterStemmer;

impl Stemmer for PorterStemmer {
    fn stem<'a>(&self, word: &'a str) -> Cow<'a, str> {
        if word.len() <= 2 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
            return Cow::Borrowed(word);
        }
        let mut w = Word::new(word);
        w.step1ab();
        w.step1c();
        w.step2();
        w.step3();
        w.step4();
        w.step5();
        if w.b == word.as_bytes() {
            Cow::Borrowed(word)
        } else {
            Cow::Owned(w.into_string())
        }
    }
}

impl PorterStemmer {
    /// Runs only step 1 (plurals, -ed/-ing, terminal y). Useful for
    /// inspecting the first rule table in isolation.
    pub fn step1(&self, word: &str) -> String {
        if word.len() <= 2 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
            return word.to_string();
        }
        let mut w = Word::new(word);
        w.step1ab();
        w.step1c();
        w.into_string()
    }
}

const STEP2: &[(&str, &str)] = &[
    ("ational", "ate"), ("tional", "tion"), ("enci", "ence"), ("anci", "ance"),
    ("izer", "ize"), ("bli", "ble"), ("alli", "al"), ("entli", "ent"), ("eli", "e"),
    ("ousli", "ous"), ("ization", "ize"), ("ation", "ate"), ("ator", "ate"),
    ("alism", "al"), ("iveness", "ive"), ("fulness", "ful"), ("ousness", "ous"),
    ("aliti", "al"), ("iviti", "ive"), ("biliti", "ble"), ("logi", "log"),
];

const STEP3: &[(&str, &str)] = &[
    ("icate", "ic"), ("ative", ""), ("alize", "al"), ("iciti", "ic"),
    ("ical", "ic"), ("ful", ""), ("ness", ""),
];

const STEP4: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent",
    "ion", "ou", "ism", "ate", "iti", "ous", "ive", "ize",
];

/// Working buffer. `j` is the stem length set by the last successful `ends`.
struct Word {
    b: Vec<u8>,
    j: usize,
}

impl Word {
    fn new(word: &str) -> Self {
        Self { b: word.as_bytes().to_vec(), j: 0 }
    }

    fn into_string(self) -> String {
        String::from_utf8(self.b).unwrap_or_default()
    }

    fn cons(&self, i: usize) -> bool {
        match self.b[i] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.cons(i - 1),
            _ => true,
        }
    }

    /// Number of VC sequences in `b[..len]`.
    fn measure(&self, len: usize) -> usize {
        let mut n = 0;
        let mut i = 0;
        while i < len && self.cons(i) {
            i += 1;
        }
        loop {
            while i < len && !self.cons(i) {
                i += 1;
            }
            if i >= len {
                return n;
            }
            while i < len && self.cons(i) {
                i += 1;
            }
            n += 1;
        }
    }

    fn m(&self) -> usize {
        self.measure(self.j)
    }

    fn vowel_in_stem(&self) -> bool {
        (0..self.j).any(|i| !self.cons(i))
    }

    fn double_consonant(&self, i: usize) -> bool {
        i >= 1 && self.b[i] == self.b[i - 1] && self.cons(i)
    }

    /// consonant-vowel-consonant ending at `i`, last not w, x or y.
    fn cvc(&self, i: usize) -> bool {
        if i < 2 || !self.cons(i) || self.cons(i - 1) || !self.cons(i - 2) {
            return false;
        }
        !matches!(self.b[i], b'w' | b'x' | b'y')
    }

    fn last(&self) -> usize {
        self.b.len() - 1
    }

    fn ends(&mut self, s: &str) -> bool {
        if s.len() > self.b.len() || !self.b.ends_with(s.as_bytes()) {
            return false;
        }
        self.j = self.b.len() - s.len();
        true
    }

    fn set_to(&mut self, s: &str) {
        self.b.truncate(self.j);
        self.b.extend_from_slice(s.as_bytes());
    }

    fn replace_if_measured(&mut self, s: &str) {
        if self.m() > 0 {
            self.set_to(s);
        }
    }

    fn step1ab(&mut self) {
        if self.b.ends_with(b"s") {
            if self.ends("sses") {
                self.set_to("ss");
            } else if self.ends("ies") {
                self.set_to("i");
            } else if self.b.len() >= 2 && self.b[self.b.len() - 2] != b's' {
                self.b.pop();
            }
        }
        if self.ends("eed") {
            if self.m() > 0 {
                self.b.pop();
            }
        } else if (self.ends("ed") || self.ends("ing")) && self.vowel_in_stem() {
            self.b.truncate(self.j);
            self.j = self.b.len();
            if self.ends("at") {
                self.set_to("ate");
            } else if self.ends("bl") {
                self.set_to("ble");
            } else if self.ends("iz") {
                self.set_to("ize");
            } else if self.double_consonant(self.last()) {
                if !matches!(self.b[self.last()], b'l' | b's' | b'z') {
                    self.b.pop();
                }
            } else if self.measure(self.b.len()) == 1 && self.cvc(self.last()) {
                self.j = self.b.len();
                self.set_to("e");
            }
        }
    }

    fn step1c(&mut self) {
        if self.ends("y") && self.vowel_in_stem() {
            let last = self.last();
            self.b[last] = b'i';
        }
    }

    fn step2(&mut self) {
        self.replace_from(STEP2);
    }

    fn step3(&mut self) {
        self.replace_from(STEP3);
    }

    /// First matching suffix wins, replaced only when the stem has m() > 0.
    fn replace_from(&mut self, table: &[(&str, &str)]) {
        if let Some((from, to)) = table.iter().find(|(from, _)| self.b.ends_with(from.as_bytes())) {
            self.ends(from);
            self.replace_if_measured(to);
        }
    }

    fn step4(&mut self) {
        let Some(suffix) = STEP4.iter().find(|s| self.b.ends_with(s.as_bytes())) else {
            return;
        };
        self.ends(suffix);
        if *suffix == "ion" && (self.j == 0 || !matches!(self.b[self.j - 1], b's' | b't')) {
            return;
        }
        if self.m() > 1 {
            self.b.truncate(self.j);
        }
    }

    fn step5(&mut self) {
        let len = self.b.len();
        if self.b[len - 1] == b'e' {
            let a = self.measure(len);
            if a > 1 || (a == 1 && !self.cvc(len.saturating_sub(2))) {
                self.b.pop();
            }
        }
        // the trailing e may be gone, so measure what is left
        let last = self.last();
        if self.b[last] == b'l' && self.double_consonant(last) && self.measure(self.b.len()) > 1 {
            self.b.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stem(word: &str) -> String {
        PorterStemmer.stem(word).into_owned()
    }

    #[test]
    fn step1_rule_table() {
        let p = PorterStemmer;
        for (word, expected) in [
            ("caresses", "caress"), ("ponies", "poni"), ("ties", "ti"), ("caress", "caress"),
            ("cats", "cat"), ("feed", "feed"), ("agreed", "agree"), ("plastered", "plaster"),
            ("bled", "bled"), ("motoring", "motor"), ("sing", "sing"), ("conflated", "conflate"),
            ("troubled", "trouble"), ("sized", "size"), ("hopping", "hop"), ("tanned", "tan"),
            ("falling", "fall"), ("hissing", "hiss"), ("fizzed", "fizz"), ("failing", "fail"),
            ("filing", "file"), ("happy", "happi"), ("sky", "sky"), ("matting", "mat"),
        ] {
            assert_eq!(p.step1(word), expected, "step1({word})");
        }
    }

    #[test]
    fn full_stems() {
        for (word, expected) in [
            ("caresses", "caress"), ("matting", "mat"), ("agreed", "agre"),
            ("relational", "relat"), ("conditional", "condit"), ("generalization", "gener"),
            ("hopefulness", "hope"), ("electrical", "electr"), ("adoption", "adopt"),
            ("controlling", "control"), ("roll", "roll"), ("probate", "probat"),
            ("running", "run"), ("cats", "cat"), ("sat", "sat"), ("aaa", "aaa"),
            ("gazelle", "gazel"), ("belle", "bell"), ("tulle", "tull"), ("grille", "grill"),
            ("braille", "braill"),
        ] {
            assert_eq!(stem(word), expected, "stem({word})");
        }
    }

    #[test]
    fn short_and_non_ascii_words_pass_through() {
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("café"), "café");
        assert_eq!(stem("don't"), "don't");
    }

    #[test]
    fn stemming_is_deterministic() {
        for w in ["generalizations", "oscillators", "agreement"] {
            assert_eq!(stem(w), stem(w));
        }
    }

    #[test]
    fn languages_pick_stemmers() {
        assert_eq!(Language::English.stemmer().stem("matting"), "mat");
        assert_eq!(Language::Neutral.stemmer().stem("matting"), "matting");
        assert_ne!(Language::German.stemmer().stem("katzen"), "katzen");
        assert_eq!("fr".parse::<Language>().unwrap(), Language::French);
        assert!("klingon".parse::<Language>().is_err());
    }
}
