//! Read path: parse -> retrieve -> score -> materialize -> rank.

use crate::corpus::Corpus;
use crate::error::{EngineError, Result};
use crate::postings::{DocumentTerms, InvertedFile, Postings};
use crate::term::{Analyzer, Term};
use crate::weighting::{tf, IdfMode};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Highest score first.
    #[default]
    Relevance,
    /// Most recently written first.
    Modified,
    /// Most recently created first.
    Date,
    /// Path, lexicographic ascending.
    Name,
    /// Largest first.
    Size,
}

impl FromStr for SortOrder {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" | "score" => Ok(SortOrder::Relevance),
            "modified" => Ok(SortOrder::Modified),
            "date" | "created" => Ok(SortOrder::Date),
            "name" => Ok(SortOrder::Name),
            "size" => Ok(SortOrder::Size),
            other => Err(EngineError::invalid(format!("unknown sort order {other:?}"))),
        }
    }
}

/// The slice of the index a query touches.
#[derive(Debug, Default)]
pub struct SubIndex {
    pub postings: HashMap<Term, Postings>,
    pub corpus: BTreeMap<DocId, String>,
}

impl SubIndex {
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Accumulated score per document.
pub type HitList = HashMap<DocId, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub len: u64,
}

impl FileMeta {
    pub fn read(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self { modified: meta.modified().ok(), created: meta.created().ok(), len: meta.len() })
    }
}

/// A resolved, scored hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocResult {
    pub doc_id: DocId,
    pub path: String,
    pub score: f64,
    pub meta: Option<FileMeta>,
}

impl DocResult {
    /// Ordering under `sort`. Missing file metadata sorts last; remaining ties
    /// fall back to score, then path, so the order is total and repeatable.
    pub fn compare(&self, other: &Self, sort: SortOrder) -> Ordering {
        let by_score = || other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal);
        let primary = match sort {
            SortOrder::Relevance => by_score(),
            SortOrder::Name => self.path.cmp(&other.path),
            SortOrder::Modified => desc_some_first(self.meta.and_then(|m| m.modified), other.meta.and_then(|m| m.modified)),
            SortOrder::Date => desc_some_first(self.meta.and_then(|m| m.created), other.meta.and_then(|m| m.created)),
            SortOrder::Size => desc_some_first(self.meta.map(|m| m.len), other.meta.map(|m| m.len)),
        };
        primary
            .then_with(by_score)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

fn desc_some_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Evaluates free-text queries against an index and its corpus.
///
/// Scoring is a disjunction: a document needs at least one query term to
/// appear, and each matching term adds `tf * idf` to its score.
pub struct Searcher<'a> {
    index: &'a InvertedFile,
    corpus: &'a Corpus,
    analyzer: &'a Analyzer,
    idf: IdfMode,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Searcher<'a> {
    pub fn new(index: &'a InvertedFile, corpus: &'a Corpus, analyzer: &'a Analyzer) -> Self {
        Self { index, corpus, analyzer, idf: IdfMode::default(), cancel: None }
    }

    pub fn with_idf(mut self, idf: IdfMode) -> Self {
        self.idf = idf;
        self
    }

    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(AtomicOrdering::Relaxed) => Err(EngineError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Full pipeline. `limit` truncates after ranking.
    pub fn search(&self, query: &str, sort: SortOrder, limit: Option<usize>) -> Result<Vec<DocResult>> {
        let terms = self.parse(query);
        let sub = self.retrieve(&terms)?;
        let hits = self.score(&sub)?;
        let results = self.materialize(&hits, &sub, sort);
        let mut ranked = rank(results, sort);
        if let Some(k) = limit {
            ranked.truncate(k);
        }
        tracing::debug!(query, terms = terms.len(), hits = hits.len(), returned = ranked.len(), "query evaluated");
        Ok(ranked)
    }

    /// Analyzes the query exactly like a document.
    pub fn parse(&self, query: &str) -> DocumentTerms {
        let mut terms = DocumentTerms::new();
        for (position, term) in self.analyzer.analyze(query) {
            terms.entry(term).or_default().push(position);
        }
        terms
    }

    /// Copies the postings of every known query term; unknown terms contribute nothing.
    pub fn retrieve(&self, terms: &DocumentTerms) -> Result<SubIndex> {
        let mut sub = SubIndex::default();
        for term in terms.keys() {
            self.cancelled()?;
            let Some(postings) = self.index.get(term.as_str()) else {
                continue;
            };
            debug_assert!(!postings.is_empty(), "empty postings for {term}");
            for doc in postings.doc_ids() {
                if let Some(path) = self.corpus.path_of(doc) {
                    sub.corpus.entry(doc).or_insert_with(|| path.to_string());
                }
            }
            sub.postings.insert(term.clone(), postings);
        }
        Ok(sub)
    }

    /// Sums `tf * idf` per document over the sub-index. `N` is the size of the
    /// whole corpus, not of the sub-corpus.
    pub fn score(&self, sub: &SubIndex) -> Result<HitList> {
        let n = self.corpus.len();
        let mut hits = HitList::new();
        for postings in sub.postings.values() {
            self.cancelled()?;
            let idf = self.idf.idf(n, postings.document_frequency());
            for (doc, vector) in postings.iter() {
                debug_assert!(!vector.is_empty(), "empty term vector for doc {doc}");
                *hits.entry(doc).or_insert(0.0) += tf(vector.frequency()) * idf;
            }
        }
        Ok(hits)
    }

    /// Resolves hits to paths. Ids missing from the sub-corpus were removed
    /// from the corpus and are dropped silently. File metadata is only read
    /// when the sort order needs it.
    pub fn materialize(&self, hits: &HitList, sub: &SubIndex, sort: SortOrder) -> Vec<DocResult> {
        hits.iter()
            .filter_map(|(&doc_id, &score)| {
                let path = sub.corpus.get(&doc_id)?;
                let meta = match sort {
                    SortOrder::Relevance | SortOrder::Name => None,
                    _ => FileMeta::read(Path::new(path)),
                };
                Some(DocResult { doc_id, path: path.clone(), score, meta })
            })
            .collect()
    }
}

pub fn rank(mut results: Vec<DocResult>, sort: SortOrder) -> Vec<DocResult> {
    results.sort_by(|a, b| a.compare(b, sort));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::config::Config;

    fn setup(docs: &[(&str, &str)]) -> (InvertedFile, Corpus, Analyzer) {
        let config = Config::default();
        let builder = IndexBuilder::new(&config);
        let index = InvertedFile::new();
        let mut corpus = Corpus::new();
        for (path, text) in docs {
            let id = corpus.assign(*path);
            builder.add_text(id, text, &index);
        }
        (index, corpus, config.analyzer())
    }

    #[test]
    fn scores_accumulate_across_terms() {
        let (index, corpus, analyzer) = setup(&[
            ("a", "rust search engine"),
            ("b", "rust rust compiler"),
            ("c", "garden tools"),
        ]);
        let searcher = Searcher::new(&index, &corpus, &analyzer).with_idf(IdfMode::Plain);
        let results = searcher.search("rust engine", SortOrder::Relevance, None).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);

        let idf_rust = (3.0f64 / 2.0).log10();
        let idf_engine = 3.0f64.log10();
        assert!((results[0].score - (idf_rust + idf_engine)).abs() < 1e-9);
        assert!((results[1].score - (1.0 + 2.0f64.log10()) * idf_rust).abs() < 1e-9);
    }

    #[test]
    fn unknown_terms_yield_nothing() {
        let (index, corpus, analyzer) = setup(&[("a", "hello world")]);
        let searcher = Searcher::new(&index, &corpus, &analyzer);
        assert!(searcher.search("zebra", SortOrder::Relevance, None).unwrap().is_empty());
        assert!(searcher.search("", SortOrder::Relevance, None).unwrap().is_empty());
        assert!(searcher.search(" ;; ", SortOrder::Name, None).unwrap().is_empty());
    }

    #[test]
    fn retrieve_bounds_sub_corpus() {
        let (index, corpus, analyzer) = setup(&[("a", "x y"), ("b", "y z"), ("c", "q")]);
        let searcher = Searcher::new(&index, &corpus, &analyzer);
        let sub = searcher.retrieve(&searcher.parse("x")).unwrap();
        assert_eq!(sub.corpus.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(sub.postings.len(), 1);
    }

    #[test]
    fn removed_documents_are_dropped() {
        let (index, mut corpus, analyzer) = setup(&[("a", "shared"), ("b", "shared")]);
        corpus.remove(0);
        let searcher = Searcher::new(&index, &corpus, &analyzer);
        let results = searcher.search("shared", SortOrder::Relevance, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "b");
    }

    #[test]
    fn name_sort_and_limit() {
        let (index, corpus, analyzer) = setup(&[("zeta", "word"), ("alpha", "word word"), ("mid", "word")]);
        let searcher = Searcher::new(&index, &corpus, &analyzer);
        let results = searcher.search("word", SortOrder::Name, Some(2)).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["alpha", "mid"]);
    }

    #[test]
    fn size_sort_puts_missing_metadata_last() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.txt");
        let small = dir.path().join("small.txt");
        std::fs::write(&big, "word ".repeat(50)).unwrap();
        std::fs::write(&small, "word").unwrap();
        let big = big.to_string_lossy().into_owned();
        let small = small.to_string_lossy().into_owned();
        let (index, corpus, analyzer) = setup(&[(small.as_str(), "word"), ("ghost", "word"), (big.as_str(), "word")]);
        let searcher = Searcher::new(&index, &corpus, &analyzer);
        let results = searcher.search("word", SortOrder::Size, None).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec![big.as_str(), small.as_str(), "ghost"]);
    }

    #[test]
    fn cancelled_query_reports_cancellation() {
        let (index, corpus, analyzer) = setup(&[("a", "word")]);
        let flag = AtomicBool::new(true);
        let searcher = Searcher::new(&index, &corpus, &analyzer).with_cancel(&flag);
        assert!(matches!(searcher.search("word", SortOrder::Relevance, None), Err(EngineError::Cancelled)));
    }

    #[test]
    fn parses_sort_names() {
        assert_eq!("Size".parse::<SortOrder>().unwrap(), SortOrder::Size);
        assert!("random".parse::<SortOrder>().is_err());
    }
}
