//! Local full-text search: tokenization, stemming, a positional inverted
//! index, snapshot persistence and TF-IDF ranked retrieval.

pub mod builder;
pub mod config;
pub mod corpus;
pub mod error;
pub mod persist;
pub mod postings;
pub mod repository;
pub mod search;
pub mod stemmer;
pub mod term;
pub mod tokenizer;
pub mod weighting;

pub type DocId = u64;
/// Ordinal of a token within its document's token stream.
pub type Position = u64;

pub use builder::{BuildReport, IndexBuilder, Progress};
pub use config::{CachingMode, Config, FetchPolicy};
pub use corpus::Corpus;
pub use error::{EngineError, Result};
pub use persist::{IndexStore, MetaFile, Snapshot};
pub use postings::{IndexStats, InvertedFile, Postings, TermVector};
pub use repository::{Document, DocumentSource, FsSource, MemorySource, Repository};
pub use search::{DocResult, Searcher, SortOrder};
pub use stemmer::Language;
pub use term::{Analyzer, Normalizer, Term};
pub use tokenizer::{Token, TokenType, Tokenizer, TokenizerKind};
pub use weighting::IdfMode;
