//! Write path: documents -> tokens -> terms -> inverted file.

use crate::config::{CachingMode, Config};
use crate::error::{EngineError, Result};
use crate::persist::IndexStore;
use crate::postings::{DocumentTerms, InvertedFile};
use crate::repository::{Document, DocumentSource, Repository};
use crate::term::{Analyzer, Normalizer};
use crate::tokenizer::Token;
use crate::{DocId, Position};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Indexes one token stream: every token is normalized and recorded under
/// `doc` at its zero-based ordinal in the stream. Returns the number of
/// positions recorded.
pub fn add_tokens<I>(doc: DocId, tokens: I, index: &InvertedFile, normalizer: &Normalizer) -> u64
where
    I: IntoIterator<Item = Token>,
{
    let mut position: Position = 0;
    for token in tokens {
        index.add_occurrence(normalizer.normalize(&token), doc, position);
        position += 1;
    }
    position
}

/// Collects one document's terms without touching a shared index.
pub fn analyze_document(analyzer: &Analyzer, text: &str) -> DocumentTerms {
    let mut terms = DocumentTerms::new();
    for (position, term) in analyzer.analyze(text) {
        terms.entry(term).or_default().push(position);
    }
    terms
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub removed: usize,
    pub positions: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub doc: DocId,
}

/// Drives indexing for one configuration.
///
/// Documents are analyzed in parallel; each finished document is folded into
/// the shared inverted file under its shard locks. Cancellation and progress
/// are checked once per document.
pub struct IndexBuilder<'a> {
    analyzer: Analyzer,
    identifier: String,
    caching: CachingMode,
    cancel: Option<&'a AtomicBool>,
    progress: Option<&'a (dyn Fn(Progress) + Sync)>,
    store: Option<&'a IndexStore>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &Config) -> Self {
        Self {
            analyzer: config.analyzer(),
            identifier: config.identifier.clone(),
            caching: config.caching,
            cancel: None,
            progress: None,
            store: None,
        }
    }

    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, callback: &'a (dyn Fn(Progress) + Sync)) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Store used for cached texts when the configuration asks for them.
    pub fn with_store(mut self, store: &'a IndexStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn add_text(&self, doc: DocId, text: &str, index: &InvertedFile) -> u64 {
        add_tokens(doc, self.analyzer.tokenizer().scan(text), index, self.analyzer.normalizer())
    }

    pub fn add_document(&self, doc: &Document, index: &InvertedFile) -> Result<u64> {
        self.cache_text(doc)?;
        Ok(self.add_text(doc.id, &doc.text, index))
    }

    /// Indexes every document of the repository not yet in its corpus.
    /// A repository with no documents at all is rejected.
    pub fn add_repository<S: DocumentSource>(
        &self,
        repo: &mut Repository<S>,
        index: &InvertedFile,
    ) -> Result<BuildReport> {
        let new = repo.discover_new()?;
        if new.is_empty() && repo.corpus().is_empty() {
            return Err(EngineError::invalid("repository contains no documents"));
        }
        let ids = repo.register(new);
        self.index_ids(repo, &ids, index)
    }

    /// Incremental pass: drops documents that disappeared from the source,
    /// then indexes the ones that appeared since the last run.
    pub fn update<S: DocumentSource>(
        &self,
        repo: &mut Repository<S>,
        index: &InvertedFile,
    ) -> Result<BuildReport> {
        let gone = repo.vanished()?;
        for &id in &gone {
            index.remove_document(id);
            repo.forget(id);
            if let Some(store) = self.store {
                store.drop_cached_text(&self.identifier, id);
            }
        }
        let new = repo.discover_new()?;
        let ids = repo.register(new);
        let mut report = self.index_ids(repo, &ids, index)?;
        report.removed = gone.len();
        tracing::info!(removed = report.removed, indexed = report.indexed, "incremental update finished");
        Ok(report)
    }

    fn index_ids<S: DocumentSource>(
        &self,
        repo: &mut Repository<S>,
        ids: &[DocId],
        index: &InvertedFile,
    ) -> Result<BuildReport> {
        let total = ids.len();
        let done = AtomicUsize::new(0);
        let shared: &Repository<S> = repo;
        let outcomes: Vec<Result<Option<u64>>> = ids
            .par_iter()
            .map(|&id| {
                if self.cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
                    return Err(EngineError::Cancelled);
                }
                let Some(doc) = shared.fetch(id) else {
                    return Ok(None);
                };
                self.cache_text(&doc)?;
                let terms = analyze_document(&self.analyzer, &doc.text);
                let positions: u64 = terms.values().map(|v| v.frequency() as u64).sum();
                index.merge_document(doc.id, terms);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(doc_id = doc.id, path = %doc.path, positions, "indexed document");
                if let Some(progress) = self.progress {
                    progress(Progress { done: finished, total, doc: doc.id });
                }
                Ok(Some(positions))
            })
            .collect();

        let mut report = BuildReport::default();
        let mut skipped = Vec::new();
        let mut unindexed = Vec::new();
        let mut failure = None;
        for (&id, outcome) in ids.iter().zip(outcomes) {
            match outcome {
                Ok(Some(positions)) => {
                    report.indexed += 1;
                    report.positions += positions;
                }
                Ok(None) => skipped.push(id),
                Err(e) => {
                    unindexed.push(id);
                    failure.get_or_insert(e);
                }
            }
        }
        // Anything not merged leaves the corpus so the next update retries it.
        for &id in skipped.iter().chain(&unindexed) {
            repo.forget(id);
        }
        if let Some(err) = failure {
            tracing::warn!(indexed = report.indexed, dropped = skipped.len() + unindexed.len(), error = %err, "indexing pass aborted");
            return Err(err);
        }
        report.skipped = skipped.len();
        tracing::info!(indexed = report.indexed, skipped = report.skipped, positions = report.positions, "indexing pass finished");
        Ok(report)
    }

    fn cache_text(&self, doc: &Document) -> Result<()> {
        match (self.caching, self.store) {
            (CachingMode::Texts, Some(store)) => store.cache_text(&self.identifier, doc.id, &doc.text),
            _ => Ok(()),
        }
    }
}
