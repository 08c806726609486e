//! Document collections.
//!
//! A [`DocumentSource`] is the boundary to whatever extracts text (plain
//! files here; richer formats belong to other sources). [`Repository`]
//! pairs a source with the corpus and configuration it is indexed under.

use crate::config::Config;
use crate::corpus::Corpus;
use crate::error::{EngineError, Result};
use crate::DocId;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocId,
    pub path: String,
    pub text: String,
}

/// Supplies document paths and their text.
pub trait DocumentSource: Send + Sync {
    /// Every document currently available, in a stable order.
    fn enumerate(&self) -> Result<Vec<String>>;

    fn read_text(&self, path: &str) -> io::Result<String>;
}

/// Plain-text files under a directory, filtered by extension.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
    config: Config,
}

impl FsSource {
    pub fn new(root: impl AsRef<Path>, config: &Config) -> Self {
        Self { root: root.as_ref().to_path_buf(), config: config.clone() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for FsSource {
    fn enumerate(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Err(EngineError::invalid(format!("document root {:?} does not exist", self.root)));
        }
        let files = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.config.accepts(e.path()))
            .map(|e| e.path().to_string_lossy().into_owned())
            .collect();
        Ok(files)
    }

    fn read_text(&self, path: &str) -> io::Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// In-memory documents keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.docs.insert(name.into(), text.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.docs.remove(name)
    }
}

impl DocumentSource for MemorySource {
    fn enumerate(&self) -> Result<Vec<String>> {
        Ok(self.docs.keys().cloned().collect())
    }

    fn read_text(&self, path: &str) -> io::Result<String> {
        self.docs
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// A source together with the corpus and configuration it is indexed under.
#[derive(Debug)]
pub struct Repository<S> {
    source: S,
    corpus: Corpus,
    config: Config,
}

impl<S: DocumentSource> Repository<S> {
    pub fn new(source: S, config: Config) -> Self {
        Self::with_corpus(source, config, Corpus::new())
    }

    /// Resumes from a corpus loaded out of a snapshot.
    pub fn with_corpus(source: S, config: Config, corpus: Corpus) -> Self {
        Self { source, corpus, config }
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn source(&self) -> &S { &self.source }
    pub fn source_mut(&mut self) -> &mut S { &mut self.source }

    pub fn into_parts(self) -> (S, Corpus, Config) {
        (self.source, self.corpus, self.config)
    }

    /// Paths the source offers that the corpus has not seen yet.
    pub fn discover_new(&self) -> Result<Vec<String>> {
        let all = self.source.enumerate()?;
        Ok(all.into_iter().filter(|p| !self.corpus.contains_path(p)).collect())
    }

    /// Corpus entries the source no longer offers.
    pub fn vanished(&self) -> Result<Vec<DocId>> {
        let present: HashSet<String> = self.source.enumerate()?.into_iter().collect();
        Ok(self
            .corpus
            .iter()
            .filter(|(_, p)| !present.contains(*p))
            .map(|(id, _)| id)
            .collect())
    }

    pub fn register(&mut self, paths: impl IntoIterator<Item = String>) -> Vec<DocId> {
        paths.into_iter().map(|p| self.corpus.assign(p)).collect()
    }

    pub fn forget(&mut self, id: DocId) -> Option<String> {
        self.corpus.remove(id)
    }

    /// Reads a registered document, retrying as the fetch policy allows.
    /// Unknown ids and unreadable documents yield `None`.
    pub fn fetch(&self, id: DocId) -> Option<Document> {
        let path = self.corpus.path_of(id)?;
        let attempts = self.config.fetch_attempts();
        for attempt in 1..=attempts {
            match self.source.read_text(path) {
                Ok(text) => return Some(Document { id, path: path.to_string(), text }),
                Err(e) if attempt < attempts => {
                    tracing::debug!(doc_id = id, path, attempt, error = %e, "retrying document read");
                }
                Err(e) => {
                    tracing::warn!(doc_id = id, path, error = %e, "skipping unreadable document");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    #[test]
    fn fs_source_filters_formats() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("sub/b.md"), "beta").unwrap();
        fs::write(dir.path().join("c.pdf"), "%PDF").unwrap();
        let source = FsSource::new(dir.path(), &Config::default());
        let found = source.enumerate().unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| !p.ends_with(".pdf")));
        assert_eq!(source.read_text(&found[0]).unwrap(), "alpha");
    }

    #[test]
    fn fs_source_missing_root_is_invalid() {
        let source = FsSource::new("/definitely/not/here", &Config::default());
        assert!(matches!(source.enumerate(), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn discovery_and_vanishing() {
        let source = MemorySource::new().with("a", "x").with("b", "y");
        let mut repo = Repository::new(source, Config::default());
        let new = repo.discover_new().unwrap();
        assert_eq!(repo.register(new), vec![0, 1]);
        assert!(repo.discover_new().unwrap().is_empty());

        repo.source_mut().remove("a");
        repo.source_mut().insert("c", "z");
        assert_eq!(repo.vanished().unwrap(), vec![0]);
        assert_eq!(repo.discover_new().unwrap(), vec!["c".to_string()]);
    }

    struct Flaky {
        failures_left: AtomicU32,
    }

    impl DocumentSource for Flaky {
        fn enumerate(&self) -> Result<Vec<String>> {
            Ok(vec!["f".into()])
        }

        fn read_text(&self, _path: &str) -> io::Result<String> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::Other, "busy"));
            }
            Ok("text".into())
        }
    }

    #[test]
    fn fetch_policy_controls_retries() {
        let retry = Config::default().with_fetch_policy(FetchPolicy::Retry, 2);
        let mut repo = Repository::new(Flaky { failures_left: AtomicU32::new(2) }, retry);
        let ids = repo.register(vec!["f".to_string()]);
        assert_eq!(repo.fetch(ids[0]).unwrap().text, "text");

        let skip = Config::default().with_fetch_policy(FetchPolicy::Skip, 2);
        let mut repo = Repository::new(Flaky { failures_left: AtomicU32::new(1) }, skip);
        let ids = repo.register(vec!["f".to_string()]);
        assert!(repo.fetch(ids[0]).is_none());
        assert!(repo.fetch(99).is_none());
    }
}
