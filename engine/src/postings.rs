//! The inverted file: term -> postings -> per-document position sets.

use crate::term::Term;
use crate::{DocId, Position};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap};

/// Occurrence positions of one term inside one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVector {
    positions: BTreeSet<Position>,
}

impl TermVector {
    pub fn new(position: Position) -> Self {
        let mut v = Self::default();
        v.push(position);
        v
    }

    pub fn push(&mut self, position: Position) {
        self.positions.insert(position);
    }

    pub fn merge(&mut self, other: TermVector) {
        self.positions.extend(other.positions);
    }

    /// Term frequency within the document.
    pub fn frequency(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions.iter().copied()
    }
}

impl FromIterator<Position> for TermVector {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self { positions: iter.into_iter().collect() }
    }
}

/// Documents containing one term, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postings {
    docs: BTreeMap<DocId, TermVector>,
}

impl Postings {
    pub fn new(doc: DocId, position: Position) -> Self {
        let mut p = Self::default();
        p.insert(doc, position);
        p
    }

    /// Records one occurrence; an existing document gets the position appended.
    pub fn insert(&mut self, doc: DocId, position: Position) {
        match self.docs.entry(doc) {
            btree_map::Entry::Occupied(mut e) => e.get_mut().push(position),
            btree_map::Entry::Vacant(e) => {
                e.insert(TermVector::new(position));
            }
        }
    }

    /// Merges a whole vector; existing position lists are unioned, never replaced.
    pub fn merge_vector(&mut self, doc: DocId, vector: TermVector) {
        debug_assert!(!vector.is_empty(), "empty term vector for doc {doc}");
        self.docs.entry(doc).or_default().merge(vector);
    }

    pub fn get(&self, doc: DocId) -> Option<&TermVector> {
        self.docs.get(&doc)
    }

    pub fn contains(&self, doc: DocId) -> bool {
        self.docs.contains_key(&doc)
    }

    pub fn remove(&mut self, doc: DocId) -> Option<TermVector> {
        self.docs.remove(&doc)
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &TermVector)> + '_ {
        self.docs.iter().map(|(d, v)| (*d, v))
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs.keys().copied()
    }
}

/// Per-document analysis result, built without touching the shared index.
pub type DocumentTerms = HashMap<Term, TermVector>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub terms: usize,
    pub postings: usize,
    pub positions: usize,
}

const DEFAULT_SHARDS: usize = 16;

type Shard = RwLock<HashMap<Term, Postings>>;

/// Term -> postings map, sharded by term fingerprint so concurrent writers
/// only contend when they touch terms in the same shard.
///
/// Invariant: every stored `Postings` is non-empty and every `TermVector`
/// inside it holds at least one position.
pub struct InvertedFile {
    shards: Vec<Shard>,
}

impl Default for InvertedFile {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl std::fmt::Debug for InvertedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvertedFile")
            .field("shards", &self.shards.len())
            .field("terms", &self.term_count())
            .finish()
    }
}

impl InvertedFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(n: usize) -> Self {
        let n = n.max(1);
        Self { shards: (0..n).map(|_| RwLock::new(HashMap::new())).collect() }
    }

    fn shard_for(&self, term: &str) -> &Shard {
        let idx = crc32fast::hash(term.as_bytes()) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Records one occurrence of `term` in `doc` at `position`:
    /// appended to the existing vector, seeded as a new vector under an
    /// existing term, or seeded as a brand-new postings list.
    pub fn add_occurrence(&self, term: Term, doc: DocId, position: Position) {
        let mut shard = self.shard_for(term.as_str()).write();
        match shard.get_mut(&term) {
            Some(postings) => postings.insert(doc, position),
            None => {
                shard.insert(term, Postings::new(doc, position));
            }
        }
    }

    /// Folds one document's terms in. Taking each shard lock once per term
    /// keeps the critical section short.
    pub fn merge_document(&self, doc: DocId, terms: DocumentTerms) {
        for (term, vector) in terms {
            if vector.is_empty() {
                continue;
            }
            let mut shard = self.shard_for(term.as_str()).write();
            shard.entry(term).or_default().merge_vector(doc, vector);
        }
    }

    /// Merges another inverted file into this one.
    pub fn merge(&self, other: InvertedFile) {
        for shard in other.shards {
            for (term, postings) in shard.into_inner() {
                let mut target = self.shard_for(term.as_str()).write();
                let entry = target.entry(term).or_default();
                for (doc, vector) in postings.docs {
                    entry.merge_vector(doc, vector);
                }
            }
        }
    }

    /// Postings for `term`, cloned out of the shard.
    pub fn get(&self, term: &str) -> Option<Postings> {
        let shard = self.shard_for(term).read();
        let postings = shard.get(term)?;
        debug_assert!(!postings.is_empty(), "term {term:?} has empty postings");
        Some(postings.clone())
    }

    pub fn contains(&self, term: &str) -> bool {
        self.shard_for(term).read().contains_key(term)
    }

    pub fn term_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.term_count() == 0
    }

    /// Drops `doc` everywhere. Terms left without documents are removed.
    /// Returns how many terms referenced the document.
    pub fn remove_document(&self, doc: DocId) -> usize {
        let mut touched = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            shard.retain(|_, postings| {
                if postings.remove(doc).is_some() {
                    touched += 1;
                }
                !postings.is_empty()
            });
        }
        touched
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        for shard in &self.shards {
            for postings in shard.read().values() {
                stats.terms += 1;
                stats.postings += postings.document_frequency();
                stats.positions += postings.iter().map(|(_, v)| v.frequency()).sum::<usize>();
            }
        }
        stats
    }

    /// Ordered copy of the whole map, for persistence and comparison.
    pub fn to_map(&self) -> BTreeMap<Term, Postings> {
        let mut out = BTreeMap::new();
        for shard in &self.shards {
            for (term, postings) in shard.read().iter() {
                out.insert(term.clone(), postings.clone());
            }
        }
        out
    }

    pub fn from_map(map: BTreeMap<Term, Postings>) -> Self {
        let index = Self::default();
        for (term, postings) in map {
            if postings.is_empty() {
                continue;
            }
            index.shard_for(term.as_str()).write().insert(term, postings);
        }
        index
    }
}

impl PartialEq for InvertedFile {
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(index: &InvertedFile, term: &str, doc: DocId) -> Vec<Position> {
        index.get(term).unwrap().get(doc).unwrap().positions().collect()
    }

    #[test]
    fn occurrence_paths() {
        let index = InvertedFile::new();
        index.add_occurrence(Term::new("cat"), 1, 0);
        index.add_occurrence(Term::new("cat"), 1, 4);
        index.add_occurrence(Term::new("cat"), 2, 3);
        assert_eq!(positions(&index, "cat", 1), vec![0, 4]);
        assert_eq!(positions(&index, "cat", 2), vec![3]);
        assert_eq!(index.get("cat").unwrap().document_frequency(), 2);
        assert!(index.get("dog").is_none());
    }

    #[test]
    fn postings_keep_doc_order_and_merge() {
        let mut p = Postings::new(9, 1);
        p.insert(3, 0);
        p.merge_vector(9, [5, 2].into_iter().collect());
        assert_eq!(p.doc_ids().collect::<Vec<_>>(), vec![3, 9]);
        assert_eq!(p.get(9).unwrap().positions().collect::<Vec<_>>(), vec![1, 2, 5]);
    }

    #[test]
    fn merge_document_unions_positions() {
        let index = InvertedFile::with_shards(2);
        let mut terms = DocumentTerms::new();
        terms.insert(Term::new("a"), [0, 2].into_iter().collect());
        index.merge_document(7, terms.clone());
        terms.insert(Term::new("a"), [5].into_iter().collect());
        index.merge_document(7, terms);
        assert_eq!(positions(&index, "a", 7), vec![0, 2, 5]);
    }

    #[test]
    fn remove_document_drops_empty_terms() {
        let index = InvertedFile::new();
        index.add_occurrence(Term::new("shared"), 1, 0);
        index.add_occurrence(Term::new("shared"), 2, 0);
        index.add_occurrence(Term::new("only"), 1, 1);
        assert_eq!(index.remove_document(1), 2);
        assert!(!index.contains("only"));
        assert_eq!(index.get("shared").unwrap().doc_ids().collect::<Vec<_>>(), vec![2]);
        assert_eq!(index.remove_document(42), 0);
    }

    #[test]
    fn stats_and_map_round_trip() {
        let index = InvertedFile::new();
        index.add_occurrence(Term::new("x"), 1, 0);
        index.add_occurrence(Term::new("x"), 1, 1);
        index.add_occurrence(Term::new("y"), 2, 0);
        assert_eq!(index.stats(), IndexStats { terms: 2, postings: 2, positions: 3 });
        let copy = InvertedFile::from_map(index.to_map());
        assert_eq!(copy, index);
    }

    #[test]
    fn merge_combines_files() {
        let a = InvertedFile::new();
        a.add_occurrence(Term::new("t"), 1, 0);
        let b = InvertedFile::with_shards(3);
        b.add_occurrence(Term::new("t"), 2, 0);
        b.add_occurrence(Term::new("u"), 2, 1);
        a.merge(b);
        assert_eq!(a.term_count(), 2);
        assert_eq!(a.get("t").unwrap().document_frequency(), 2);
    }
}
