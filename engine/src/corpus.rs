use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Document id <-> path registry.
///
/// Ids are handed out in first-seen order and never reused within one
/// snapshot, even after a document is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    paths: BTreeMap<DocId, String>,
    ids: HashMap<String, DocId>,
    next_id: DocId,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `path`, assigning the next ordinal if the path is new.
    pub fn assign(&mut self, path: impl Into<String>) -> DocId {
        let path = path.into();
        if let Some(&id) = self.ids.get(&path) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(path.clone(), id);
        self.paths.insert(id, path);
        id
    }

    pub fn id_of(&self, path: &str) -> Option<DocId> {
        self.ids.get(path).copied()
    }

    pub fn path_of(&self, id: DocId) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.ids.contains_key(path)
    }

    pub fn remove(&mut self, id: DocId) -> Option<String> {
        let path = self.paths.remove(&id)?;
        self.ids.remove(&path);
        Some(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &str)> + '_ {
        self.paths.iter().map(|(id, p)| (*id, p.as_str()))
    }

    /// Restriction of the corpus to `ids`, skipping ids that are not present.
    pub fn subset(&self, ids: impl IntoIterator<Item = DocId>) -> BTreeMap<DocId, String> {
        ids.into_iter()
            .filter_map(|id| self.paths.get(&id).map(|p| (id, p.clone())))
            .collect()
    }
}
