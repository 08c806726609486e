//! Snapshot persistence.
//!
//! Each identifier owns `{id}.snapshot` (bincode payload followed by a
//! `[magic][crc32 BE]` footer, written to a temp file and renamed into
//! place), `{id}.meta.json` for inspection, and optionally
//! `texts/{id}/{doc_id}.txt` when text caching is enabled.

use crate::config::{validate_identifier, Config};
use crate::corpus::Corpus;
use crate::error::{EngineError, Result};
use crate::postings::{InvertedFile, Postings};
use crate::term::Term;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

const SNAPSHOT_MAGIC: &[u8; 4] = b"DSX1";
const FOOTER_LEN: usize = 8;
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    version: u32,
    config: Config,
    corpus: Corpus,
    terms: BTreeMap<Term, Postings>,
}

/// Everything needed to answer queries: configuration, corpus and index.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub config: Config,
    pub corpus: Corpus,
    pub index: InvertedFile,
}

impl Snapshot {
    pub fn new(config: Config, corpus: Corpus, index: InvertedFile) -> Self {
        Self { config, corpus, index }
    }
}

/// Directory holding snapshots for any number of identifiers.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path { &self.root }
    fn snapshot_path(&self, id: &str) -> PathBuf { self.root.join(format!("{id}.snapshot")) }
    fn meta_path(&self, id: &str) -> PathBuf { self.root.join(format!("{id}.meta.json")) }
    fn texts_dir(&self, id: &str) -> PathBuf { self.root.join("texts").join(id) }
    fn text_path(&self, id: &str, doc: DocId) -> PathBuf { self.texts_dir(id).join(format!("{doc}.txt")) }

    pub fn exists(&self, id: &str) -> bool {
        self.snapshot_path(id).is_file()
    }

    /// Writes the snapshot under `snapshot.config.identifier`. The file is
    /// synced before it is renamed into place, so a later `load` sees it whole.
    pub fn save(&self, snapshot: &Snapshot) -> Result<MetaFile> {
        let id = snapshot.config.identifier.as_str();
        validate_identifier(id)?;
        fs::create_dir_all(&self.root).map_err(|e| EngineError::io(&self.root, e))?;

        let data = SnapshotData {
            version: FORMAT_VERSION,
            config: snapshot.config.clone(),
            corpus: snapshot.corpus.clone(),
            terms: snapshot.index.to_map(),
        };
        let num_terms = data.terms.len();
        let payload = bincode::serialize(&data)
            .map_err(|e| EngineError::io(self.snapshot_path(id), std::io::Error::other(e.to_string())))?;
        let crc = crc32fast::hash(&payload);

        let path = self.snapshot_path(id);
        let tmp = self.root.join(format!("{id}.snapshot.tmp"));
        let write = || -> std::io::Result<()> {
            let mut f = File::create(&tmp)?;
            f.write_all(&payload)?;
            f.write_all(SNAPSHOT_MAGIC)?;
            f.write_all(&crc.to_be_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| EngineError::io(&path, e))?;

        let meta = MetaFile {
            num_docs: snapshot.corpus.len(),
            num_terms,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            version: FORMAT_VERSION,
        };
        let meta_path = self.meta_path(id);
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| EngineError::io(&meta_path, std::io::Error::other(e)))?;
        fs::write(&meta_path, json).map_err(|e| EngineError::io(&meta_path, e))?;

        tracing::info!(id, bytes = payload.len(), crc = %format!("{crc:#010x}"), num_terms, "saved snapshot");
        Ok(meta)
    }

    /// Reads a snapshot back. A missing file is a persistence error; a file
    /// that fails its checksum or cannot be decoded is a corruption error.
    pub fn load(&self, id: &str) -> Result<Snapshot> {
        validate_identifier(id)?;
        let path = self.snapshot_path(id);
        let raw = fs::read(&path).map_err(|e| EngineError::io(&path, e))?;
        if raw.len() < FOOTER_LEN {
            return Err(EngineError::corrupt(&path, "file shorter than footer"));
        }
        let (payload, footer) = raw.split_at(raw.len() - FOOTER_LEN);
        if &footer[..4] != SNAPSHOT_MAGIC {
            return Err(EngineError::corrupt(&path, "bad magic"));
        }
        let stored = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(EngineError::corrupt(
                &path,
                format!("crc mismatch: stored {stored:#010x}, computed {computed:#010x}"),
            ));
        }
        let data: SnapshotData = bincode::deserialize(payload)
            .map_err(|e| EngineError::corrupt(&path, format!("undecodable payload: {e}")))?;
        if data.version != FORMAT_VERSION {
            return Err(EngineError::corrupt(&path, format!("unsupported version {}", data.version)));
        }
        tracing::info!(id, num_docs = data.corpus.len(), num_terms = data.terms.len(), "loaded snapshot");
        Ok(Snapshot { config: data.config, corpus: data.corpus, index: InvertedFile::from_map(data.terms) })
    }

    pub fn load_meta(&self, id: &str) -> Result<MetaFile> {
        let path = self.meta_path(id);
        let raw = fs::read_to_string(&path).map_err(|e| EngineError::io(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| EngineError::corrupt(&path, e.to_string()))
    }

    /// Removes the snapshot, its meta file and cached texts.
    pub fn delete(&self, id: &str) -> Result<()> {
        validate_identifier(id)?;
        for path in [self.snapshot_path(id), self.meta_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(EngineError::io(&path, e)),
            }
        }
        let texts = self.texts_dir(id);
        if texts.exists() {
            fs::remove_dir_all(&texts).map_err(|e| EngineError::io(&texts, e))?;
        }
        Ok(())
    }

    pub fn cache_text(&self, id: &str, doc: DocId, text: &str) -> Result<()> {
        let dir = self.texts_dir(id);
        fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
        let path = self.text_path(id, doc);
        fs::write(&path, text).map_err(|e| EngineError::io(&path, e))
    }

    pub fn cached_text(&self, id: &str, doc: DocId) -> Option<String> {
        fs::read_to_string(self.text_path(id, doc)).ok()
    }

    /// A missing file is fine; other failures are logged and leave the stale text behind.
    pub fn drop_cached_text(&self, id: &str, doc: DocId) {
        let path = self.text_path(id, doc);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove cached text"),
        }
    }
}
