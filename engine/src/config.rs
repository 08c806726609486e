use crate::error::{EngineError, Result};
use crate::stemmer::Language;
use crate::term::Analyzer;
use crate::tokenizer::TokenizerKind;
use crate::weighting::IdfMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to do when a document cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Try again up to `fetch_retries` more times, then skip.
    Retry,
    #[default]
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingMode {
    #[default]
    Off,
    /// Keep a copy of each document's extracted text next to the snapshot.
    Texts,
}

/// Session configuration. Values are treated as immutable: the `with_*`
/// methods return a new configuration and nothing reaches disk until
/// [`Config::save`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identifier: String,
    pub language: Language,
    pub tokenizer: TokenizerKind,
    /// Accepted file extensions, lowercase, without the dot. Empty accepts all.
    pub formats: Vec<String>,
    pub fetch_policy: FetchPolicy,
    pub fetch_retries: u32,
    pub caching: CachingMode,
    pub idf: IdfMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier: "default".to_string(),
            language: Language::default(),
            tokenizer: TokenizerKind::default(),
            formats: vec!["txt".into(), "md".into(), "text".into()],
            fetch_policy: FetchPolicy::default(),
            fetch_retries: 2,
            caching: CachingMode::default(),
            idf: IdfMode::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| EngineError::Config { path: path.to_path_buf(), reason: e.to_string() })?;
        config.validate().map_err(|e| EngineError::Config { path: path.to_path_buf(), reason: e.to_string() })?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        let raw = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config { path: path.to_path_buf(), reason: e.to_string() })?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        }
        fs::write(path, raw).map_err(|e| EngineError::io(path, e))
    }

    /// Identifiers become file names, so only `[A-Za-z0-9_.-]` is allowed.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.identifier)
    }

    pub fn with_identifier(self, identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), ..self }
    }

    pub fn with_language(self, language: Language) -> Self {
        Self { language, ..self }
    }

    pub fn with_tokenizer(self, tokenizer: TokenizerKind) -> Self {
        Self { tokenizer, ..self }
    }

    pub fn with_formats<I, S>(self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let formats = formats
            .into_iter()
            .map(|f| f.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { formats, ..self }
    }

    pub fn with_fetch_policy(self, fetch_policy: FetchPolicy, fetch_retries: u32) -> Self {
        Self { fetch_policy, fetch_retries, ..self }
    }

    pub fn with_caching(self, caching: CachingMode) -> Self {
        Self { caching, ..self }
    }

    pub fn with_idf(self, idf: IdfMode) -> Self {
        Self { idf, ..self }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if self.formats.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.formats.iter().any(|f| f.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Number of read attempts the fetch policy allows.
    pub fn fetch_attempts(&self) -> u32 {
        match self.fetch_policy {
            FetchPolicy::Retry => 1 + self.fetch_retries,
            FetchPolicy::Skip => 1,
        }
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.tokenizer, self.language)
    }
}

pub(crate) fn validate_identifier(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(EngineError::invalid(format!("invalid index identifier {id:?}")))
    }
}
