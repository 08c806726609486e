use std::path::PathBuf;

/// Errors surfaced by the indexing and query pipeline.
///
/// Lookup misses (unknown term, unresolvable document id) are not errors;
/// they come back as `None` or are filtered out of results.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A caller handed in something the pipeline cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading or writing index files failed.
    #[error("persistence failure at {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot exists but cannot be trusted; rebuild from scratch.
    #[error("corrupt snapshot {path:?}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("configuration error in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidArgument(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Persistence { path: path.into(), source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EngineError::CorruptSnapshot { path: path.into(), reason: reason.into() }
    }

    /// True for faults where rebuilding the index is the sensible recovery.
    pub fn is_corruption(&self) -> bool {
        matches!(self, EngineError::CorruptSnapshot { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
