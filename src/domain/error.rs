use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Parse failure in {path}: {message}")]
    ParseFailure { path: String, message: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Hash collision on {hash}: chunk '{existing}' vs chunk '{incoming}'")]
    HashCollision {
        hash: String,
        existing: String,
        incoming: String,
    },

    #[error("Store schema version {on_disk} is newer than supported {supported}")]
    SchemaVersionMismatch { on_disk: String, supported: String },

    #[error("Migration {version} failed: {message}")]
    MigrationFailure { version: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Query exceeded its time budget after {elapsed_ms}ms")]
    QueryTimeout { elapsed_ms: u64 },

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Invalid ref: {0}")]
    InvalidRef(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn parse(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ParseFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingProvider(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors that abort a refresh instead of being folded into the
    /// per-file error counters.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HashCollision { .. }
                | Self::SchemaVersionMismatch { .. }
                | Self::MigrationFailure { .. }
                | Self::Store(_)
        )
    }
}
