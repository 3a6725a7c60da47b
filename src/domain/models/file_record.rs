use serde::{Deserialize, Serialize};

use super::Language;

/// One indexed file as tracked by the `files` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    path: String,
    mtime_ms: i64,
    last_indexed_ms: i64,
    language: Language,
}

impl FileRecord {
    pub fn new(path: String, mtime_ms: i64, last_indexed_ms: i64, language: Language) -> Self {
        Self {
            path,
            mtime_ms,
            last_indexed_ms,
            language,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mtime_ms(&self) -> i64 {
        self.mtime_ms
    }

    pub fn last_indexed_ms(&self) -> i64 {
        self.last_indexed_ms
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// True when the on-disk mtime has advanced past the recorded one.
    pub fn is_stale(&self, current_mtime_ms: i64) -> bool {
        current_mtime_ms > self.mtime_ms
    }
}
