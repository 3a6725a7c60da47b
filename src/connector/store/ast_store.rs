use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{AstDocument, IndexError};

/// Per-file JSON documents mirroring parse results, addressed by
/// repo-relative source path. Writes are atomic (write-then-rename).
pub struct AstStore {
    root: PathBuf,
}

impl AstStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, relative_path: &str) -> PathBuf {
        self.root.join(format!("{}.json", relative_path))
    }

    pub fn write(&self, relative_path: &str, doc: &AstDocument) -> Result<(), IndexError> {
        let target = self.doc_path(relative_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| IndexError::internal(format!("Failed to serialize AST doc: {}", e)))?;

        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &target)?;

        debug!("Wrote AST doc for {}", relative_path);
        Ok(())
    }

    pub fn read(&self, relative_path: &str) -> Result<Option<AstDocument>, IndexError> {
        let target = self.doc_path(relative_path);
        if !target.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&target)?;
        let doc = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::internal(format!("Corrupt AST doc {}: {}", relative_path, e)))?;
        Ok(Some(doc))
    }

    pub fn delete(&self, relative_path: &str) -> Result<(), IndexError> {
        let target = self.doc_path(relative_path);
        match std::fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All repo-relative source paths that currently have a document.
    pub fn list_all(&self) -> Result<Vec<String>, IndexError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                let text = relative.to_string_lossy();
                if let Some(source_path) = text.strip_suffix(".json") {
                    paths.push(source_path.to_string());
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub fn clear(&self) -> Result<(), IndexError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
