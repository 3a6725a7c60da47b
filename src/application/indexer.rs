use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::chunker::Chunker;
use crate::application::{ChangeStatus, Diff, HybridIndex, SymbolIndex};
use crate::connector::ignore_filter::build_walker;
use crate::connector::parser::FileAnalyzer;
use crate::connector::store::{AstStore, IndexStore};
use crate::domain::{
    now_ms, AstDocument, FileRecord, IndexError, Language, ProjectLayout,
};

const PROGRESS_LOG_EVERY: u64 = 100;

/// Counters accumulated over one full index or refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshOutcome {
    pub files_added: u64,
    pub files_updated: u64,
    pub files_deleted: u64,
    pub files_skipped: u64,
    pub errors: Vec<String>,
    pub per_second: f64,
}

impl RefreshOutcome {
    /// Sum of the counters that mutate stored state.
    pub fn mutations(&self) -> u64 {
        self.files_added + self.files_updated + self.files_deleted
    }
}

/// One planned file-level operation (surfaced by `refresh --dry-run`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "op", content = "path")]
pub enum PlannedOp {
    Add(String),
    Modify(String),
    Delete(String),
    Skip(String),
}

/// Drives add/modify/delete at file granularity through parser → chunker →
/// stores, keeping the persistent store, AST documents, symbol index and
/// hybrid index consistent with each other.
pub struct IncrementalIndexer {
    layout: ProjectLayout,
    store: Arc<IndexStore>,
    ast_store: Arc<AstStore>,
    symbol_index: Arc<SymbolIndex>,
    hybrid_index: Arc<HybridIndex>,
    analyzer: Arc<FileAnalyzer>,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl IncrementalIndexer {
    pub fn new(
        layout: ProjectLayout,
        store: Arc<IndexStore>,
        ast_store: Arc<AstStore>,
        symbol_index: Arc<SymbolIndex>,
        hybrid_index: Arc<HybridIndex>,
        analyzer: Arc<FileAnalyzer>,
    ) -> Self {
        Self {
            layout,
            store,
            ast_store,
            symbol_index,
            hybrid_index,
            analyzer,
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Shared flag a caller may set to stop enqueuing new files; in-flight
    /// per-file work finishes its transaction first.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Rebuild the in-memory symbol index from persisted AST documents.
    pub fn hydrate_symbol_index(&self) -> Result<usize, IndexError> {
        let mut count = 0;
        for path in self.ast_store.list_all()? {
            if let Some(doc) = self.ast_store.read(&path)? {
                self.symbol_index.add(&path, &doc);
                count += 1;
            }
        }
        debug!("Hydrated symbol index from {} AST docs", count);
        Ok(count)
    }

    // ── Full index ───────────────────────────────────────────────────────

    pub async fn full_index(&self) -> Result<RefreshOutcome, IndexError> {
        let started = Instant::now();
        info!("Full index of {}", self.layout.root().display());

        self.store.clear_all().await?;
        self.ast_store.clear()?;
        self.symbol_index.clear();

        let files = self.walk_project();
        let total = files.len() as u64;
        info!("Found {} candidate files", total);

        let progress = self.progress_bar(total);
        let mut outcome = RefreshOutcome::default();

        for (processed, relative_path) in files.into_iter().enumerate() {
            if self.cancelled() {
                info!("Cancelled after {} files", processed);
                break;
            }
            if let Some(bar) = &progress {
                bar.set_message(relative_path.clone());
            }

            match self.index_one(&relative_path).await {
                Ok(true) => outcome.files_added += 1,
                Ok(false) => outcome.files_skipped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Failed to index {}: {}", relative_path, e);
                    outcome.errors.push(format!("{}: {}", relative_path, e));
                }
            }

            let done = processed as u64 + 1;
            if done % PROGRESS_LOG_EVERY == 0 {
                info!("Indexed {}/{} files", done, total);
            }
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        self.hybrid_index.rebuild().await?;
        outcome.per_second = rate(outcome.files_added, started);
        info!(
            "Full index complete: {} files, {} skipped, {} errors in {:.2}s",
            outcome.files_added,
            outcome.files_skipped,
            outcome.errors.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    // ── Refresh by mtime ─────────────────────────────────────────────────

    pub async fn refresh_mtime(&self) -> Result<RefreshOutcome, IndexError> {
        let started = Instant::now();
        let snapshot = self.store.file_snapshot().await?;

        let mut outcome = RefreshOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut to_add: Vec<String> = Vec::new();
        let mut to_modify: Vec<String> = Vec::new();

        for relative_path in self.walk_project() {
            seen.insert(relative_path.clone());
            let mtime = self.mtime_of(&relative_path);
            match snapshot.get(&relative_path) {
                None => to_add.push(relative_path),
                Some((_, recorded)) if mtime > *recorded => to_modify.push(relative_path),
                Some(_) => outcome.files_skipped += 1,
            }
        }

        // Deletes run before adds so a rename never loses its new chunks to
        // the delete of the old path.
        for path in snapshot.keys() {
            if !seen.contains(path) {
                self.delete_one(path).await?;
                outcome.files_deleted += 1;
            }
        }

        for path in to_add {
            if self.cancelled() {
                break;
            }
            self.apply_indexing(&path, &mut outcome, true).await?;
        }
        for path in to_modify {
            if self.cancelled() {
                break;
            }
            self.apply_indexing(&path, &mut outcome, false).await?;
        }

        if outcome.mutations() > 0 {
            self.hybrid_index.rebuild().await?;
        }
        outcome.per_second = rate(outcome.mutations(), started);
        info!(
            "Refresh complete: +{} ~{} -{} ({} skipped, {} errors)",
            outcome.files_added,
            outcome.files_updated,
            outcome.files_deleted,
            outcome.files_skipped,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// The operations a mtime refresh would perform, without applying them.
    pub async fn plan_mtime(&self) -> Result<Vec<PlannedOp>, IndexError> {
        let snapshot = self.store.file_snapshot().await?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut deletes = Vec::new();
        let mut upserts = Vec::new();

        for relative_path in self.walk_project() {
            seen.insert(relative_path.clone());
            let mtime = self.mtime_of(&relative_path);
            match snapshot.get(&relative_path) {
                None => upserts.push(PlannedOp::Add(relative_path)),
                Some((_, recorded)) if mtime > *recorded => {
                    upserts.push(PlannedOp::Modify(relative_path))
                }
                Some(_) => upserts.push(PlannedOp::Skip(relative_path)),
            }
        }
        for path in snapshot.keys() {
            if !seen.contains(path) {
                deletes.push(PlannedOp::Delete(path.clone()));
            }
        }

        deletes.extend(upserts);
        Ok(deletes)
    }

    // ── Refresh by VCS diff ──────────────────────────────────────────────

    /// Map a diff to file-level operations. Paths are resolved repo-root
    /// relative; unmerged and unknown statuses are skipped.
    pub fn plan_diff(&self, diff: &Diff) -> Vec<PlannedOp> {
        let mut deletes = Vec::new();
        let mut upserts = Vec::new();
        let mut skips = Vec::new();

        for change in &diff.changed_files {
            match change.status {
                ChangeStatus::Added | ChangeStatus::Copied => {
                    upserts.push(PlannedOp::Add(change.path.clone()))
                }
                ChangeStatus::Modified | ChangeStatus::TypeChanged => {
                    upserts.push(PlannedOp::Modify(change.path.clone()))
                }
                ChangeStatus::Deleted => deletes.push(PlannedOp::Delete(change.path.clone())),
                ChangeStatus::Renamed => {
                    if let Some(old) = &change.old_path {
                        deletes.push(PlannedOp::Delete(old.clone()));
                    }
                    upserts.push(PlannedOp::Add(change.path.clone()));
                }
                ChangeStatus::Unmerged | ChangeStatus::Unknown => {
                    skips.push(PlannedOp::Skip(change.path.clone()))
                }
            }
        }

        // Deletes first: rename ordering guarantee.
        deletes.extend(upserts);
        deletes.extend(skips);
        deletes
    }

    pub async fn refresh_diff(&self, diff: &Diff) -> Result<RefreshOutcome, IndexError> {
        let started = Instant::now();
        let snapshot = self.store.file_snapshot().await?;
        let mut outcome = RefreshOutcome::default();

        for op in self.plan_diff(diff) {
            if self.cancelled() {
                break;
            }
            match op {
                PlannedOp::Delete(path) => {
                    self.delete_one(&path).await?;
                    outcome.files_deleted += 1;
                }
                PlannedOp::Add(path) => {
                    let known = snapshot.contains_key(&path);
                    self.apply_indexing(&path, &mut outcome, !known).await?;
                }
                PlannedOp::Modify(path) => {
                    let known = snapshot.contains_key(&path);
                    self.apply_indexing(&path, &mut outcome, !known).await?;
                }
                PlannedOp::Skip(path) => {
                    debug!("Skipping unmerged/unknown {}", path);
                    outcome.files_skipped += 1;
                }
            }
        }

        if outcome.mutations() > 0 {
            self.hybrid_index.rebuild().await?;
        }
        outcome.per_second = rate(outcome.mutations(), started);
        Ok(outcome)
    }

    // ── Per-file operations ──────────────────────────────────────────────

    async fn apply_indexing(
        &self,
        relative_path: &str,
        outcome: &mut RefreshOutcome,
        is_new: bool,
    ) -> Result<(), IndexError> {
        match self.index_one(relative_path).await {
            Ok(true) => {
                if is_new {
                    outcome.files_added += 1;
                } else {
                    outcome.files_updated += 1;
                }
            }
            Ok(false) => outcome.files_skipped += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Failed to refresh {}: {}", relative_path, e);
                outcome.errors.push(format!("{}: {}", relative_path, e));
            }
        }
        Ok(())
    }

    /// Index one file end to end. Returns `Ok(false)` when the file was
    /// skipped (no grammar for its language, or vanished from disk).
    async fn index_one(&self, relative_path: &str) -> Result<bool, IndexError> {
        let full_path = self.layout.root().join(relative_path);
        let language = Language::from_path(&full_path);
        if !language.has_grammar() {
            debug!("No grammar for {}, skipping", relative_path);
            return Ok(false);
        }

        let source = match tokio::fs::read_to_string(&full_path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} vanished before indexing", relative_path);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = tokio::fs::metadata(&full_path).await?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let parsed = self.analyzer.analyze(relative_path, &source)?;
        let chunks = Chunker::chunk_file(&parsed, &source);
        if chunks.is_empty() {
            return Err(IndexError::internal(format!(
                "chunker produced no chunks for {}",
                relative_path
            )));
        }

        let record = FileRecord::new(
            relative_path.to_string(),
            mtime_ms,
            now_ms(),
            language,
        );
        let file_id = self.store.upsert_file(&record, metadata.len()).await?;
        let uids = self.store.upsert_chunks(file_id, relative_path, &chunks).await?;

        let doc = AstDocument::from_parsed(&parsed);
        self.ast_store.write(relative_path, &doc)?;
        self.symbol_index.add(relative_path, &doc);
        self.hybrid_index.add_chunks(&uids, &chunks).await?;

        debug!(
            "Indexed {} ({} symbols, {} chunks)",
            relative_path,
            doc.symbol_count(),
            chunks.len()
        );
        Ok(true)
    }

    async fn delete_one(&self, relative_path: &str) -> Result<(), IndexError> {
        let removed = self.store.delete_file(relative_path).await?;
        self.ast_store.delete(relative_path)?;
        self.symbol_index.remove(relative_path);
        debug!("Deleted {} ({} chunks)", relative_path, removed);
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    /// Repo-relative paths of every candidate file, in walk order.
    fn walk_project(&self) -> Vec<String> {
        let root = self.layout.root();
        build_walker(root)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .ok()
                    .map(|p| p.to_string_lossy().to_string())
            })
            .collect()
    }

    fn mtime_of(&self, relative_path: &str) -> i64 {
        std::fs::metadata(self.layout.root().join(relative_path))
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .expect("Invalid progress bar template")
                .progress_chars("━━─"),
        );
        Some(bar)
    }
}

fn rate(processed: u64, started: Instant) -> f64 {
    let secs = started.elapsed().as_secs_f64();
    if secs > 0.0 {
        processed as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ChangedFile, DiffOrigin};
    use crate::connector::embedding::MockEmbeddingProvider;
    use crate::connector::parser::GrammarRegistry;

    async fn indexer_for(root: &Path) -> IncrementalIndexer {
        let layout = ProjectLayout::new(root);
        layout.ensure_dirs().unwrap();
        let store = Arc::new(IndexStore::in_memory(384).await.unwrap());
        let ast_store = Arc::new(AstStore::new(layout.ast_dir()));
        let symbol_index = Arc::new(SymbolIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new());
        let hybrid = Arc::new(HybridIndex::new(store.clone(), provider, 32));
        let analyzer = Arc::new(FileAnalyzer::new(Arc::new(GrammarRegistry::new())));
        IncrementalIndexer::new(layout, store, ast_store, symbol_index, hybrid, analyzer)
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let full = root.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[tokio::test]
    async fn test_full_index_counts_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "export function a() { return 1; }\n");
        write(dir.path(), "src/b.py", "def b():\n    return 2\n");
        write(dir.path(), "README.md", "# readme\n");

        let indexer = indexer_for(dir.path()).await;
        let outcome = indexer.full_index().await.unwrap();

        assert_eq!(outcome.files_added, 2);
        assert_eq!(outcome.files_skipped, 1);
        assert!(outcome.errors.is_empty());

        let stats = indexer.store.stats().await.unwrap();
        assert_eq!(stats.file_count, 2);
        assert!(stats.chunk_count >= 2);
        assert_eq!(stats.chunk_count, stats.fts_count);
    }

    #[tokio::test]
    async fn test_refresh_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "export function a() { return 1; }\n");

        let indexer = indexer_for(dir.path()).await;
        indexer.full_index().await.unwrap();

        let outcome = indexer.refresh_mtime().await.unwrap();
        assert_eq!(outcome.files_added, 0);
        assert_eq!(outcome.files_updated, 0);
        assert_eq!(outcome.files_deleted, 0);
        assert_eq!(outcome.files_skipped, 1);
    }

    #[tokio::test]
    async fn test_refresh_detects_add_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "export function a() { return 1; }\n");

        let indexer = indexer_for(dir.path()).await;
        indexer.full_index().await.unwrap();

        write(dir.path(), "src/new.ts", "export function fresh() { return 3; }\n");
        std::fs::remove_file(dir.path().join("src/a.ts")).unwrap();

        let outcome = indexer.refresh_mtime().await.unwrap();
        assert_eq!(outcome.files_added, 1);
        assert_eq!(outcome.files_deleted, 1);

        // Everything belonging to the deleted file is gone.
        assert!(indexer.symbol_index.exact("a").is_empty());
        assert_eq!(indexer.symbol_index.exact("fresh").len(), 1);
        assert!(indexer.ast_store.read("src/a.ts").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_diff_plan_maps_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = indexer_for(dir.path()).await;

        let diff = Diff {
            source: DiffOrigin::CommitRange,
            previous: None,
            head: None,
            changed_files: vec![
                ChangedFile {
                    path: "added.ts".into(),
                    old_path: None,
                    status: ChangeStatus::Added,
                    similarity: None,
                },
                ChangedFile {
                    path: "new.ts".into(),
                    old_path: Some("old.ts".into()),
                    status: ChangeStatus::Renamed,
                    similarity: Some(100),
                },
                ChangedFile {
                    path: "gone.ts".into(),
                    old_path: None,
                    status: ChangeStatus::Deleted,
                    similarity: None,
                },
                ChangedFile {
                    path: "conflict.ts".into(),
                    old_path: None,
                    status: ChangeStatus::Unmerged,
                    similarity: None,
                },
            ],
        };

        let plan = indexer.plan_diff(&diff);
        // Deletes (incl. rename old path) come first.
        assert_eq!(plan[0], PlannedOp::Delete("old.ts".into()));
        assert_eq!(plan[1], PlannedOp::Delete("gone.ts".into()));
        assert!(plan.contains(&PlannedOp::Add("added.ts".into())));
        assert!(plan.contains(&PlannedOp::Add("new.ts".into())));
        assert!(plan.contains(&PlannedOp::Skip("conflict.ts".into())));
    }

    #[tokio::test]
    async fn test_refresh_diff_rename() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "old.ts", "export function stable() { return 42; }\n");

        let indexer = indexer_for(dir.path()).await;
        indexer.full_index().await.unwrap();

        // Simulate the rename on disk plus the diff reporting it.
        std::fs::rename(dir.path().join("old.ts"), dir.path().join("new.ts")).unwrap();
        let diff = Diff {
            source: DiffOrigin::LastCommit,
            previous: None,
            head: None,
            changed_files: vec![ChangedFile {
                path: "new.ts".into(),
                old_path: Some("old.ts".into()),
                status: ChangeStatus::Renamed,
                similarity: Some(100),
            }],
        };

        let outcome = indexer.refresh_diff(&diff).await.unwrap();
        assert_eq!(outcome.files_deleted, 1);
        assert_eq!(outcome.files_added, 1);

        let snapshot = indexer.store.file_snapshot().await.unwrap();
        assert!(snapshot.contains_key("new.ts"));
        assert!(!snapshot.contains_key("old.ts"));

        // No stale chunks reference the old path.
        let chunks = indexer
            .store
            .query_chunks(&crate::connector::store::ChunkQuery::new().with_page(100, 0))
            .await
            .unwrap();
        assert!(chunks.iter().all(|c| c.file_path() != "old.ts"));
    }

    #[tokio::test]
    async fn test_hydrate_symbol_index() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "export function alpha() { return 1; }\n");

        let indexer = indexer_for(dir.path()).await;
        indexer.full_index().await.unwrap();

        indexer.symbol_index.clear();
        assert!(indexer.symbol_index.exact("alpha").is_empty());

        indexer.hydrate_symbol_index().unwrap();
        assert_eq!(indexer.symbol_index.exact("alpha").len(), 1);
    }
}
