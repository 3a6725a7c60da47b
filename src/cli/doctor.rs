use serde::Serialize;
use tracing::info;

use code_index::application::DiffSource;
use code_index::connector::store::IndexStore;
use code_index::connector::GitDiffSource;
use code_index::domain::ProjectLayout;

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub detail: String,
    pub fixed: bool,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub success: bool,
    pub checks: Vec<CheckResult>,
}

fn check(name: &str, ok: bool, detail: impl Into<String>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        ok,
        detail: detail.into(),
        fixed: false,
    }
}

/// Run all health checks; with `fix`, repair what can be repaired.
pub async fn run(layout: &ProjectLayout, dimension: usize, fix: bool) -> DoctorReport {
    let mut checks = Vec::new();

    // State directory tree.
    let state_ok = layout.state_dir().is_dir() && layout.ast_dir().is_dir();
    let mut state_check = check(
        "state-dir",
        state_ok,
        layout.state_dir().display().to_string(),
    );
    if !state_ok && fix {
        state_check.fixed = layout.ensure_dirs().is_ok();
        state_check.ok = state_check.fixed;
    }
    checks.push(state_check);

    // The store must open and be at a known schema version.
    let store = match IndexStore::open(&layout.db_path(), dimension).await {
        Ok(store) => {
            checks.push(check("store-open", true, layout.db_path().display().to_string()));
            Some(store)
        }
        Err(e) => {
            checks.push(check("store-open", false, e.to_string()));
            None
        }
    };

    if let Some(store) = &store {
        match store.schema_version().await {
            Ok(version) => checks.push(check("schema-version", true, version)),
            Err(e) => checks.push(check("schema-version", false, e.to_string())),
        }

        match store.fts_is_consistent().await {
            Ok(true) => checks.push(check("fts-consistency", true, "shadow matches chunks")),
            Ok(false) => {
                let mut result = check("fts-consistency", false, "shadow out of sync");
                if fix {
                    result.fixed = store.rebuild_fts().await.is_ok();
                    result.ok = result.fixed;
                    if result.fixed {
                        result.detail = "rebuilt".to_string();
                    }
                }
                checks.push(result);
            }
            Err(e) => checks.push(check("fts-consistency", false, e.to_string())),
        }

        match store.vectors_match_dimension().await {
            Ok(ok) => checks.push(check(
                "vector-dimension",
                ok,
                format!("declared dim {}", dimension),
            )),
            Err(e) => checks.push(check("vector-dimension", false, e.to_string())),
        }

        match store.stats().await {
            Ok(stats) => {
                let ast_docs = code_index::connector::store::AstStore::new(layout.ast_dir())
                    .list_all()
                    .map(|p| p.len() as u64)
                    .unwrap_or(0);
                checks.push(check(
                    "ast-documents",
                    ast_docs == stats.file_count,
                    format!("{} docs for {} files", ast_docs, stats.file_count),
                ));
                checks.push(check(
                    "stats",
                    true,
                    serde_json::to_string(&stats).unwrap_or_default(),
                ));
            }
            Err(e) => checks.push(check("stats", false, e.to_string())),
        }
    }

    if fix {
        if let Some(store) = &store {
            // Refresh the query planner statistics while we are here.
            let ok = store.analyze().await.is_ok();
            checks.push(CheckResult {
                name: "analyze".to_string(),
                ok,
                detail: "query planner statistics".to_string(),
                fixed: ok,
            });
        }
    }

    // Git availability is informative, not required.
    match GitDiffSource::open(layout.root()) {
        Ok(source) => {
            let detail = source
                .info()
                .ok()
                .and_then(|i| i.current_branch)
                .unwrap_or_else(|| "detached".to_string());
            checks.push(check("git", true, detail));
        }
        Err(_) => checks.push(check("git", true, "not a repository (diff refresh disabled)")),
    }

    let success = checks.iter().all(|c| c.ok);
    info!(
        "Doctor: {}/{} checks passed",
        checks.iter().filter(|c| c.ok).count(),
        checks.len()
    );
    DoctorReport { success, checks }
}
