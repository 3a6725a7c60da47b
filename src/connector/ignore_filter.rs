use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use tracing::debug;

use crate::domain::{IndexError, STATE_DIR_NAME};

/// Patterns always excluded regardless of project ignore files.
const BUILTIN_PATTERNS: &[&str] = &[".codeindex/", "*.log", ".git/"];

/// Name of the project-local override file layered on top of gitignore
/// semantics.
pub const CUSTOM_IGNORE_FILE: &str = ".codeindexignore";

/// Hierarchical ignore evaluator: nested `.gitignore` files, the project's
/// `.codeindexignore`, and built-in state/log patterns. Negation
/// (`!pattern`) follows gitignore semantics. Pure predicate used during
/// directory walks.
pub struct IgnoreFilter {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreFilter {
    pub fn load(root: &Path) -> Result<Self, IndexError> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in BUILTIN_PATTERNS {
            builder
                .add_line(None, pattern)
                .map_err(|e| IndexError::config(format!("Bad builtin pattern: {}", e)))?;
        }

        // Nested .gitignore files inherit by location; deeper files win.
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != STATE_DIR_NAME && e.file_name() != ".git")
            .filter_map(|e| e.ok())
        {
            let name = entry.file_name().to_string_lossy();
            if name == ".gitignore" || name == CUSTOM_IGNORE_FILE {
                if let Some(err) = builder.add(entry.path()) {
                    debug!("Skipping unreadable ignore file: {}", err);
                }
            }
        }

        let matcher = builder
            .build()
            .map_err(|e| IndexError::config(format!("Failed to build ignore set: {}", e)))?;

        Ok(Self {
            root: root.to_path_buf(),
            matcher,
        })
    }

    /// True when the repo-relative path is excluded from indexing.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        let full = self.root.join(relative_path);
        let is_dir = relative_path.ends_with('/') || full.is_dir();
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}

/// Directory walker honoring gitignore files plus the custom overrides; the
/// state directory never appears in results.
pub fn build_walker(root: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .add_custom_ignore_filename(CUSTOM_IGNORE_FILE)
        .filter_entry(|entry| entry.file_name() != STATE_DIR_NAME);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_builtin_patterns() {
        let dir = project_with(&[("src/a.ts", "const a = 1;")]);
        let filter = IgnoreFilter::load(dir.path()).unwrap();

        assert!(filter.is_ignored(".codeindex/index.db"));
        assert!(filter.is_ignored("debug.log"));
        assert!(!filter.is_ignored("src/a.ts"));
    }

    #[test]
    fn test_gitignore_and_negation() {
        let dir = project_with(&[
            (".gitignore", "dist/\n*.min.js\n!keep.min.js\n"),
            ("dist/out.js", ""),
            ("bundle.min.js", ""),
            ("keep.min.js", ""),
        ]);
        let filter = IgnoreFilter::load(dir.path()).unwrap();

        assert!(filter.is_ignored("dist/out.js"));
        assert!(filter.is_ignored("bundle.min.js"));
        assert!(!filter.is_ignored("keep.min.js"));
    }

    #[test]
    fn test_nested_gitignore() {
        let dir = project_with(&[
            ("packages/.gitignore", "generated/\n"),
            ("packages/generated/x.ts", ""),
            ("generated/y.ts", ""),
        ]);
        let filter = IgnoreFilter::load(dir.path()).unwrap();

        assert!(filter.is_ignored("packages/generated/x.ts"));
        // The nested file only applies below its own directory.
        assert!(!filter.is_ignored("generated/y.ts"));
    }

    #[test]
    fn test_custom_ignore_file() {
        let dir = project_with(&[
            (CUSTOM_IGNORE_FILE, "fixtures/\n"),
            ("fixtures/sample.ts", ""),
        ]);
        let filter = IgnoreFilter::load(dir.path()).unwrap();
        assert!(filter.is_ignored("fixtures/sample.ts"));
    }
}
