use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use code_index::domain::IndexError;

pub const MARKER_BEGIN: &str = "# >>> code-index hooks >>>";
pub const MARKER_END: &str = "# <<< code-index hooks <<<";

pub const DEFAULT_HOOKS: &[&str] = &["post-commit", "post-merge"];

#[derive(Debug, Clone, Serialize)]
pub struct HookStatus {
    pub hook: String,
    pub installed: bool,
    pub path: String,
}

/// Ref range the hook passes to `refresh --git-range`.
fn range_expr(hook: &str) -> &'static str {
    match hook {
        // After a merge, ORIG_HEAD points at the pre-merge tip.
        "post-merge" => "PREV_HEAD=$(git rev-parse ORIG_HEAD 2>/dev/null || git rev-parse HEAD)",
        _ => "PREV_HEAD=$(git rev-parse HEAD~1 2>/dev/null || git rev-parse HEAD)",
    }
}

/// The managed script block. Non-blocking: the refresh runs in the
/// background with a timeout, and the hook always exits 0.
fn managed_block(hook: &str) -> String {
    let mut block = String::new();
    block.push_str(MARKER_BEGIN);
    block.push('\n');
    block.push_str("# Managed by `code-index hooks install`; removed by `hooks uninstall`.\n");
    block.push_str("(\n");
    block.push_str(&format!("  {}\n", range_expr(hook)));
    block.push_str("  NEW_HEAD=$(git rev-parse HEAD)\n");
    block.push_str(
        "  timeout 120 code-index refresh --git-range \"$PREV_HEAD..$NEW_HEAD\" >/dev/null 2>&1 || true\n",
    );
    block.push_str(") &\n");
    block.push_str("exit 0\n");
    block.push_str(MARKER_END);
    block.push('\n');
    block
}

fn hooks_dir(project_root: &Path) -> PathBuf {
    project_root.join(".git").join("hooks")
}

/// Strip a previously installed managed block, leaving everything else.
fn without_managed_block(content: &str) -> String {
    let Some(begin) = content.find(MARKER_BEGIN) else {
        return content.to_string();
    };
    let Some(end_idx) = content[begin..].find(MARKER_END) else {
        return content.to_string();
    };
    let after = begin + end_idx + MARKER_END.len();
    let mut result = String::new();
    result.push_str(content[..begin].trim_end_matches('\n'));
    let tail = content[after..].trim_start_matches('\n');
    if !result.is_empty() && !tail.is_empty() {
        result.push('\n');
    }
    result.push_str(tail);
    result
}

pub fn install(
    project_root: &Path,
    hooks: &[String],
    force: bool,
) -> Result<Vec<HookStatus>, IndexError> {
    let dir = hooks_dir(project_root);
    if !dir.parent().is_some_and(Path::exists) {
        return Err(IndexError::NotARepository(project_root.to_path_buf()));
    }
    std::fs::create_dir_all(&dir)?;

    let mut statuses = Vec::new();
    for hook in hooks {
        let path = dir.join(hook);
        let existing = std::fs::read_to_string(&path).unwrap_or_default();

        if existing.contains(MARKER_BEGIN) && !force {
            statuses.push(HookStatus {
                hook: hook.clone(),
                installed: true,
                path: path.display().to_string(),
            });
            continue;
        }

        let mut content = without_managed_block(&existing);
        if content.is_empty() {
            content.push_str("#!/bin/sh\n");
        }
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&managed_block(hook));

        std::fs::write(&path, &content)?;
        make_executable(&path)?;
        info!("Installed {} hook", hook);

        statuses.push(HookStatus {
            hook: hook.clone(),
            installed: true,
            path: path.display().to_string(),
        });
    }
    Ok(statuses)
}

/// Remove exactly the managed block from each hook file.
pub fn uninstall(project_root: &Path, hooks: &[String]) -> Result<Vec<HookStatus>, IndexError> {
    let dir = hooks_dir(project_root);
    let mut statuses = Vec::new();

    for hook in hooks {
        let path = dir.join(hook);
        let Ok(existing) = std::fs::read_to_string(&path) else {
            statuses.push(HookStatus {
                hook: hook.clone(),
                installed: false,
                path: path.display().to_string(),
            });
            continue;
        };

        let cleaned = without_managed_block(&existing);
        if cleaned.trim() == "#!/bin/sh" || cleaned.trim().is_empty() {
            std::fs::remove_file(&path)?;
        } else if cleaned != existing {
            std::fs::write(&path, cleaned)?;
        }
        info!("Uninstalled {} hook", hook);

        statuses.push(HookStatus {
            hook: hook.clone(),
            installed: false,
            path: path.display().to_string(),
        });
    }
    Ok(statuses)
}

pub fn status(project_root: &Path, hooks: &[String]) -> Vec<HookStatus> {
    let dir = hooks_dir(project_root);
    hooks
        .iter()
        .map(|hook| {
            let path = dir.join(hook);
            let installed = std::fs::read_to_string(&path)
                .map(|content| content.contains(MARKER_BEGIN))
                .unwrap_or(false);
            HookStatus {
                hook: hook.clone(),
                installed,
                path: path.display().to_string(),
            }
        })
        .collect()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), IndexError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), IndexError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
        dir
    }

    fn as_strings(hooks: &[&str]) -> Vec<String> {
        hooks.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_install_and_status() {
        let dir = git_project();
        let hooks = as_strings(DEFAULT_HOOKS);

        install(dir.path(), &hooks, false).unwrap();
        let statuses = status(dir.path(), &hooks);
        assert!(statuses.iter().all(|s| s.installed));

        let content =
            std::fs::read_to_string(dir.path().join(".git/hooks/post-commit")).unwrap();
        assert!(content.contains(MARKER_BEGIN));
        assert!(content.contains("refresh --git-range"));
        assert!(content.contains("exit 0"));
    }

    #[test]
    fn test_uninstall_removes_exactly_the_block() {
        let dir = git_project();
        let hook_path = dir.path().join(".git/hooks/post-commit");
        std::fs::write(&hook_path, "#!/bin/sh\necho user-owned\n").unwrap();

        let hooks = as_strings(&["post-commit"]);
        install(dir.path(), &hooks, false).unwrap();
        uninstall(dir.path(), &hooks).unwrap();

        let content = std::fs::read_to_string(&hook_path).unwrap();
        assert!(content.contains("echo user-owned"));
        assert!(!content.contains(MARKER_BEGIN));
    }

    #[test]
    fn test_uninstall_deletes_wholly_managed_file() {
        let dir = git_project();
        let hooks = as_strings(&["post-merge"]);
        install(dir.path(), &hooks, false).unwrap();
        uninstall(dir.path(), &hooks).unwrap();
        assert!(!dir.path().join(".git/hooks/post-merge").exists());
    }

    #[test]
    fn test_install_without_git_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = install(dir.path(), &as_strings(&["post-commit"]), false).unwrap_err();
        assert!(matches!(err, IndexError::NotARepository(_)));
    }

    #[test]
    fn test_reinstall_is_idempotent() {
        let dir = git_project();
        let hooks = as_strings(&["post-commit"]);
        install(dir.path(), &hooks, false).unwrap();
        install(dir.path(), &hooks, false).unwrap();

        let content =
            std::fs::read_to_string(dir.path().join(".git/hooks/post-commit")).unwrap();
        assert_eq!(content.matches(MARKER_BEGIN).count(), 1);
    }
}
