use std::path::Path;

use git2::{Delta, DiffFindOptions, DiffOptions, Repository};
use tracing::debug;

use crate::application::{ChangeStatus, ChangedFile, Diff, DiffOrigin, DiffSource, VcsInfo};
use crate::domain::IndexError;

/// git2-backed diff source. Refs are validated before querying; an invalid
/// ref is an error rather than an empty diff.
pub struct GitDiffSource {
    repo: Repository,
}

impl GitDiffSource {
    pub fn open(root: &Path) -> Result<Self, IndexError> {
        let repo = Repository::discover(root)
            .map_err(|_| IndexError::NotARepository(root.to_path_buf()))?;
        Ok(Self { repo })
    }

    fn resolve_commit<'a>(
        repo: &'a Repository,
        reference: &str,
    ) -> Result<git2::Commit<'a>, IndexError> {
        repo.revparse_single(reference)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| IndexError::InvalidRef(reference.to_string()))
    }

    fn map_status(status: Delta) -> ChangeStatus {
        match status {
            Delta::Added => ChangeStatus::Added,
            Delta::Modified => ChangeStatus::Modified,
            Delta::Deleted => ChangeStatus::Deleted,
            Delta::Renamed => ChangeStatus::Renamed,
            Delta::Copied => ChangeStatus::Copied,
            Delta::Typechange => ChangeStatus::TypeChanged,
            Delta::Conflicted => ChangeStatus::Unmerged,
            _ => ChangeStatus::Unknown,
        }
    }

    fn collect_changes(diff: &git2::Diff) -> Vec<ChangedFile> {
        let mut files = Vec::new();
        for delta in diff.deltas() {
            let status = Self::map_status(delta.status());
            let new_path = delta
                .new_file()
                .path()
                .map(|p| p.to_string_lossy().to_string());
            let old_path = delta
                .old_file()
                .path()
                .map(|p| p.to_string_lossy().to_string());

            let (path, old_path) = match status {
                // Deletions only carry the old side.
                ChangeStatus::Deleted => match old_path {
                    Some(old) => (old, None),
                    None => continue,
                },
                ChangeStatus::Renamed | ChangeStatus::Copied => match new_path {
                    Some(new) => (new, old_path),
                    None => continue,
                },
                _ => match new_path.or(old_path) {
                    Some(path) => (path, None),
                    None => continue,
                },
            };

            files.push(ChangedFile {
                path,
                old_path,
                status,
                similarity: None,
            });
        }
        files
    }

    fn diff_commits(
        &self,
        from: &git2::Commit,
        to: &git2::Commit,
    ) -> Result<Vec<ChangedFile>, IndexError> {
        let old_tree = from
            .tree()
            .map_err(|e| IndexError::store(format!("Failed to read tree: {}", e)))?;
        let new_tree = to
            .tree()
            .map_err(|e| IndexError::store(format!("Failed to read tree: {}", e)))?;

        let mut opts = DiffOptions::new();
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))
            .map_err(|e| IndexError::store(format!("Failed to diff trees: {}", e)))?;

        // Detect renames so a moved file arrives as R rather than D+A.
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))
            .map_err(|e| IndexError::store(format!("Failed rename detection: {}", e)))?;

        Ok(Self::collect_changes(&diff))
    }
}

impl DiffSource for GitDiffSource {
    fn info(&self) -> Result<VcsInfo, IndexError> {
        let head = self.repo.head().ok();
        let is_detached = self.repo.head_detached().unwrap_or(false);

        Ok(VcsInfo {
            is_repository: true,
            root_path: self
                .repo
                .workdir()
                .map(|p| p.to_string_lossy().to_string()),
            current_branch: head
                .as_ref()
                .filter(|_| !is_detached)
                .and_then(|h| h.shorthand())
                .map(String::from),
            is_detached_head: is_detached,
            head_commit: head
                .as_ref()
                .and_then(|h| h.target())
                .map(|oid| oid.to_string()),
        })
    }

    fn last_commit_changes(&self) -> Result<Option<Diff>, IndexError> {
        let head = Self::resolve_commit(&self.repo, "HEAD")?;
        let Some(parent) = head.parents().next() else {
            // Root commit has nothing to diff against.
            return Ok(None);
        };

        let changed_files = self.diff_commits(&parent, &head)?;
        debug!("Last commit changed {} files", changed_files.len());

        Ok(Some(Diff {
            source: DiffOrigin::LastCommit,
            previous: Some(parent.id().to_string()),
            head: Some(head.id().to_string()),
            changed_files,
        }))
    }

    fn range_changes(&self, from_ref: &str, to_ref: &str) -> Result<Option<Diff>, IndexError> {
        let from = Self::resolve_commit(&self.repo, from_ref)?;
        let to = Self::resolve_commit(&self.repo, to_ref)?;

        if from.id() == to.id() {
            return Ok(None);
        }

        let changed_files = self.diff_commits(&from, &to)?;
        Ok(Some(Diff {
            source: DiffOrigin::CommitRange,
            previous: Some(from.id().to_string()),
            head: Some(to.id().to_string()),
            changed_files,
        }))
    }

    fn working_directory_changes(&self) -> Result<Diff, IndexError> {
        let head = Self::resolve_commit(&self.repo, "HEAD").ok();
        let head_tree = head.as_ref().and_then(|c| c.tree().ok());

        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))
            .map_err(|e| IndexError::store(format!("Failed workdir diff: {}", e)))?;

        Ok(Diff {
            source: DiffOrigin::WorkingDirectory,
            previous: head.as_ref().map(|c| c.id().to_string()),
            head: None,
            changed_files: Self::collect_changes(&diff),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;

    fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        // Guard against discovery walking up into an enclosing repo by
        // checking the error type only when discovery truly fails.
        if let Err(err) = GitDiffSource::open(dir.path()) {
            assert!(matches!(err, IndexError::NotARepository(_)));
        }
    }

    #[test]
    fn test_last_commit_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        fs::write(dir.path().join("a.ts"), "export const a = 1;\n").unwrap();
        let first = commit_all(&repo, "first");

        fs::write(dir.path().join("b.ts"), "export const b = 2;\n").unwrap();
        let second = commit_all(&repo, "second");

        let source = GitDiffSource::open(dir.path()).unwrap();

        let info = source.info().unwrap();
        assert!(info.is_repository);
        assert_eq!(info.head_commit.as_deref(), Some(second.to_string().as_str()));

        let diff = source.last_commit_changes().unwrap().unwrap();
        assert_eq!(diff.source, DiffOrigin::LastCommit);
        assert_eq!(diff.changed_files.len(), 1);
        assert_eq!(diff.changed_files[0].path, "b.ts");
        assert_eq!(diff.changed_files[0].status, ChangeStatus::Added);

        let range = source
            .range_changes(&first.to_string(), &second.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(range.changed_files.len(), 1);

        // Same endpoints collapse to no diff.
        assert!(source
            .range_changes(&second.to_string(), &second.to_string())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_invalid_ref_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.ts"), "const a = 1;\n").unwrap();
        commit_all(&repo, "first");

        let source = GitDiffSource::open(dir.path()).unwrap();
        let err = source.range_changes("no-such-ref", "HEAD").unwrap_err();
        assert!(matches!(err, IndexError::InvalidRef(_)));
    }

    #[test]
    fn test_rename_detection() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        fs::write(
            dir.path().join("old.ts"),
            "export function stable() { return 42; }\n",
        )
        .unwrap();
        let first = commit_all(&repo, "first");

        fs::rename(dir.path().join("old.ts"), dir.path().join("new.ts")).unwrap();
        let second = commit_all(&repo, "rename");

        let source = GitDiffSource::open(dir.path()).unwrap();
        let diff = source
            .range_changes(&first.to_string(), &second.to_string())
            .unwrap()
            .unwrap();

        let renamed = diff
            .changed_files
            .iter()
            .find(|f| f.status == ChangeStatus::Renamed)
            .expect("rename should be detected");
        assert_eq!(renamed.path, "new.ts");
        assert_eq!(renamed.old_path.as_deref(), Some("old.ts"));
    }
}
