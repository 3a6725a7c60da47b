use serde::{Deserialize, Serialize};

use crate::domain::IndexError;

/// VCS status of one changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl ChangeStatus {
    /// Parse a porcelain status code (`A`, `M`, `D`, `R<sim>`, `C<sim>`,
    /// `T`, `U`, `?`).
    pub fn parse(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => ChangeStatus::Added,
            Some('M') => ChangeStatus::Modified,
            Some('D') => ChangeStatus::Deleted,
            Some('R') => ChangeStatus::Renamed,
            Some('C') => ChangeStatus::Copied,
            Some('T') => ChangeStatus::TypeChanged,
            Some('U') => ChangeStatus::Unmerged,
            _ => ChangeStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    /// Old path for renames and copies.
    pub old_path: Option<String>,
    pub status: ChangeStatus,
    /// Rename/copy similarity percentage, when reported.
    pub similarity: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOrigin {
    LastCommit,
    CommitRange,
    WorkingDirectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    pub source: DiffOrigin,
    pub previous: Option<String>,
    pub head: Option<String>,
    pub changed_files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsInfo {
    pub is_repository: bool,
    pub root_path: Option<String>,
    pub current_branch: Option<String>,
    pub is_detached_head: bool,
    pub head_commit: Option<String>,
}

/// Parsed `a..b` / `a...b` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRange {
    pub from: String,
    pub to: String,
}

/// Adapter exposing "changed files between refs" from the version control
/// system. Implementations validate refs before querying; an invalid ref is
/// an error, never an empty diff.
pub trait DiffSource: Send + Sync {
    fn info(&self) -> Result<VcsInfo, IndexError>;

    /// Files changed by the most recent commit, or `None` when the
    /// repository has no parent commit to diff against.
    fn last_commit_changes(&self) -> Result<Option<Diff>, IndexError>;

    fn range_changes(&self, from_ref: &str, to_ref: &str) -> Result<Option<Diff>, IndexError>;

    fn working_directory_changes(&self) -> Result<Diff, IndexError>;
}

/// Split `a..b` or `a...b` into its endpoints.
pub fn parse_range(range: &str) -> Option<RefRange> {
    let (from, to) = if let Some((from, to)) = range.split_once("...") {
        (from, to)
    } else if let Some((from, to)) = range.split_once("..") {
        (from, to)
    } else {
        return None;
    };

    if from.is_empty() || to.is_empty() || to.starts_with('.') {
        return None;
    }
    Some(RefRange {
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(ChangeStatus::parse("A"), ChangeStatus::Added);
        assert_eq!(ChangeStatus::parse("R100"), ChangeStatus::Renamed);
        assert_eq!(ChangeStatus::parse("C75"), ChangeStatus::Copied);
        assert_eq!(ChangeStatus::parse("?"), ChangeStatus::Unknown);
        assert_eq!(ChangeStatus::parse(""), ChangeStatus::Unknown);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("main..feature"),
            Some(RefRange {
                from: "main".to_string(),
                to: "feature".to_string()
            })
        );
        assert_eq!(
            parse_range("a...b"),
            Some(RefRange {
                from: "a".to_string(),
                to: "b".to_string()
            })
        );
        assert_eq!(parse_range("HEAD~3..HEAD").unwrap().from, "HEAD~3");
        assert!(parse_range("noseparator").is_none());
        assert!(parse_range("..b").is_none());
        assert!(parse_range("a..").is_none());
    }
}
