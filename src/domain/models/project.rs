use std::path::{Path, PathBuf};

/// On-disk layout of a project's index state directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

pub const STATE_DIR_NAME: &str = ".codeindex";

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR_NAME)
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir().join("index.db")
    }

    pub fn ast_dir(&self) -> PathBuf {
        self.state_dir().join("ast")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.json")
    }

    pub fn ranking_config_path(&self) -> PathBuf {
        self.state_dir().join("ranking-config.json")
    }

    pub fn is_initialized(&self) -> bool {
        self.db_path().exists()
    }

    /// Create the state directory tree.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.state_dir())?;
        std::fs::create_dir_all(self.ast_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Convert a repo-relative file path to a dotted module path
    /// (`src/utils/math.ts` → `src.utils.math`).
    pub fn module_path_for(relative_path: &str) -> String {
        let without_ext = match relative_path.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => relative_path,
        };
        without_ext
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}
