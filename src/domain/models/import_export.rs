use serde::{Deserialize, Serialize};

use super::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    SideEffect,
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Declaration,
    Named,
    Default,
    Namespace,
}

/// One name bound by an import: `import { imported as local }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

impl ImportSpecifier {
    pub fn new(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            imported: imported.into(),
            local: local.into(),
        }
    }

    /// Specifier without renaming: `import { x }`.
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            imported: name.clone(),
            local: name,
        }
    }
}

/// One name re-exposed by an export: `export { local as exported }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

impl ExportSpecifier {
    pub fn new(local: impl Into<String>, exported: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            exported: exported.into(),
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            local: name.clone(),
            exported: name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub kind: ImportKind,
    /// Module path string, or None for bare `require(expr)` forms.
    pub source: Option<String>,
    pub specifiers: Vec<ImportSpecifier>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Export {
    pub kind: ExportKind,
    /// Re-export source (`export ... from "mod"`), when present.
    pub source: Option<String>,
    pub specifiers: Vec<ExportSpecifier>,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_specifiers() {
        let spec = ImportSpecifier::plain("useState");
        assert_eq!(spec.imported, "useState");
        assert_eq!(spec.local, "useState");

        let spec = ExportSpecifier::new("internal", "public");
        assert_eq!(spec.local, "internal");
        assert_eq!(spec.exported, "public");
    }
}
