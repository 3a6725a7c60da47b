use serde::{Deserialize, Serialize};

use super::{CallSite, Comment, Export, Import, Language, Span, Symbol};

/// How the parser recovered around one error region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRecovery {
    pub recovered: bool,
    pub strategy: String,
    /// Symbols successfully extracted after the error region.
    pub symbols_after_error: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseErrorRecord {
    pub message: String,
    pub span: Span,
    /// Always "error"; kept explicit so the persisted document is
    /// self-describing.
    pub severity: String,
    pub recovery: ParseRecovery,
}

impl ParseErrorRecord {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            severity: "error".to_string(),
            recovery: ParseRecovery {
                recovered: false,
                strategy: "none".to_string(),
                symbols_after_error: 0,
            },
        }
    }
}

/// The structured document produced for one file by the parser pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    path: String,
    language: Language,
    /// 64-hex content hash of the whole file.
    file_hash: String,
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
    exports: Vec<Export>,
    calls: Vec<CallSite>,
    comments: Vec<Comment>,
    errors: Vec<ParseErrorRecord>,
}

impl ParsedFile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: String,
        language: Language,
        file_hash: String,
        symbols: Vec<Symbol>,
        imports: Vec<Import>,
        exports: Vec<Export>,
        calls: Vec<CallSite>,
        comments: Vec<Comment>,
        errors: Vec<ParseErrorRecord>,
    ) -> Self {
        Self {
            path,
            language,
            file_hash,
            symbols,
            imports,
            exports,
            calls,
            comments,
            errors,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut [Symbol] {
        &mut self.symbols
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn calls(&self) -> &[CallSite] {
        &self.calls
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn errors(&self) -> &[ParseErrorRecord] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Symbols that can become standalone chunks.
    pub fn callable_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.kind().is_callable())
    }
}
