//! Language-aware parsing pipeline: grammar registry, syntax parser, and
//! the entity extractors that turn a tree into a [`ParsedFile`].

pub mod calls;
pub mod comments;
pub mod imports;
pub mod registry;
pub mod symbols;
pub mod syntax;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{hash, Comment, CommentKind, IndexError, Language, ParsedFile, Span};

pub use registry::GrammarRegistry;
pub use syntax::SyntaxParser;

/// Runs the full parser pipeline for one file. Stateless apart from the
/// shared grammar cache; extractors borrow the tree for the duration of the
/// file and never own it.
pub struct FileAnalyzer {
    registry: Arc<GrammarRegistry>,
}

impl FileAnalyzer {
    pub fn new(registry: Arc<GrammarRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Parse and extract one file into its structured document. Extractor
    /// errors are logged and skipped; only a missing grammar or a parser
    /// that yields no tree fail the call.
    pub fn analyze(&self, relative_path: &str, source: &str) -> Result<ParsedFile, IndexError> {
        let language = Language::from_path(Path::new(relative_path));
        if !language.has_grammar() {
            return Err(IndexError::UnsupportedLanguage(
                language.as_str().to_string(),
            ));
        }

        let grammar = self.registry.load(language)?;
        let tree = SyntaxParser::parse(source, &grammar, relative_path)?;
        let errors = SyntaxParser::collect_errors(&tree, source);

        let (mut symbols, extraction_errors) = symbols::extract_symbols(&tree, source, language);
        for message in extraction_errors {
            warn!("Extraction error in {}: {}", relative_path, message);
        }

        let (imports, exports) = imports::extract_imports_exports(&tree, source, language);
        let calls = calls::extract_calls(&tree, source, language);
        let mut comments = comments::extract_comments(&tree, source, language);
        comments::associate(&mut comments, &mut symbols, source);

        // Hashing pass: every symbol gets a semantic hash over its span with
        // comment ranges stripped, so cosmetic comment edits do not move it.
        let comment_spans: Vec<Span> = comments
            .iter()
            .filter(|c| c.kind != CommentKind::Docstring)
            .map(|c| c.span)
            .collect();
        for symbol in symbols.iter_mut() {
            let text = strip_comment_ranges(source, symbol.span(), &comment_spans);
            let text = if symbol.kind().is_callable() {
                strip_leading_doc(&text)
            } else {
                text
            };
            symbol.set_hash(hash::semantic_hash(&text));
        }

        debug!(
            "Analyzed {} ({}): {} symbols, {} imports, {} calls, {} errors",
            relative_path,
            language,
            symbols.len(),
            imports.len(),
            calls.len(),
            errors.len()
        );

        Ok(ParsedFile::new(
            relative_path.to_string(),
            language,
            hash::hash(source),
            symbols,
            imports,
            exports,
            calls,
            comments,
            errors,
        ))
    }
}

/// Slice a span out of the source with every comment range inside it
/// removed. Used for semantic symbol hashes and chunk bodies.
pub fn strip_comment_ranges(source: &str, span: &Span, comment_spans: &[Span]) -> String {
    let start = span.start_byte.min(source.len());
    let end = span.end_byte.min(source.len());

    let mut text = String::with_capacity(end - start);
    let mut position = start;
    for comment in comment_spans {
        if comment.start_byte >= end || comment.end_byte <= start {
            continue;
        }
        let comment_start = comment.start_byte.max(position);
        if comment_start > position {
            text.push_str(&source[position..comment_start]);
        }
        position = comment.end_byte.min(end);
    }
    if position < end {
        text.push_str(&source[position..end]);
    }
    text
}

/// Comment-stripped body text for a chunk, shared with the chunker so chunk
/// hashes obey the same invariance as symbol hashes.
pub fn chunk_body_text(source: &str, span: &Span, comments: &[Comment]) -> String {
    let comment_spans: Vec<Span> = comments
        .iter()
        .filter(|c| c.kind != CommentKind::Docstring)
        .map(|c| c.span)
        .collect();
    strip_comment_ranges(source, span, &comment_spans)
}

fn strip_leading_doc(text: &str) -> String {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("/**") {
        if let Some(end) = rest.find("*/") {
            return rest[end + 2..].trim_start().to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> FileAnalyzer {
        FileAnalyzer::new(Arc::new(GrammarRegistry::new()))
    }

    #[test]
    fn test_analyze_typescript_file() {
        let source = r#"
/** Adds. */
export function add(a: number, b: number): number {
  return a + b;
}
"#;
        let parsed = analyzer().analyze("src/math.ts", source).unwrap();
        assert_eq!(parsed.language(), Language::TypeScript);
        assert_eq!(parsed.symbols().len(), 1);
        assert_eq!(parsed.file_hash().len(), 64);

        let add = &parsed.symbols()[0];
        assert_eq!(add.name(), "add");
        assert_eq!(add.hash().len(), 16);
        assert_eq!(add.documentation(), Some("Adds."));
    }

    #[test]
    fn test_unsupported_language() {
        let err = analyzer().analyze("README.md", "# readme").unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_hash_stable_across_parses() {
        let source = "function f() { return 1; }\nfunction g() { return 2; }\n";
        let a = analyzer().analyze("a.js", source).unwrap();
        let b = analyzer().analyze("a.js", source).unwrap();
        let hashes_a: Vec<&str> = a.symbols().iter().map(|s| s.hash()).collect();
        let hashes_b: Vec<&str> = b.symbols().iter().map(|s| s.hash()).collect();
        assert_eq!(hashes_a, hashes_b);
    }

    #[test]
    fn test_hash_ignores_interior_comments() {
        let with_line = "function f() {\n  // note\n  return 1;\n}\n";
        let with_block = "function f() {\n  /* note */\n  return 1;\n}\n";
        let a = analyzer().analyze("a.js", with_line).unwrap();
        let b = analyzer().analyze("a.js", with_block).unwrap();
        assert_eq!(a.symbols()[0].hash(), b.symbols()[0].hash());
    }

    #[test]
    fn test_hash_changes_on_body_edit() {
        let before = "function f() { return 1; }\n";
        let after = "function f() { return 2; }\n";
        let a = analyzer().analyze("a.js", before).unwrap();
        let b = analyzer().analyze("a.js", after).unwrap();
        assert_ne!(a.symbols()[0].hash(), b.symbols()[0].hash());
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        let parsed = analyzer().analyze("empty.ts", "").unwrap();
        assert!(parsed.symbols().is_empty());

        let parsed = analyzer().analyze("only.ts", "// nothing here\n").unwrap();
        assert!(parsed.symbols().is_empty());
        assert_eq!(parsed.comments().len(), 1);
    }

    #[test]
    fn test_strip_comment_ranges() {
        let source = "abc/* x */def";
        let span = Span::new(1, 0, 1, 13, 0, 13);
        let comment = Span::new(1, 3, 1, 10, 3, 10);
        assert_eq!(strip_comment_ranges(source, &span, &[comment]), "abcdef");
    }
}
