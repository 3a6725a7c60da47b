use tree_sitter::{Node, Parser, Tree};

use crate::domain::{IndexError, ParseErrorRecord, ParseRecovery, Span};

/// Thin wrapper around the tree-sitter parser. Never panics on ill-formed
/// input; error regions are reported as records while the valid prefix and
/// resynchronized regions remain traversable.
pub struct SyntaxParser;

impl SyntaxParser {
    /// Parse `source` with `grammar`. Returns `ParseFailure` only when the
    /// parser yields no tree at all (cancellation or grammar mismatch);
    /// trees containing error nodes are normal output.
    pub fn parse(
        source: &str,
        grammar: &tree_sitter::Language,
        path: &str,
    ) -> Result<Tree, IndexError> {
        let mut parser = Parser::new();
        parser
            .set_language(grammar)
            .map_err(|e| IndexError::parse(path, format!("failed to set language: {}", e)))?;

        parser
            .parse(source, None)
            .ok_or_else(|| IndexError::parse(path, "parser returned no tree"))
    }

    /// Span of a node in the coordinate system of the data model
    /// (1-indexed lines, 0-indexed columns, half-open byte range).
    pub fn span_of(node: &Node) -> Span {
        Span::new(
            node.start_position().row as u32 + 1,
            node.start_position().column as u32,
            node.end_position().row as u32 + 1,
            node.end_position().column as u32,
            node.start_byte(),
            node.end_byte(),
        )
    }

    /// Collect one record per error region in the tree. Recovery metadata
    /// counts named symbol-bearing nodes appearing after the error, which
    /// tells callers whether the parser resynchronized.
    pub fn collect_errors(tree: &Tree, source: &str) -> Vec<ParseErrorRecord> {
        let mut errors = Vec::new();
        let mut stack = vec![tree.root_node()];

        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let span = Self::span_of(&node);
                let message = if node.is_missing() {
                    format!("missing {}", node.kind())
                } else {
                    let excerpt: String = source
                        [span.start_byte..span.end_byte.min(span.start_byte + 40)]
                        .chars()
                        .take(40)
                        .collect();
                    format!("unexpected input near '{}'", excerpt.trim())
                };

                let symbols_after = Self::count_named_after(tree, node.end_byte());
                let mut record = ParseErrorRecord::new(message, span);
                record.recovery = ParseRecovery {
                    recovered: symbols_after > 0,
                    strategy: if node.is_missing() {
                        "inserted-missing".to_string()
                    } else {
                        "skip-to-sync".to_string()
                    },
                    symbols_after_error: symbols_after,
                };
                errors.push(record);
                // Do not descend into error subtrees; one record per region.
                continue;
            }

            if node.has_error() {
                for i in (0..node.child_count()).rev() {
                    if let Some(child) = node.child(i) {
                        stack.push(child);
                    }
                }
            }
        }

        errors.sort_by_key(|e| e.span.start_byte);
        errors
    }

    fn count_named_after(tree: &Tree, byte: usize) -> usize {
        let root = tree.root_node();
        let mut count = 0;
        for i in 0..root.named_child_count() {
            if let Some(child) = root.named_child(i) {
                if child.start_byte() >= byte && !child.is_error() && !child.is_extra() {
                    count += 1;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::parser::GrammarRegistry;
    use crate::domain::Language;

    fn parse(source: &str, language: Language) -> Tree {
        let registry = GrammarRegistry::new();
        let grammar = registry.load(language).unwrap();
        SyntaxParser::parse(source, &grammar, "test").unwrap()
    }

    #[test]
    fn test_parse_clean_source() {
        let tree = parse("const x = 1;\n", Language::TypeScript);
        assert!(!tree.root_node().has_error());
        assert!(SyntaxParser::collect_errors(&tree, "const x = 1;\n").is_empty());
    }

    #[test]
    fn test_error_at_first_token_still_yields_tree() {
        let source = "%%%\nfunction ok() { return 1; }\n";
        let tree = parse(source, Language::JavaScript);
        let errors = SyntaxParser::collect_errors(&tree, source);
        assert!(!errors.is_empty());
        // The function after the error region is reachable.
        assert!(errors.iter().any(|e| e.recovery.symbols_after_error > 0));
    }

    #[test]
    fn test_empty_input() {
        let tree = parse("", Language::Python);
        assert!(SyntaxParser::collect_errors(&tree, "").is_empty());
    }

    #[test]
    fn test_span_coordinates() {
        let source = "def f():\n    pass\n";
        let tree = parse(source, Language::Python);
        let span = SyntaxParser::span_of(&tree.root_node().named_child(0).unwrap());
        assert_eq!(span.start_line, 1);
        assert_eq!(span.start_column, 0);
        assert_eq!(span.start_byte, 0);
    }
}
