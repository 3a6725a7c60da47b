use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::connector::parser::{chunk_body_text, comments::clean_comment_text};
use crate::domain::{
    hash, Chunk, ChunkContext, ChunkKind, CommentKind, ParsedFile, ProjectLayout, Span, Symbol,
    SymbolKind,
};

/// Lines above which a chunk is emitted with a warning.
const LARGE_CHUNK_LINES: u32 = 5_000;

/// Promotes parser output into self-contained, hashable chunks: one per
/// top-level function and per method, plus a single module chunk for files
/// with no callable symbols.
pub struct Chunker;

impl Chunker {
    /// Chunk one parsed file. Always returns at least one chunk.
    pub fn chunk_file(parsed: &ParsedFile, source: &str) -> Vec<Chunk> {
        let module_path = ProjectLayout::module_path_for(parsed.path());

        let candidates: Vec<&Symbol> = parsed
            .symbols()
            .iter()
            .filter(|s| s.kind().is_callable())
            .collect();

        // Nested callables stay inside their parent's chunk.
        let promoted: Vec<&Symbol> = candidates
            .iter()
            .filter(|symbol| {
                !candidates.iter().any(|other| {
                    other.span() != symbol.span() && other.span().encloses(symbol.span())
                })
            })
            .copied()
            .collect();

        if promoted.is_empty() {
            return vec![Self::module_chunk(parsed, source, &module_path)];
        }

        let kind_by_name: HashMap<&str, SymbolKind> = parsed
            .symbols()
            .iter()
            .map(|s| (s.name(), s.kind()))
            .collect();
        let class_signatures: HashMap<&str, &str> = parsed
            .symbols()
            .iter()
            .filter(|s| s.kind() == SymbolKind::Class)
            .filter_map(|s| s.signature().map(|sig| (s.name(), sig)))
            .collect();

        let mut chunks = Vec::with_capacity(promoted.len());
        let mut seen_hashes: HashSet<String> = HashSet::new();

        for symbol in promoted {
            let chunk = Self::symbol_chunk(
                parsed,
                source,
                symbol,
                &module_path,
                &kind_by_name,
                &class_signatures,
            );
            if chunk.line_count() > LARGE_CHUNK_LINES {
                warn!(
                    "Large chunk {} in {} ({} lines)",
                    chunk.name(),
                    parsed.path(),
                    chunk.line_count()
                );
            }
            // A function repeated verbatim in one file maps to one chunk row.
            if seen_hashes.insert(chunk.chunk_hash().to_string()) {
                chunks.push(chunk);
            }
        }

        chunks
    }

    fn symbol_chunk(
        parsed: &ParsedFile,
        source: &str,
        symbol: &Symbol,
        module_path: &str,
        kind_by_name: &HashMap<&str, SymbolKind>,
        class_signatures: &HashMap<&str, &str>,
    ) -> Chunk {
        let span = *symbol.span();
        let content = source[span.start_byte.min(source.len())..span.end_byte.min(source.len())]
            .to_string();
        let body = chunk_body_text(source, &span, parsed.comments());
        let documentation = symbol.documentation().map(String::from);
        let signature = symbol.signature().map(String::from);

        let class_name = symbol
            .parents()
            .iter()
            .rev()
            .find(|p| kind_by_name.get(p.as_str()) == Some(&SymbolKind::Class))
            .cloned();
        let class_inheritance = class_name
            .as_deref()
            .and_then(|name| class_signatures.get(name))
            .map(|sig| crate::connector::parser::symbols::inheritance_from_signature(sig))
            .unwrap_or_default();
        let namespace_chain: Vec<&str> = symbol
            .parents()
            .iter()
            .filter(|p| kind_by_name.get(p.as_str()) == Some(&SymbolKind::Namespace))
            .map(String::as_str)
            .collect();

        let kind = Self::chunk_kind(symbol);
        let context = ChunkContext {
            class_name,
            class_inheritance,
            module_path: Some(module_path.to_string()),
            namespace: if namespace_chain.is_empty() {
                None
            } else {
                Some(namespace_chain.join("."))
            },
            method_signature: if kind == ChunkKind::Method
                || kind == ChunkKind::AsyncMethod
                || kind == ChunkKind::Constructor
            {
                signature.clone()
            } else {
                None
            },
            is_top_level: symbol.parents().is_empty(),
            parent_chunk_hash: None,
        };

        let chunk_hash = hash::hash_parts(&[
            documentation.as_deref(),
            signature.as_deref(),
            Some(body.as_str()),
        ]);

        Chunk::new(
            parsed.path().to_string(),
            kind,
            symbol.name().to_string(),
            content,
            hash::normalize(&body),
            span,
            parsed.language(),
            context,
            documentation,
            signature,
            chunk_hash,
        )
    }

    fn chunk_kind(symbol: &Symbol) -> ChunkKind {
        let meta = symbol.metadata();
        match symbol.kind() {
            SymbolKind::Method => {
                if symbol.name() == "constructor" || symbol.name() == "__init__" {
                    ChunkKind::Constructor
                } else if meta.is_async {
                    ChunkKind::AsyncMethod
                } else {
                    ChunkKind::Method
                }
            }
            _ => {
                if meta.is_generator {
                    ChunkKind::Generator
                } else if meta.is_async {
                    ChunkKind::AsyncFunction
                } else {
                    ChunkKind::Function
                }
            }
        }
    }

    /// Fallback chunk covering the whole file when nothing callable exists.
    fn module_chunk(parsed: &ParsedFile, source: &str, module_path: &str) -> Chunk {
        let line_count = source.lines().count().max(1) as u32;
        let span = Span::new(1, 0, line_count, 0, 0, source.len());
        let body = chunk_body_text(source, &span, parsed.comments());

        let name = module_path
            .rsplit('.')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("module")
            .to_string();

        // File-leading documentation: module docstring or a leading doc
        // comment, when present.
        let documentation = parsed
            .comments()
            .iter()
            .find(|c| {
                c.span.start_line == 1
                    && matches!(
                        c.kind,
                        CommentKind::Docstring | CommentKind::Jsdoc | CommentKind::Block
                    )
            })
            .map(|c| {
                if c.kind == CommentKind::Docstring {
                    c.text.clone()
                } else {
                    clean_comment_text(&c.text)
                }
            });

        let chunk_hash = hash::hash_parts(&[documentation.as_deref(), None, Some(body.as_str())]);

        Chunk::new(
            parsed.path().to_string(),
            ChunkKind::Module,
            name,
            source.to_string(),
            hash::normalize(&body),
            span,
            parsed.language(),
            ChunkContext {
                module_path: Some(module_path.to_string()),
                is_top_level: true,
                ..Default::default()
            },
            documentation,
            None,
            chunk_hash,
        )
    }

    /// Share of chunks that satisfy the self-containment rules; the
    /// repository-level target is ≥0.95.
    pub fn self_containment_rate(chunks: &[Chunk]) -> f64 {
        if chunks.is_empty() {
            return 1.0;
        }
        let contained = chunks.iter().filter(|c| c.is_self_contained()).count();
        contained as f64 / chunks.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::parser::{FileAnalyzer, GrammarRegistry};
    use std::sync::Arc;

    fn chunk(source: &str, path: &str) -> Vec<Chunk> {
        let analyzer = FileAnalyzer::new(Arc::new(GrammarRegistry::new()));
        let parsed = analyzer.analyze(path, source).unwrap();
        Chunker::chunk_file(&parsed, source)
    }

    #[test]
    fn test_function_and_method_chunks() {
        let source = r#"
/** Doubles x. */
export function double(x: number): number {
  return x * 2;
}

class Greeter extends Base {
  constructor(private name: string) {}

  async greet(): Promise<string> {
    return `hi ${this.name}`;
  }
}
"#;
        let chunks = chunk(source, "src/app/greeter.ts");
        let names: Vec<&str> = chunks.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"double"));
        assert!(names.contains(&"constructor"));
        assert!(names.contains(&"greet"));

        let double = chunks.iter().find(|c| c.name() == "double").unwrap();
        assert_eq!(double.kind(), ChunkKind::Function);
        assert_eq!(double.documentation(), Some("Doubles x."));
        assert!(double.context().is_top_level);
        assert_eq!(
            double.context().module_path.as_deref(),
            Some("src.app.greeter")
        );

        let greet = chunks.iter().find(|c| c.name() == "greet").unwrap();
        assert_eq!(greet.kind(), ChunkKind::AsyncMethod);
        assert_eq!(greet.context().class_name.as_deref(), Some("Greeter"));
        assert_eq!(greet.context().class_inheritance, vec!["Base".to_string()]);
        assert!(greet.context().method_signature.is_some());

        let ctor = chunks.iter().find(|c| c.name() == "constructor").unwrap();
        assert_eq!(ctor.kind(), ChunkKind::Constructor);
    }

    #[test]
    fn test_module_chunk_for_no_callables() {
        let source = "const A = 1;\nconst B = 2;\n";
        let chunks = chunk(source, "src/constants.ts");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), ChunkKind::Module);
        assert_eq!(chunks[0].name(), "constants");
        assert!(chunks[0].is_self_contained());
    }

    #[test]
    fn test_empty_file_still_gets_module_chunk() {
        let chunks = chunk("", "src/empty.ts");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), ChunkKind::Module);
    }

    #[test]
    fn test_nested_function_not_promoted() {
        let source = r#"
function outer() {
  function inner() { return 1; }
  return inner();
}
"#;
        let chunks = chunk(source, "src/nested.js");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name(), "outer");
    }

    #[test]
    fn test_chunk_hash_ignores_comment_swaps() {
        let with_line = "function f() {\n  // note\n  return 1;\n}\n";
        let with_block = "function f() {\n  /* note */  return 1;\n}\n";
        let a = chunk(with_line, "a.js");
        let b = chunk(with_block, "a.js");
        assert_eq!(a[0].chunk_hash(), b[0].chunk_hash());
    }

    #[test]
    fn test_chunk_hash_tracks_documentation() {
        let documented = "/** One. */\nfunction f() { return 1; }\n";
        let redocumented = "/** Two. */\nfunction f() { return 1; }\n";
        let a = chunk(documented, "a.js");
        let b = chunk(redocumented, "a.js");
        assert_ne!(a[0].chunk_hash(), b[0].chunk_hash());
    }

    #[test]
    fn test_identical_functions_dedup_within_file() {
        let source = "function f(x) { return x; }\n";
        let twice = format!("{}\n{}", source, source);
        let chunks = chunk(&twice, "a.js");
        // Same name, same body: one chunk survives.
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_python_docstring_becomes_documentation() {
        let source = "def f():\n    \"\"\"Doc line.\"\"\"\n    return 1\n";
        let chunks = chunk(source, "pkg/mod.py");
        assert_eq!(chunks[0].documentation(), Some("Doc line."));
    }

    #[test]
    fn test_self_containment_rate() {
        let chunks = chunk("function a() {}\nfunction b() { return 2; }\n", "a.js");
        assert!(Chunker::self_containment_rate(&chunks) >= 0.95);
    }
}
