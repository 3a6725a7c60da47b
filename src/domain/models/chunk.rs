use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Language, Span};

/// Represents the kind of code a chunk was promoted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkKind {
    Function,
    AsyncFunction,
    Generator,
    Method,
    AsyncMethod,
    Constructor,
    Property,
    Module,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::AsyncFunction => "async-function",
            ChunkKind::Generator => "generator",
            ChunkKind::Method => "method",
            ChunkKind::AsyncMethod => "async-method",
            ChunkKind::Constructor => "constructor",
            ChunkKind::Property => "property",
            ChunkKind::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => ChunkKind::Function,
            "async-function" => ChunkKind::AsyncFunction,
            "generator" => ChunkKind::Generator,
            "method" => ChunkKind::Method,
            "async-method" => ChunkKind::AsyncMethod,
            "constructor" => ChunkKind::Constructor,
            "property" => ChunkKind::Property,
            _ => ChunkKind::Module,
        }
    }

    pub fn is_callable(&self) -> bool {
        !matches!(self, ChunkKind::Module | ChunkKind::Property)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a chunk sits in its file: enclosing class, module path, namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkContext {
    pub class_name: Option<String>,
    pub class_inheritance: Vec<String>,
    /// Dotted module path derived from the repo-relative file path; never
    /// null on a self-contained chunk.
    pub module_path: Option<String>,
    pub namespace: Option<String>,
    pub method_signature: Option<String>,
    pub is_top_level: bool,
    pub parent_chunk_hash: Option<String>,
}

/// A self-contained unit of code persisted with hash, context, and
/// documentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Surrogate id assigned on first persistence.
    id: String,
    file_path: String,
    kind: ChunkKind,
    name: String,
    content: String,
    normalized_content: String,
    span: Span,
    language: Language,
    context: ChunkContext,
    documentation: Option<String>,
    signature: Option<String>,
    /// 64-hex digest over (documentation, signature, normalized body).
    chunk_hash: String,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: String,
        kind: ChunkKind,
        name: String,
        content: String,
        normalized_content: String,
        span: Span,
        language: Language,
        context: ChunkContext,
        documentation: Option<String>,
        signature: Option<String>,
        chunk_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_path,
            kind,
            name,
            content,
            normalized_content,
            span,
            language,
            context,
            documentation,
            signature,
            chunk_hash,
        }
    }

    /// Reconstitutes from persisted data (used by the store).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        file_path: String,
        kind: ChunkKind,
        name: String,
        content: String,
        normalized_content: String,
        span: Span,
        language: Language,
        context: ChunkContext,
        documentation: Option<String>,
        signature: Option<String>,
        chunk_hash: String,
    ) -> Self {
        Self {
            id,
            file_path,
            kind,
            name,
            content,
            normalized_content,
            span,
            language,
            context,
            documentation,
            signature,
            chunk_hash,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn normalized_content(&self) -> &str {
        &self.normalized_content
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn context(&self) -> &ChunkContext {
        &self.context
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn chunk_hash(&self) -> &str {
        &self.chunk_hash
    }

    pub fn line_count(&self) -> u32 {
        self.span.line_count()
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    pub fn start_line(&self) -> u32 {
        self.span.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.span.end_line
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.span.start_line, self.span.end_line)
    }

    /// Text sent to the embedding provider: signature, documentation, and
    /// normalized body.
    pub fn embedding_text(&self) -> String {
        let mut text = String::new();
        if let Some(sig) = &self.signature {
            text.push_str(sig);
            text.push('\n');
        }
        if let Some(doc) = &self.documentation {
            text.push_str(doc);
            text.push('\n');
        }
        text.push_str(&self.normalized_content);
        text
    }

    /// A chunk is self-contained when it has a name, content, a 64-hex
    /// hash, a module path, and (for public callable kinds) a signature.
    pub fn is_self_contained(&self) -> bool {
        if self.name.is_empty() || self.content.is_empty() {
            return false;
        }
        if self.chunk_hash.len() != 64 || !self.chunk_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        if self.context.module_path.is_none() {
            return false;
        }
        if self.kind.is_callable() && self.signature.is_none() {
            return false;
        }
        true
    }

    pub fn preview(&self, max_lines: usize) -> String {
        self.content
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash;

    fn sample_chunk() -> Chunk {
        let content = "function add(a, b) {\n  return a + b;\n}";
        Chunk::new(
            "src/math.ts".to_string(),
            ChunkKind::Function,
            "add".to_string(),
            content.to_string(),
            hash::normalize(content),
            Span::new(1, 0, 3, 1, 0, content.len()),
            Language::TypeScript,
            ChunkContext {
                module_path: Some("src.math".to_string()),
                is_top_level: true,
                ..Default::default()
            },
            None,
            Some("function add(a, b)".to_string()),
            hash::hash_parts(&[None, Some("function add(a, b)"), Some(content)]),
        )
    }

    #[test]
    fn test_self_containment() {
        let chunk = sample_chunk();
        assert!(chunk.is_self_contained());
        assert_eq!(chunk.line_count(), 3);
        assert_eq!(chunk.location(), "src/math.ts:1-3");
    }

    #[test]
    fn test_missing_module_path_fails_containment() {
        let mut chunk = sample_chunk();
        chunk.context.module_path = None;
        assert!(!chunk.is_self_contained());
    }

    #[test]
    fn test_callable_without_signature_fails_containment() {
        let mut chunk = sample_chunk();
        chunk.signature = None;
        assert!(!chunk.is_self_contained());
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [
            ChunkKind::Function,
            ChunkKind::AsyncFunction,
            ChunkKind::Generator,
            ChunkKind::Method,
            ChunkKind::AsyncMethod,
            ChunkKind::Constructor,
            ChunkKind::Property,
            ChunkKind::Module,
        ] {
            assert_eq!(ChunkKind::parse(kind.as_str()), kind);
        }
    }
}
