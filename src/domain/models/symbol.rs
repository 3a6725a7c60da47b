use serde::{Deserialize, Serialize};

use super::Span;

/// Represents the kind of a named syntactic entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Enum,
    Constant,
    Variable,
    Property,
    Module,
    Namespace,
    Import,
    Export,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Constant => "constant",
            SymbolKind::Variable => "variable",
            SymbolKind::Property => "property",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "type" => Some(SymbolKind::Type),
            "enum" => Some(SymbolKind::Enum),
            "constant" => Some(SymbolKind::Constant),
            "variable" => Some(SymbolKind::Variable),
            "property" => Some(SymbolKind::Property),
            "module" => Some(SymbolKind::Module),
            "namespace" => Some(SymbolKind::Namespace),
            "import" => Some(SymbolKind::Import),
            "export" => Some(SymbolKind::Export),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modifier flags scanned off a symbol's declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub exported: bool,
    pub visibility: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_generator: bool,
    pub type_annotation: Option<String>,
    pub decorators: Vec<String>,
}

/// A named syntactic entity discovered by the parser pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
    span: Span,
    /// Enclosing symbol names, outer → inner.
    parents: Vec<String>,
    signature: Option<String>,
    documentation: Option<String>,
    metadata: SymbolMetadata,
    /// 16-hex semantic content hash; set by the hashing pass after
    /// extraction and non-empty on every persisted symbol.
    hash: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            parents: Vec::new(),
            signature: None,
            documentation: None,
            metadata: SymbolMetadata::default(),
            hash: String::new(),
        }
    }

    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_metadata(mut self, metadata: SymbolMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn set_documentation(&mut self, documentation: impl Into<String>) {
        self.documentation = Some(documentation.into());
    }

    pub fn set_kind(&mut self, kind: SymbolKind) {
        self.kind = kind;
    }

    pub fn set_hash(&mut self, hash: impl Into<String>) {
        self.hash = hash.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn metadata(&self) -> &SymbolMetadata {
        &self.metadata
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `Outer.Inner.name` path built from the parent chain.
    pub fn qualified_name(&self) -> String {
        if self.parents.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.parents.join("."), self.name)
        }
    }

    /// True when this symbol is nested inside a class-like parent.
    pub fn has_parent(&self) -> bool {
        !self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_builder() {
        let mut sym = Symbol::new("add", SymbolKind::Function, Span::default())
            .with_signature("function add(a, b)")
            .with_parents(vec!["Calculator".to_string()]);
        sym.set_hash("0011223344556677");

        assert_eq!(sym.name(), "add");
        assert_eq!(sym.qualified_name(), "Calculator.add");
        assert_eq!(sym.signature(), Some("function add(a, b)"));
        assert_eq!(sym.hash(), "0011223344556677");
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Type,
            SymbolKind::Enum,
            SymbolKind::Constant,
            SymbolKind::Variable,
            SymbolKind::Property,
            SymbolKind::Module,
            SymbolKind::Namespace,
            SymbolKind::Import,
            SymbolKind::Export,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("struct"), None);
    }
}
