use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Line,
    Block,
    Jsdoc,
    Docstring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocParam {
    pub name: String,
    pub description: String,
}

/// Structured documentation parsed out of a JSDoc block or docstring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub description: String,
    pub params: Vec<DocParam>,
    pub returns: Option<String>,
    pub throws: Vec<String>,
    pub examples: Vec<String>,
    /// Remaining `@tag value` pairs not covered by the fields above.
    pub tags: BTreeMap<String, String>,
}

impl Documentation {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.throws.is_empty()
            && self.examples.is_empty()
            && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub kind: CommentKind,
    pub span: Span,
    /// Name of the symbol this comment documents, when associated.
    pub associated_symbol: Option<String>,
    pub documentation: Option<Documentation>,
}

impl Comment {
    pub fn new(text: impl Into<String>, kind: CommentKind, span: Span) -> Self {
        Self {
            text: text.into(),
            kind,
            span,
            associated_symbol: None,
            documentation: None,
        }
    }

    pub fn is_documentation(&self) -> bool {
        matches!(self.kind, CommentKind::Jsdoc | CommentKind::Docstring)
    }
}
