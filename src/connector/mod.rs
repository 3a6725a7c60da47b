//! # Connector Layer
//!
//! External integrations: tree-sitter parsing, the SQLite store, git
//! diffing, ignore evaluation, and embedding providers.

pub mod embedding;
pub mod git;
pub mod ignore_filter;
pub mod parser;
pub mod store;

pub use embedding::*;
pub use git::GitDiffSource;
pub use ignore_filter::IgnoreFilter;
pub use parser::{FileAnalyzer, GrammarRegistry, SyntaxParser};
pub use store::{AstStore, ChunkQuery, IndexStore, StoreStats};
