//! # code-index
//!
//! Indexes a source repository into a queryable store supporting symbol
//! lookup, structural navigation, and hybrid lexical+semantic search over
//! code chunks. An initial full index is followed by cheap per-change
//! refreshes driven by filesystem mtimes or VCS diffs.
//!
//! ## Architecture
//!
//! - `domain`: core models, content hashing, and the error taxonomy
//! - `application`: chunker, symbol index, hybrid index + ranker,
//!   incremental indexer, and interface traits
//! - `connector`: tree-sitter parsing, SQLite store (FTS5 + sqlite-vec),
//!   git diffing, ignore evaluation, and embedding providers

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
