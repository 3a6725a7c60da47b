//! # Application Layer
//!
//! Use cases and orchestration: chunking, the in-memory symbol index, the
//! hybrid index and ranker, the incremental indexer, and the interface
//! traits implemented by connectors.

pub mod chunker;
mod hybrid_index;
mod indexer;
pub mod interfaces;
pub mod ranker;
mod search;
pub mod symbol_index;

pub use chunker::Chunker;
pub use hybrid_index::HybridIndex;
pub use indexer::{IncrementalIndexer, PlannedOp, RefreshOutcome};
pub use interfaces::*;
pub use ranker::{HybridRanker, PerformanceMonitor, RankingConfig, RankingConfigWatcher};
pub use search::SearchUseCase;
pub use symbol_index::{SymbolEntry, SymbolIndex, SymbolIndexStats};
