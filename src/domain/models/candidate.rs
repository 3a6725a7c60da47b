use serde::{Deserialize, Serialize};

use super::{ChunkKind, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Lexical,
    Vector,
}

/// One candidate produced by a single side of the hybrid index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingCandidate {
    pub source: CandidateSource,
    /// 1-based rank within the source list.
    pub source_rank: usize,
    pub source_score: f32,
    pub file_id: i64,
    pub file_path: String,
    pub line_number: u32,
    pub snippet: String,
    pub symbol_kind: Option<ChunkKind>,
    pub symbol_name: Option<String>,
    pub language: Language,
    pub file_size: u64,
    pub last_modified: i64,
}

impl RankingCandidate {
    /// Deduplication key used during fusion.
    pub fn dedup_key(&self) -> (String, u32) {
        (self.file_path.clone(), self.line_number)
    }
}

/// Per-candidate record of where the fused score came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub lexical_contribution: f32,
    pub vector_contribution: f32,
    /// Names of tie-breakers that fired for this result, in order.
    pub tie_breakers: Vec<String>,
}

/// A fused, diversified, tie-broken result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub file_path: String,
    pub line_number: u32,
    pub snippet: String,
    pub symbol_kind: Option<ChunkKind>,
    pub symbol_name: Option<String>,
    pub language: Language,
    pub final_score: f32,
    pub breakdown: ScoreBreakdown,
}

/// Timings collected by the ranker's performance monitor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryTimings {
    pub lexical_search_time_ms: u64,
    pub vector_search_time_ms: u64,
    pub ranking_time_ms: u64,
    pub total_time_ms: u64,
}

/// Ranker fallback state, recorded when one source is unavailable or was
/// cut by the SLA budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    Lexical,
    Vector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub fallback_mode: Option<FallbackMode>,
    pub sla_violation: bool,
    pub timings: QueryTimings,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            fallback_mode: None,
            sla_violation: false,
            timings: QueryTimings::default(),
        }
    }
}
