use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::application::ranker::{HybridRanker, PerformanceMonitor};
use crate::application::{HybridIndex, SymbolIndex};
use crate::domain::{
    FallbackMode, IndexError, RankedResult, ScoreBreakdown, SearchResponse,
};

/// Reserved slice of the SLA budget for fusion and post-processing.
const RANKING_RESERVE_MS: u64 = 40;

/// Query flow driver: asks both sides of the hybrid index for candidates
/// in parallel, cuts the vector branch when the SLA budget runs low, and
/// fuses through the ranker. Identifier-shaped queries consult the symbol
/// index first.
pub struct SearchUseCase {
    hybrid: Arc<HybridIndex>,
    ranker: Arc<HybridRanker>,
    symbol_index: Arc<SymbolIndex>,
}

impl SearchUseCase {
    pub fn new(
        hybrid: Arc<HybridIndex>,
        ranker: Arc<HybridRanker>,
        symbol_index: Arc<SymbolIndex>,
    ) -> Self {
        Self {
            hybrid,
            ranker,
            symbol_index,
        }
    }

    pub async fn execute(
        &self,
        query: &str,
        limit: usize,
        sla_ms: u64,
    ) -> Result<SearchResponse, IndexError> {
        self.execute_weighted(query, limit, sla_ms, None, None).await
    }

    /// Search with per-query fusion weight overrides (`sparse` maps to the
    /// lexical weight, `dense` to the vector weight).
    pub async fn execute_weighted(
        &self,
        query: &str,
        limit: usize,
        sla_ms: u64,
        dense_weight: Option<f32>,
        sparse_weight: Option<f32>,
    ) -> Result<SearchResponse, IndexError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(IndexError::invalid_input("empty query"));
        }
        let limit = limit.max(1);

        // Symbol-name queries bypass the hybrid index entirely.
        if is_identifier(query) {
            let exact = self.symbol_index.exact(query);
            if !exact.is_empty() {
                debug!("Symbol index answered '{}' directly", query);
                return Ok(symbol_response(exact, limit));
            }
        }

        let mut monitor = PerformanceMonitor::start(sla_ms);
        // Each source gets a deeper pool than the final limit so fusion has
        // something to work with.
        let fetch = (limit * 2).max(20);

        let vector_budget =
            Duration::from_millis(sla_ms.saturating_sub(RANKING_RESERVE_MS).max(1));

        let lexical_task = async {
            let started = Instant::now();
            let result = self.hybrid.search_lexical(query, fetch).await;
            (result, started.elapsed().as_millis() as u64)
        };
        let vector_task = async {
            let started = Instant::now();
            let result =
                tokio::time::timeout(vector_budget, self.hybrid.search_dense(query, fetch)).await;
            (result, started.elapsed().as_millis() as u64)
        };

        let ((lexical_result, lexical_ms), (vector_result, vector_ms)) =
            tokio::join!(lexical_task, vector_task);
        monitor.record_lexical(lexical_ms);
        monitor.record_vector(vector_ms);

        let mut fallback: Option<FallbackMode> = None;

        let lexical = match lexical_result {
            Ok(candidates) => candidates,
            Err(e) => {
                // Partial results beat failures: lean on the dense side.
                warn!("Lexical search failed: {}", e);
                fallback = Some(FallbackMode::Vector);
                Vec::new()
            }
        };

        let vector = match vector_result {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                debug!("Dense search unavailable: {}", e);
                fallback = Some(FallbackMode::Lexical);
                Vec::new()
            }
            Err(_) => {
                // Budget exhausted; a late vector result is discarded.
                warn!("Vector branch cut after {}ms", vector_ms);
                fallback = Some(FallbackMode::Lexical);
                Vec::new()
            }
        };

        if lexical.is_empty() && vector.is_empty() && fallback == Some(FallbackMode::Vector) {
            return Err(IndexError::store("both retrieval sources failed"));
        }

        let ranking_started = Instant::now();
        let mut config = self.ranker.config();
        if let Some(beta) = dense_weight {
            config.fusion.beta = beta.clamp(0.0, 1.0);
        }
        if let Some(alpha) = sparse_weight {
            config.fusion.alpha = alpha.clamp(0.0, 1.0);
        }
        let results = self.ranker.rank_with(&lexical, &vector, limit, &config);
        monitor.record_ranking(ranking_started.elapsed().as_millis() as u64);

        Ok(SearchResponse {
            results,
            fallback_mode: fallback,
            sla_violation: monitor.sla_violated(),
            timings: monitor.timings(),
        })
    }
}

fn is_identifier(query: &str) -> bool {
    !query.is_empty()
        && query
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !query.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn symbol_response(
    entries: Vec<crate::application::symbol_index::SymbolEntry>,
    limit: usize,
) -> SearchResponse {
    let results: Vec<RankedResult> = entries
        .into_iter()
        .take(limit)
        .map(|entry| RankedResult {
            file_path: entry.file_path,
            line_number: entry.line,
            snippet: String::new(),
            symbol_kind: None,
            symbol_name: Some(entry.name),
            language: crate::domain::Language::Unknown,
            final_score: 1.0,
            breakdown: ScoreBreakdown::default(),
        })
        .collect();

    SearchResponse {
        results,
        fallback_mode: None,
        sla_violation: false,
        timings: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("computeTotal"));
        assert!(is_identifier("snake_case"));
        assert!(is_identifier("$jquery"));
        assert!(!is_identifier("two words"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("a.b"));
    }
}
