//! Reciprocal Rank Fusion over the lexical and dense candidate lists, with
//! path diversification and deterministic tie-breaking.

pub mod config;
pub mod monitor;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::domain::{RankedResult, RankingCandidate, ScoreBreakdown};

pub use config::{RankingConfig, RankingConfigWatcher};
pub use monitor::{PerformanceMonitor, DEFAULT_SLA_MS};

/// Rank-product stand-in for a source a candidate did not appear in.
const MISSING_RANK: usize = 1_000;

/// Fraction of the top fused score below which further candidates stop
/// being considered once the requested count is reached.
const EARLY_TERMINATION_RATIO: f32 = 0.1;

struct Fused {
    candidate: RankingCandidate,
    lex_rank: Option<usize>,
    vec_rank: Option<usize>,
    lex_contribution: f32,
    vec_contribution: f32,
    final_score: f32,
    tie_breakers: Vec<String>,
}

/// Fuses, diversifies, and tie-breaks candidates. The active config is
/// swappable at runtime by the config watcher.
pub struct HybridRanker {
    config: RwLock<RankingConfig>,
}

impl HybridRanker {
    pub fn new(config: RankingConfig) -> Self {
        config.warn_on_extremes();
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RankingConfig::default())
    }

    pub fn update_config(&self, config: RankingConfig) {
        config.warn_on_extremes();
        *self.config.write().expect("ranker config lock") = config;
    }

    pub fn config(&self) -> RankingConfig {
        self.config.read().expect("ranker config lock").clone()
    }

    /// Produce the final ranked list, length ≤ `limit`.
    pub fn rank(
        &self,
        lexical: &[RankingCandidate],
        vector: &[RankingCandidate],
        limit: usize,
    ) -> Vec<RankedResult> {
        self.rank_with(lexical, vector, limit, &self.config())
    }

    /// Rank with an explicit config (per-query weight overrides).
    pub fn rank_with(
        &self,
        lexical: &[RankingCandidate],
        vector: &[RankingCandidate],
        limit: usize,
        config: &RankingConfig,
    ) -> Vec<RankedResult> {
        let config = config.clone();
        let alpha = config.fusion.alpha;
        let beta = config.fusion.beta;
        let k = config.fusion.k;

        // 1. Reciprocal Rank Fusion, deduplicated by (path, line).
        let mut fused: HashMap<(String, u32), Fused> = HashMap::new();
        for candidate in lexical {
            let contribution = alpha * 1.0 / (k + candidate.source_rank as f32);
            let entry = fused
                .entry(candidate.dedup_key())
                .or_insert_with(|| Fused::new(candidate.clone()));
            entry.lex_rank = Some(candidate.source_rank);
            entry.lex_contribution = contribution;
        }
        for candidate in vector {
            let contribution = beta * 1.0 / (k + candidate.source_rank as f32);
            let entry = fused
                .entry(candidate.dedup_key())
                .or_insert_with(|| Fused::new(candidate.clone()));
            entry.vec_rank = Some(candidate.source_rank);
            entry.vec_contribution = contribution;
        }

        let mut list: Vec<Fused> = fused
            .into_values()
            .map(|mut f| {
                f.final_score = f.lex_contribution + f.vec_contribution;
                f
            })
            .collect();

        // 2. Order by fused score, tie-broken deterministically.
        let epsilon = config.tie_breakers.epsilon;
        list.sort_by(|a, b| {
            if (a.final_score - b.final_score).abs() > epsilon {
                return b
                    .final_score
                    .partial_cmp(&a.final_score)
                    .unwrap_or(Ordering::Equal);
            }
            break_tie(a, b, &config).0
        });

        // Record which tie-breaker decided each adjacent near-tie.
        for i in 1..list.len() {
            let (left, right) = list.split_at_mut(i);
            let a = left.last_mut().expect("non-empty left split");
            let b = &mut right[0];
            if (a.final_score - b.final_score).abs() <= epsilon {
                if let (_, Some(name)) = break_tie(a, b, &config) {
                    a.tie_breakers.push(name.to_string());
                    b.tie_breakers.push(name.to_string());
                }
            }
        }

        // 3. Early termination once the tail cannot matter.
        if let Some(top) = list.first().map(|f| f.final_score) {
            let threshold = top * EARLY_TERMINATION_RATIO;
            let mut kept = 0usize;
            list.retain(|f| {
                if kept < limit || f.final_score >= threshold {
                    kept += 1;
                    true
                } else {
                    false
                }
            });
        }

        // 4. Path diversification. Dropping over-cap candidates lets other
        // files' results move up into the limit window, so the total count
        // is preserved whenever enough distinct files produced hits, and the
        // cap itself is never exceeded.
        let cap = config.diversification.per_file_cap;
        let mut per_file: HashMap<String, usize> = HashMap::new();
        let mut kept = Vec::new();
        for f in list {
            let count = per_file.entry(f.candidate.file_path.clone()).or_insert(0);
            if *count < cap {
                *count += 1;
                kept.push(f);
            }
        }
        kept.truncate(limit);

        debug!("Ranked {} results", kept.len());
        kept.into_iter().map(Fused::into_result).collect()
    }
}

impl Fused {
    fn new(candidate: RankingCandidate) -> Self {
        Self {
            candidate,
            lex_rank: None,
            vec_rank: None,
            lex_contribution: 0.0,
            vec_contribution: 0.0,
            final_score: 0.0,
            tie_breakers: Vec::new(),
        }
    }

    fn rank_product(&self) -> usize {
        self.lex_rank.unwrap_or(MISSING_RANK) * self.vec_rank.unwrap_or(MISSING_RANK)
    }

    fn into_result(self) -> RankedResult {
        RankedResult {
            file_path: self.candidate.file_path,
            line_number: self.candidate.line_number,
            snippet: self.candidate.snippet,
            symbol_kind: self.candidate.symbol_kind,
            symbol_name: self.candidate.symbol_name,
            language: self.candidate.language,
            final_score: self.final_score,
            breakdown: ScoreBreakdown {
                lexical_contribution: self.lex_contribution,
                vector_contribution: self.vec_contribution,
                tie_breakers: self.tie_breakers,
            },
        }
    }
}

/// Apply the tie-breakers in their defined order; returns the ordering and
/// the name of the breaker that decided it.
fn break_tie(a: &Fused, b: &Fused, config: &RankingConfig) -> (Ordering, Option<&'static str>) {
    // Better combined source ranks first.
    let ordering = a.rank_product().cmp(&b.rank_product());
    if ordering != Ordering::Equal {
        return (ordering, Some("source-rank-product"));
    }

    let kind_index = |f: &Fused| {
        f.candidate
            .symbol_kind
            .and_then(|kind| {
                config
                    .tie_breakers
                    .kind_priority
                    .iter()
                    .position(|p| p == kind.as_str())
            })
            .unwrap_or(usize::MAX)
    };
    let ordering = kind_index(a).cmp(&kind_index(b));
    if ordering != Ordering::Equal {
        return (ordering, Some("kind-priority"));
    }

    let path_index = |f: &Fused| {
        config
            .tie_breakers
            .path_priority
            .iter()
            .position(|prefix| f.candidate.file_path.starts_with(prefix.as_str()))
            .unwrap_or(usize::MAX)
    };
    let ordering = path_index(a).cmp(&path_index(b));
    if ordering != Ordering::Equal {
        return (ordering, Some("path-priority"));
    }

    let ordering = b.candidate.file_size.cmp(&a.candidate.file_size);
    if ordering != Ordering::Equal {
        return (ordering, Some("file-size"));
    }

    let ordering = b.candidate.last_modified.cmp(&a.candidate.last_modified);
    if ordering != Ordering::Equal {
        return (ordering, Some("last-modified"));
    }

    // Fully deterministic output even for identical metadata.
    (
        a.candidate
            .file_path
            .cmp(&b.candidate.file_path)
            .then(a.candidate.line_number.cmp(&b.candidate.line_number)),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateSource, ChunkKind, Language};

    fn candidate(
        source: CandidateSource,
        rank: usize,
        path: &str,
        line: u32,
        kind: ChunkKind,
    ) -> RankingCandidate {
        RankingCandidate {
            source,
            source_rank: rank,
            source_score: 1.0 / rank as f32,
            file_id: 1,
            file_path: path.to_string(),
            line_number: line,
            snippet: String::new(),
            symbol_kind: Some(kind),
            symbol_name: None,
            language: Language::TypeScript,
            file_size: 1_000,
            last_modified: 0,
        }
    }

    #[test]
    fn test_overlap_scenario() {
        // Lexical [A, B, C], vector [A, D, E]; defaults.
        let lexical = vec![
            candidate(CandidateSource::Lexical, 1, "src/a.ts", 10, ChunkKind::Function),
            candidate(CandidateSource::Lexical, 2, "src/b.ts", 20, ChunkKind::Function),
            candidate(CandidateSource::Lexical, 3, "src/c.ts", 30, ChunkKind::Function),
        ];
        let vector = vec![
            candidate(CandidateSource::Vector, 1, "src/a.ts", 10, ChunkKind::Function),
            candidate(CandidateSource::Vector, 2, "src/d.ts", 40, ChunkKind::Method),
            candidate(CandidateSource::Vector, 3, "src/e.ts", 50, ChunkKind::Method),
        ];

        let ranker = HybridRanker::with_defaults();
        let results = ranker.rank(&lexical, &vector, 10);

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].file_path, "src/a.ts");
        // A carries contributions from both sources.
        assert!(results[0].breakdown.lexical_contribution > 0.0);
        assert!(results[0].breakdown.vector_contribution > 0.0);

        // B and D tie on fused score; kind priority puts the function first.
        assert_eq!(results[1].file_path, "src/b.ts");
        assert_eq!(results[2].file_path, "src/d.ts");
        assert!(results[1]
            .breakdown
            .tie_breakers
            .iter()
            .any(|t| t == "kind-priority"));

        // Scores are monotonically non-increasing.
        for pair in results.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score - 1e-6);
        }
    }

    #[test]
    fn test_dedup_by_path_and_line() {
        let lexical = vec![candidate(
            CandidateSource::Lexical,
            1,
            "src/a.ts",
            10,
            ChunkKind::Function,
        )];
        let vector = vec![candidate(
            CandidateSource::Vector,
            1,
            "src/a.ts",
            10,
            ChunkKind::Function,
        )];
        let results = HybridRanker::with_defaults().rank(&lexical, &vector, 10);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_per_file_cap() {
        let lexical: Vec<RankingCandidate> = (1..=6)
            .map(|i| {
                candidate(
                    CandidateSource::Lexical,
                    i,
                    "src/hot.ts",
                    i as u32 * 10,
                    ChunkKind::Function,
                )
            })
            .chain((7..=8).map(|i| {
                candidate(
                    CandidateSource::Lexical,
                    i,
                    "src/cold.ts",
                    i as u32 * 10,
                    ChunkKind::Function,
                )
            }))
            .collect();

        let results = HybridRanker::with_defaults().rank(&lexical, &[], 5);
        let hot = results.iter().filter(|r| r.file_path == "src/hot.ts").count();
        assert!(hot <= 3, "per-file cap respected, got {}", hot);
        // Backfill keeps the total at the limit.
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_backfill_exhausted_pool() {
        let lexical = vec![candidate(
            CandidateSource::Lexical,
            1,
            "src/a.ts",
            10,
            ChunkKind::Function,
        )];
        let results = HybridRanker::with_defaults().rank(&lexical, &[], 10);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_limit_respected() {
        let lexical: Vec<RankingCandidate> = (1..=20)
            .map(|i| {
                candidate(
                    CandidateSource::Lexical,
                    i,
                    &format!("src/f{}.ts", i),
                    1,
                    ChunkKind::Function,
                )
            })
            .collect();
        let results = HybridRanker::with_defaults().rank(&lexical, &[], 10);
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn test_path_priority_breaks_kind_ties() {
        let mut config = RankingConfig::default();
        config.tie_breakers.epsilon = 1e-3;
        let lexical = vec![candidate(
            CandidateSource::Lexical,
            1,
            "docs/guide.ts",
            1,
            ChunkKind::Function,
        )];
        let vector = vec![candidate(
            CandidateSource::Vector,
            1,
            "src/main.ts",
            1,
            ChunkKind::Function,
        )];

        let results = HybridRanker::new(config).rank(&lexical, &vector, 10);
        assert_eq!(results[0].file_path, "src/main.ts");
        assert!(results[0]
            .breakdown
            .tie_breakers
            .iter()
            .any(|t| t == "path-priority"));
    }

    #[test]
    fn test_config_hot_swap() {
        let ranker = HybridRanker::with_defaults();
        let mut config = RankingConfig::default();
        config.diversification.per_file_cap = 1;
        ranker.update_config(config);
        assert_eq!(ranker.config().diversification.per_file_cap, 1);
    }
}
