use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::IndexError;

const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FusionConfig {
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            k: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiversificationConfig {
    pub per_file_cap: usize,
}

impl Default for DiversificationConfig {
    fn default() -> Self {
        Self { per_file_cap: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TieBreakerConfig {
    pub epsilon: f32,
    pub kind_priority: Vec<String>,
    pub path_priority: Vec<String>,
}

impl Default for TieBreakerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            kind_priority: vec![
                "function".to_string(),
                "method".to_string(),
                "class".to_string(),
                "variable".to_string(),
            ],
            path_priority: vec!["src/".to_string(), "test/".to_string(), "docs/".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingConfig {
    pub fusion: FusionConfig,
    pub diversification: DiversificationConfig,
    pub tie_breakers: TieBreakerConfig,
}

impl RankingConfig {
    /// Schema validation. Out-of-range values are rejected as a whole so
    /// the caller falls back to defaults.
    pub fn validate(&self) -> Result<(), IndexError> {
        let f = &self.fusion;
        if !(0.0..=1.0).contains(&f.alpha) || !(0.0..=1.0).contains(&f.beta) {
            return Err(IndexError::config("fusion weights must be within [0, 1]"));
        }
        if f.k <= 0.0 {
            return Err(IndexError::config("fusion k must be positive"));
        }
        if self.diversification.per_file_cap < 1 {
            return Err(IndexError::config("perFileCap must be at least 1"));
        }
        if self.tie_breakers.epsilon < 0.0 {
            return Err(IndexError::config("epsilon must be non-negative"));
        }
        Ok(())
    }

    /// Non-fatal warnings for extreme but valid weights.
    pub fn warn_on_extremes(&self) {
        let f = &self.fusion;
        if f.alpha == 0.0 || f.beta == 0.0 {
            warn!("A fusion weight of 0 disables one retrieval source entirely");
        } else if f.alpha > 0.9 || f.beta > 0.9 {
            warn!(
                "Extreme fusion weights (alpha={}, beta={}) will dominate ranking",
                f.alpha, f.beta
            );
        }
    }

    /// Load the optional override file. Missing, unreadable or invalid
    /// configs fall back silently to defaults (with a warning in the log).
    pub fn load_or_default(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Self::default(),
        };

        let config: RankingConfig = match serde_json::from_slice(&bytes) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid ranking config {}: {}; using defaults", path.display(), e);
                return Self::default();
            }
        };

        if let Err(e) = config.validate() {
            warn!("Rejected ranking config {}: {}; using defaults", path.display(), e);
            return Self::default();
        }

        config.warn_on_extremes();
        config
    }
}

/// Watches the ranking config file and invokes the callback with the
/// re-validated config after a 100 ms debounce. Validation failures keep
/// the previous config in effect (the callback is not invoked).
pub struct RankingConfigWatcher {
    _debouncer: notify_debouncer_mini::Debouncer<notify_debouncer_mini::notify::RecommendedWatcher>,
    path: PathBuf,
}

impl RankingConfigWatcher {
    pub fn spawn(
        path: &Path,
        on_change: Arc<dyn Fn(RankingConfig) + Send + Sync>,
    ) -> Result<Self, IndexError> {
        let watched = path.to_path_buf();
        let callback_path = watched.clone();

        let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
            match result {
                Ok(events) if !events.is_empty() => {
                    debug!("Ranking config changed, reloading");
                    let config = RankingConfig::load_or_default(&callback_path);
                    on_change(config);
                }
                Ok(_) => {}
                Err(e) => warn!("Ranking config watch error: {}", e),
            }
        })
        .map_err(|e| IndexError::config(format!("Failed to start config watcher: {}", e)))?;

        // Watch the parent so creation of the file is seen too.
        let watch_target = path.parent().unwrap_or(path);
        debouncer
            .watcher()
            .watch(watch_target, RecursiveMode::NonRecursive)
            .map_err(|e| IndexError::config(format!("Failed to watch config: {}", e)))?;

        Ok(Self {
            _debouncer: debouncer,
            path: watched,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
