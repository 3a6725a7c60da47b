use async_trait::async_trait;

use crate::application::EmbeddingProvider;
use crate::domain::IndexError;

/// Placeholder provider used when no inference runtime could be loaded.
/// Every embed call fails, which flips the hybrid index into lexical
/// fallback; the next run may try the real provider again.
pub struct UnavailableEmbeddingProvider {
    reason: String,
    dim: usize,
}

impl UnavailableEmbeddingProvider {
    pub fn new(reason: impl Into<String>, dim: usize) -> Self {
        Self {
            reason: reason.into(),
            dim,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for UnavailableEmbeddingProvider {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Err(IndexError::embedding(format!(
            "embedding provider unavailable: {}",
            self.reason
        )))
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        "unavailable"
    }

    fn model_version(&self) -> &str {
        "0"
    }
}
