use async_trait::async_trait;

use crate::domain::IndexError;

/// Interface to a local embedding inference runtime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts into unit-length f32 vectors, one per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;

    fn dim(&self) -> usize;

    fn model_id(&self) -> &str;

    fn model_version(&self) -> &str;
}
