use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::EmbeddingProvider;
use crate::connector::store::IndexStore;
use crate::domain::{now_ms, Chunk, EmbeddingVector, IndexError, RankingCandidate};

/// Parallel lexical (FTS) and dense (embedding) indexes over chunks. The
/// lexical side is maintained by the store's triggers; this type drives the
/// dense side and produces both candidate lists at query time.
pub struct HybridIndex {
    store: Arc<IndexStore>,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    /// Set when the provider failed unrecoverably; the lexical pipeline is
    /// authoritative for the rest of the run.
    dense_disabled: AtomicBool,
}

impl HybridIndex {
    pub fn new(
        store: Arc<IndexStore>,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            provider,
            batch_size: batch_size.max(1),
            dense_disabled: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn is_dense_disabled(&self) -> bool {
        self.dense_disabled.load(Ordering::Relaxed)
    }

    /// Embed and store vectors for newly persisted chunks. Adds are
    /// idempotent: a chunk whose `(uid, model, hash)` row already exists is
    /// skipped, so unchanged chunks are never re-embedded.
    pub async fn add_chunks(&self, uids: &[String], chunks: &[Chunk]) -> Result<(), IndexError> {
        if self.is_dense_disabled() {
            return Ok(());
        }

        let model_id = self.provider.model_id().to_string();
        let mut pending: Vec<(String, String, String)> = Vec::new();
        for (uid, chunk) in uids.iter().zip(chunks) {
            if !self
                .store
                .has_embedding(uid, &model_id, chunk.chunk_hash())
                .await?
            {
                pending.push((
                    uid.clone(),
                    chunk.chunk_hash().to_string(),
                    chunk.embedding_text(),
                ));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, _, text)| text.clone()).collect();
            let vectors = match self.embed_resilient(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("Dense pipeline disabled for this run: {}", e);
                    self.dense_disabled.store(true, Ordering::Relaxed);
                    return Ok(());
                }
            };

            for ((uid, chunk_hash, _), vector) in batch.iter().zip(vectors) {
                let embedding = EmbeddingVector::new(
                    uid.clone(),
                    self.provider.model_id().to_string(),
                    self.provider.model_version().to_string(),
                    chunk_hash.clone(),
                    vector,
                    now_ms(),
                );
                self.store.upsert_embedding(&embedding).await?;
            }
        }

        debug!("Embedded {} chunks", pending.len());
        Ok(())
    }

    /// Embed with batch-halving retries on OOM-looking failures, down to
    /// single-text batches.
    async fn embed_resilient(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut batch_size = texts.len().max(1);

        loop {
            let mut vectors = Vec::with_capacity(texts.len());
            let mut failed: Option<IndexError> = None;

            for batch in texts.chunks(batch_size) {
                match self.provider.embed(batch).await {
                    Ok(mut batch_vectors) => vectors.append(&mut batch_vectors),
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }

            match failed {
                None => return Ok(vectors),
                Some(e) if is_oom(&e) && batch_size > 1 => {
                    batch_size = (batch_size / 2).max(1);
                    warn!("Embedding OOM, retrying with batch size {}", batch_size);
                }
                Some(e) => return Err(e),
            }
        }
    }

    /// The store auto-maintains the lexical index through triggers; rebuild
    /// is a batched no-op kept for interface parity.
    pub async fn rebuild(&self) -> Result<(), IndexError> {
        debug!("Hybrid index rebuild: lexical side is trigger-maintained");
        Ok(())
    }

    /// Lexical candidates only.
    pub async fn search_lexical(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankingCandidate>, IndexError> {
        self.store.search_lexical(query, limit).await
    }

    /// Dense candidates via query embedding + KNN; fails (rather than
    /// silently returning nothing) so the caller can record fallback mode.
    pub async fn search_dense(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankingCandidate>, IndexError> {
        if self.is_dense_disabled() {
            return Err(IndexError::embedding("dense pipeline disabled"));
        }

        let vectors = self.provider.embed(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::embedding("provider returned no query vector"))?;

        let hits = self.store.knn(&query_vector, limit).await?;
        self.store.candidates_for_uids(&hits).await
    }
}

fn is_oom(error: &IndexError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("oom") || text.contains("out of memory") || text.contains("alloc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::embedding::MockEmbeddingProvider;
    use crate::connector::store::IndexStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct OomOnceProvider {
        calls: AtomicUsize,
        inner: MockEmbeddingProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for OomOnceProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 && texts.len() > 1 {
                return Err(IndexError::embedding("backend out of memory"));
            }
            self.inner.embed(texts).await
        }

        fn dim(&self) -> usize {
            self.inner.dim()
        }

        fn model_id(&self) -> &str {
            "oom-once"
        }

        fn model_version(&self) -> &str {
            "1"
        }
    }

    struct AlwaysFailingProvider;

    #[async_trait]
    impl EmbeddingProvider for AlwaysFailingProvider {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            Err(IndexError::embedding("model not loadable"))
        }

        fn dim(&self) -> usize {
            384
        }

        fn model_id(&self) -> &str {
            "broken"
        }

        fn model_version(&self) -> &str {
            "1"
        }
    }

    #[tokio::test]
    async fn test_oom_halving_recovers() {
        let store = Arc::new(IndexStore::in_memory(384).await.unwrap());
        let provider = Arc::new(OomOnceProvider {
            calls: AtomicUsize::new(0),
            inner: MockEmbeddingProvider::new(),
        });
        let index = HybridIndex::new(store, provider, 8);

        let texts: Vec<String> = (0..4).map(|i| format!("text {}", i)).collect();
        let vectors = index.embed_resilient(&texts).await.unwrap();
        assert_eq!(vectors.len(), 4);
        assert!(!index.is_dense_disabled());
    }

    #[tokio::test]
    async fn test_unrecoverable_failure_disables_dense() {
        let store = Arc::new(IndexStore::in_memory(384).await.unwrap());
        let index = HybridIndex::new(store.clone(), Arc::new(AlwaysFailingProvider), 8);

        // add_chunks swallows the failure and records the fallback event.
        let chunk = sample_chunk();
        index
            .add_chunks(&[chunk.id().to_string()], std::slice::from_ref(&chunk))
            .await
            .unwrap();
        assert!(index.is_dense_disabled());

        // The dense query side now reports the fallback instead of
        // pretending there are no results.
        assert!(index.search_dense("query", 10).await.is_err());
    }

    fn sample_chunk() -> Chunk {
        use crate::domain::{hash, ChunkContext, ChunkKind, Language, Span};
        let content = "function f() { return 1; }";
        Chunk::new(
            "src/a.ts".to_string(),
            ChunkKind::Function,
            "f".to_string(),
            content.to_string(),
            hash::normalize(content),
            Span::new(1, 0, 1, 26, 0, content.len()),
            Language::TypeScript,
            ChunkContext {
                module_path: Some("src.a".to_string()),
                is_top_level: true,
                ..Default::default()
            },
            None,
            Some("function f()".to_string()),
            hash::hash_parts(&[None, Some("function f()"), Some(content)]),
        )
    }
}
