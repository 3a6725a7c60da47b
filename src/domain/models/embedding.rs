use serde::{Deserialize, Serialize};

/// One embedding row in the vector shadow table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingVector {
    chunk_id: String,
    model_id: String,
    model_version: String,
    chunk_hash: String,
    vector: Vec<f32>,
    created_at: i64,
}

impl EmbeddingVector {
    pub fn new(
        chunk_id: String,
        model_id: String,
        model_version: String,
        chunk_hash: String,
        vector: Vec<f32>,
        created_at: i64,
    ) -> Self {
        Self {
            chunk_id,
            model_id,
            model_version,
            chunk_hash,
            vector,
            created_at,
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn chunk_hash(&self) -> &str {
        &self.chunk_hash
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn magnitude(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn cosine_similarity(&self, other: &[f32]) -> f32 {
        if self.vector.len() != other.len() {
            return 0.0;
        }
        let dot: f32 = self.vector.iter().zip(other).map(|(a, b)| a * b).sum();
        let norm_other: f32 = other.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_self = self.magnitude();
        if norm_self == 0.0 || norm_other == 0.0 {
            0.0
        } else {
            dot / (norm_self * norm_other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let e = EmbeddingVector::new(
            "c1".to_string(),
            "m".to_string(),
            "1".to_string(),
            "0".repeat(64),
            vec![1.0, 0.0],
            0,
        );
        assert!((e.cosine_similarity(&[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(e.cosine_similarity(&[0.0, 1.0]).abs() < 0.001);
        // Dimension mismatch is not an answer, it is a zero.
        assert_eq!(e.cosine_similarity(&[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_dim() {
        let e = EmbeddingVector::new(
            "c1".to_string(),
            "m".to_string(),
            "1".to_string(),
            "0".repeat(64),
            vec![0.5; 384],
            0,
        );
        assert_eq!(e.dim(), 384);
    }
}
