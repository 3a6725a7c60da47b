//! sqlite-vec shadow table operations for [`IndexStore`].

use rusqlite::{params, Connection};
use tracing::{debug, info};
use zerocopy::AsBytes;

use crate::domain::{EmbeddingVector, IndexError};

use super::sqlite::IndexStore;

impl IndexStore {
    /// Create (or recreate on dimension change) the `vec_embeddings` vec0
    /// virtual table. A dimension change purges all stored vectors.
    pub(super) fn ensure_vec_table(conn: &Connection, dimension: usize) -> Result<(), IndexError> {
        if let Some(stored_dim) = Self::stored_vec_dimension(conn)? {
            if stored_dim == dimension {
                return Ok(());
            }
            info!(
                "Embedding dimension changed {} → {}; purging vector shadow",
                stored_dim, dimension
            );
            conn.execute_batch("DROP TABLE vec_embeddings; DELETE FROM embeddings_meta;")
                .map_err(|e| IndexError::store(format!("Failed to drop vec table: {}", e)))?;
        }

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_embeddings USING vec0(
                 chunk_uid TEXT PRIMARY KEY,
                 embedding FLOAT[{}] distance_metric=cosine
             );",
            dimension
        ))
        .map_err(|e| IndexError::store(format!("Failed to create vec table: {}", e)))?;
        Ok(())
    }

    fn stored_vec_dimension(conn: &Connection) -> Result<Option<usize>, IndexError> {
        let sql: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'vec_embeddings'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(IndexError::store(format!(
                    "Failed to inspect vec table: {}",
                    other
                ))),
            })?;

        Ok(sql.as_deref().and_then(Self::parse_vec_dimension))
    }

    /// Parse the declared dimension out of a `FLOAT[n]` column definition.
    fn parse_vec_dimension(create_sql: &str) -> Option<usize> {
        let start = create_sql.find("FLOAT[")? + "FLOAT[".len();
        let end = create_sql[start..].find(']')? + start;
        create_sql[start..end].trim().parse().ok()
    }

    /// True when a row for this `(chunk, model, hash)` tuple already exists;
    /// the dense pipeline skips those adds.
    pub async fn has_embedding(
        &self,
        chunk_uid: &str,
        model_id: &str,
        chunk_hash: &str,
    ) -> Result<bool, IndexError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM embeddings_meta \
                 WHERE chunk_uid = ?1 AND model_id = ?2 AND chunk_hash = ?3",
                params![chunk_uid, model_id, chunk_hash],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::store(format!("Failed embedding probe: {}", e)))?;
        Ok(count > 0)
    }

    /// Insert one embedding row. Vectors whose length differs from the
    /// declared dimension are rejected.
    pub async fn upsert_embedding(&self, embedding: &EmbeddingVector) -> Result<(), IndexError> {
        if embedding.dim() != self.dimension {
            return Err(IndexError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                self.dimension,
                embedding.dim()
            )));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin vec tx: {}", e)))?;

        // vec0 has no upsert; delete-then-insert inside the transaction.
        tx.execute(
            "DELETE FROM vec_embeddings WHERE chunk_uid = ?1",
            params![embedding.chunk_id()],
        )
        .map_err(|e| IndexError::store(format!("Failed to clear vec row: {}", e)))?;

        // Little-endian f32 buffer, the format sqlite-vec expects.
        tx.execute(
            "INSERT INTO vec_embeddings (chunk_uid, embedding) VALUES (?1, ?2)",
            params![embedding.chunk_id(), embedding.vector().as_bytes()],
        )
        .map_err(|e| IndexError::store(format!("Failed to insert vector: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO embeddings_meta \
                 (chunk_uid, model_id, model_version, chunk_hash, dim, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                embedding.chunk_id(),
                embedding.model_id(),
                embedding.model_version(),
                embedding.chunk_hash(),
                embedding.dim() as i64,
                embedding.created_at(),
            ],
        )
        .map_err(|e| IndexError::store(format!("Failed to record embedding: {}", e)))?;

        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit vector: {}", e)))?;
        Ok(())
    }

    /// Brute-force KNN over the vector shadow; returns `(chunk_uid,
    /// cosine_distance)` pairs, nearest first.
    pub async fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(String, f64)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::invalid_input(format!(
                "Expected query dimension {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let conn = self.conn.lock().await;

        // vec0 MATCH errors on an empty table; probe first.
        let populated: i64 = conn
            .query_row("SELECT COUNT(*) FROM vec_embeddings", [], |row| row.get(0))
            .map_err(|e| IndexError::store(format!("Failed vec count: {}", e)))?;
        if populated == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare(
                "SELECT chunk_uid, distance FROM vec_embeddings \
                 WHERE embedding MATCH ?1 AND k = ?2 \
                 ORDER BY distance",
            )
            .map_err(|e| IndexError::store(format!("Failed to prepare knn: {}", e)))?;

        let rows = stmt
            .query_map(params![query.as_bytes(), k as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(|e| IndexError::store(format!("Failed to run knn: {}", e)))?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(|e| IndexError::store(format!("Failed knn row: {}", e)))?);
        }
        debug!("knn returned {} hits", hits.len());
        Ok(hits)
    }

    /// Remove all vector rows whose model differs from `model_id` (required
    /// when switching to a model with a different dimension).
    pub async fn purge_other_models(&self, model_id: &str) -> Result<u64, IndexError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin purge tx: {}", e)))?;

        let stale: Vec<String> = {
            let mut stmt = tx
                .prepare("SELECT chunk_uid FROM embeddings_meta WHERE model_id != ?1")
                .map_err(|e| IndexError::store(format!("Failed to prepare purge: {}", e)))?;
            let rows = stmt
                .query_map(params![model_id], |row| row.get::<_, String>(0))
                .map_err(|e| IndexError::store(format!("Failed purge query: {}", e)))?;
            rows.collect::<Result<_, _>>()
                .map_err(|e| IndexError::store(format!("Failed purge rows: {}", e)))?
        };

        for uid in &stale {
            tx.execute(
                "DELETE FROM vec_embeddings WHERE chunk_uid = ?1",
                params![uid],
            )
            .map_err(|e| IndexError::store(format!("Failed to purge vector: {}", e)))?;
        }
        tx.execute(
            "DELETE FROM embeddings_meta WHERE model_id != ?1",
            params![model_id],
        )
        .map_err(|e| IndexError::store(format!("Failed to purge meta: {}", e)))?;

        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit purge: {}", e)))?;
        Ok(stale.len() as u64)
    }

    /// Dimension consistency check for `doctor`.
    pub async fn vectors_match_dimension(&self) -> Result<bool, IndexError> {
        let conn = self.conn.lock().await;
        let mismatched: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM embeddings_meta WHERE dim != ?1",
                params![self.dimension as i64],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::store(format!("Failed dim check: {}", e)))?;
        Ok(mismatched == 0)
    }

    // ── Transaction-scoped helpers used by the chunk write paths ─────────

    pub(super) fn delete_vector_rows(conn: &Connection, chunk_uid: &str) -> Result<(), IndexError> {
        conn.execute(
            "DELETE FROM vec_embeddings WHERE chunk_uid = ?1",
            params![chunk_uid],
        )
        .map_err(|e| IndexError::store(format!("Failed to delete vector: {}", e)))?;
        conn.execute(
            "DELETE FROM embeddings_meta WHERE chunk_uid = ?1",
            params![chunk_uid],
        )
        .map_err(|e| IndexError::store(format!("Failed to delete embedding meta: {}", e)))?;
        Ok(())
    }

    pub(super) fn delete_vectors_for_file(conn: &Connection, path: &str) -> Result<(), IndexError> {
        let uids: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT uid FROM chunks WHERE file_path = ?1")
                .map_err(|e| IndexError::store(format!("Failed to prepare: {}", e)))?;
            let rows = stmt
                .query_map(params![path], |row| row.get::<_, String>(0))
                .map_err(|e| IndexError::store(format!("Failed to query: {}", e)))?;
            rows.collect::<Result<_, _>>()
                .map_err(|e| IndexError::store(format!("Failed to read: {}", e)))?
        };
        for uid in uids {
            Self::delete_vector_rows(conn, &uid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vec_dimension() {
        let sql = "CREATE VIRTUAL TABLE vec_embeddings USING vec0(\n  chunk_uid TEXT PRIMARY KEY,\n  embedding FLOAT[384] distance_metric=cosine\n)";
        assert_eq!(IndexStore::parse_vec_dimension(sql), Some(384));
        assert_eq!(IndexStore::parse_vec_dimension("no match"), None);
    }
}
