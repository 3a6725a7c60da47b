use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::connector::store::migrations;
use crate::domain::{
    CandidateSource, Chunk, ChunkContext, ChunkKind, FileRecord, IndexError, Language,
    RankingCandidate, Span,
};

/// Single-writer relational store: files, chunks, the FTS5 shadow kept in
/// sync by triggers, and the sqlite-vec shadow managed in `vectors.rs`.
pub struct IndexStore {
    pub(super) conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    pub(super) dimension: usize,
}

/// Filters for [`IndexStore::query_chunks`].
#[derive(Debug, Clone, Default)]
pub struct ChunkQuery {
    kinds: Option<Vec<ChunkKind>>,
    languages: Option<Vec<Language>>,
    file_id: Option<i64>,
    min_lines: Option<u32>,
    max_lines: Option<u32>,
    match_text: Option<String>,
    limit: usize,
    offset: usize,
}

impl ChunkQuery {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<ChunkKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = Some(languages);
        self
    }

    pub fn with_file_id(mut self, file_id: i64) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_line_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_lines = min;
        self.max_lines = max;
        self
    }

    pub fn with_match(mut self, text: impl Into<String>) -> Self {
        self.match_text = Some(text.into());
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit.max(1);
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub file_count: u64,
    pub chunk_count: u64,
    pub fts_count: u64,
    pub vector_count: u64,
    pub schema_version: String,
}

impl IndexStore {
    pub async fn open(path: &Path, dimension: usize) -> Result<Self, IndexError> {
        Self::register_vec_extension();

        // Transient I/O failures (a lingering WAL writer, NFS hiccups) get
        // one retry with back-off before surfacing.
        let mut conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(first) => {
                tokio::time::sleep(std::time::Duration::from_millis(250)).await;
                Connection::open(path).map_err(|_| {
                    IndexError::store(format!("Failed to open store: {}", first))
                })?
            }
        };
        Self::init_connection(&mut conn, dimension)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            dimension,
        })
    }

    pub async fn in_memory(dimension: usize) -> Result<Self, IndexError> {
        Self::register_vec_extension();

        let mut conn = Connection::open_in_memory()
            .map_err(|e| IndexError::store(format!("Failed to open in-memory store: {}", e)))?;
        Self::init_connection(&mut conn, dimension)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            dimension,
        })
    }

    fn register_vec_extension() {
        // SAFETY: sqlite3_vec_init is the extension entry point provided by
        // the sqlite-vec crate; registering it as an auto extension is the
        // documented integration pattern.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    }

    fn init_connection(conn: &mut Connection, dimension: usize) -> Result<(), IndexError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| IndexError::store(format!("pragma init failed: {}", e)))?;

        migrations::run(conn)?;
        Self::ensure_vec_table(conn, dimension)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Flush the WAL and release the connection.
    pub async fn close(self) -> Result<(), IndexError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(|e| IndexError::store(format!("checkpoint failed: {}", e)))?;
        Ok(())
    }

    pub async fn vacuum(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("VACUUM")
            .map_err(|e| IndexError::store(format!("vacuum failed: {}", e)))
    }

    pub async fn analyze(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("ANALYZE")
            .map_err(|e| IndexError::store(format!("analyze failed: {}", e)))
    }

    pub async fn schema_version(&self) -> Result<String, IndexError> {
        let conn = self.conn.lock().await;
        migrations::current_version(&conn)
    }

    // ── File records ─────────────────────────────────────────────────────

    pub async fn upsert_file(&self, record: &FileRecord, size_bytes: u64) -> Result<i64, IndexError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO files (path, mtime_ms, last_indexed_ms, size_bytes, language)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (path) DO UPDATE SET
                 mtime_ms = excluded.mtime_ms,
                 last_indexed_ms = excluded.last_indexed_ms,
                 size_bytes = excluded.size_bytes,
                 language = excluded.language",
            params![
                record.path(),
                record.mtime_ms(),
                record.last_indexed_ms(),
                size_bytes as i64,
                record.language().as_str(),
            ],
        )
        .map_err(|e| IndexError::store(format!("Failed to upsert file: {}", e)))?;

        conn.query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![record.path()],
            |row| row.get(0),
        )
        .map_err(|e| IndexError::store(format!("Failed to read file id: {}", e)))
    }

    /// Full `(path → (id, mtime_ms))` snapshot for refresh planning.
    pub async fn file_snapshot(&self) -> Result<HashMap<String, (i64, i64)>, IndexError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT path, id, mtime_ms FROM files")
            .map_err(|e| IndexError::store(format!("Failed to prepare snapshot: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    (row.get::<_, i64>(1)?, row.get::<_, i64>(2)?),
                ))
            })
            .map_err(|e| IndexError::store(format!("Failed to query snapshot: {}", e)))?;

        let mut snapshot = HashMap::new();
        for row in rows {
            let (path, entry) =
                row.map_err(|e| IndexError::store(format!("Failed to read snapshot row: {}", e)))?;
            snapshot.insert(path, entry);
        }
        Ok(snapshot)
    }

    /// Delete a file and everything hanging off it (chunks via cascade, FTS
    /// via trigger, vectors explicitly, all in one transaction). Returns the
    /// number of chunks removed.
    pub async fn delete_file(&self, path: &str) -> Result<u64, IndexError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin delete tx: {}", e)))?;

        let chunk_count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE file_path = ?1",
                params![path],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::store(format!("Failed to count chunks: {}", e)))?;

        Self::delete_vectors_for_file(&tx, path)?;

        tx.execute(
            "DELETE FROM chunks WHERE file_path = ?1",
            params![path],
        )
        .map_err(|e| IndexError::store(format!("Failed to delete chunks: {}", e)))?;
        tx.execute("DELETE FROM files WHERE path = ?1", params![path])
            .map_err(|e| IndexError::store(format!("Failed to delete file: {}", e)))?;

        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit delete: {}", e)))?;

        debug!("Deleted file {} ({} chunks)", path, chunk_count);
        Ok(chunk_count as u64)
    }

    // ── Chunks ───────────────────────────────────────────────────────────

    /// Replace a file's chunk set in one transaction. Rediscovered hashes
    /// are updated in place (keeping their stored uid), hashes that
    /// disappeared are deleted, and a stored chunk whose normalized content
    /// disagrees with an incoming chunk of the same hash raises
    /// `HashCollision` and rolls the transaction back.
    ///
    /// Returns the persisted uid for each input chunk, in order.
    pub async fn upsert_chunks(
        &self,
        file_id: i64,
        file_path: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<String>, IndexError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin chunk tx: {}", e)))?;

        let mut existing: HashMap<String, String> = HashMap::new();
        {
            let mut stmt = tx
                .prepare("SELECT chunk_hash, uid FROM chunks WHERE file_id = ?1")
                .map_err(|e| IndexError::store(format!("Failed to prepare: {}", e)))?;
            let rows = stmt
                .query_map(params![file_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| IndexError::store(format!("Failed to query: {}", e)))?;
            for row in rows {
                let (hash, uid) =
                    row.map_err(|e| IndexError::store(format!("Failed to read row: {}", e)))?;
                existing.insert(hash, uid);
            }
        }

        let incoming: HashSet<&str> = chunks.iter().map(|c| c.chunk_hash()).collect();

        // Chunks this file no longer produces.
        for (hash, uid) in &existing {
            if !incoming.contains(hash.as_str()) {
                Self::delete_vector_rows(&tx, uid)?;
                tx.execute("DELETE FROM chunks WHERE uid = ?1", params![uid])
                    .map_err(|e| IndexError::store(format!("Failed to delete chunk: {}", e)))?;
            }
        }

        let mut uids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let stored: Option<(String, String)> = tx
                .query_row(
                    "SELECT uid, normalized_content FROM chunks WHERE chunk_hash = ?1",
                    params![chunk.chunk_hash()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(IndexError::store(format!(
                        "Failed to probe chunk hash: {}",
                        other
                    ))),
                })?;

            match stored {
                Some((uid, normalized)) => {
                    if normalized != chunk.normalized_content() {
                        return Err(IndexError::HashCollision {
                            hash: chunk.chunk_hash().to_string(),
                            existing: uid,
                            incoming: chunk.id().to_string(),
                        });
                    }
                    tx.execute(
                        "UPDATE chunks SET
                             file_id = ?1, file_path = ?2, kind = ?3, name = ?4,
                             content = ?5, start_line = ?6, start_column = ?7,
                             end_line = ?8, end_column = ?9, start_byte = ?10,
                             end_byte = ?11, line_count = ?12, char_count = ?13,
                             language = ?14, context = ?15, documentation = ?16,
                             signature = ?17
                         WHERE uid = ?18",
                        params![
                            file_id,
                            file_path,
                            chunk.kind().as_str(),
                            chunk.name(),
                            chunk.content(),
                            chunk.span().start_line,
                            chunk.span().start_column,
                            chunk.span().end_line,
                            chunk.span().end_column,
                            chunk.span().start_byte as i64,
                            chunk.span().end_byte as i64,
                            chunk.line_count(),
                            chunk.char_count() as i64,
                            chunk.language().as_str(),
                            Self::context_json(chunk.context())?,
                            chunk.documentation(),
                            chunk.signature(),
                            uid,
                        ],
                    )
                    .map_err(|e| IndexError::store(format!("Failed to update chunk: {}", e)))?;
                    uids.push(uid);
                }
                None => {
                    tx.execute(
                        "INSERT INTO chunks (
                             uid, file_id, file_path, kind, name, content,
                             normalized_content, start_line, start_column, end_line,
                             end_column, start_byte, end_byte, line_count, char_count,
                             language, context, documentation, signature, chunk_hash
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                                   ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                        params![
                            chunk.id(),
                            file_id,
                            file_path,
                            chunk.kind().as_str(),
                            chunk.name(),
                            chunk.content(),
                            chunk.normalized_content(),
                            chunk.span().start_line,
                            chunk.span().start_column,
                            chunk.span().end_line,
                            chunk.span().end_column,
                            chunk.span().start_byte as i64,
                            chunk.span().end_byte as i64,
                            chunk.line_count(),
                            chunk.char_count() as i64,
                            chunk.language().as_str(),
                            Self::context_json(chunk.context())?,
                            chunk.documentation(),
                            chunk.signature(),
                            chunk.chunk_hash(),
                        ],
                    )
                    .map_err(|e| IndexError::store(format!("Failed to insert chunk: {}", e)))?;
                    uids.push(chunk.id().to_string());
                }
            }
        }

        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit chunks: {}", e)))?;

        debug!("Persisted {} chunks for {}", chunks.len(), file_path);
        Ok(uids)
    }

    fn context_json(context: &ChunkContext) -> Result<String, IndexError> {
        serde_json::to_string(context)
            .map_err(|e| IndexError::internal(format!("Failed to serialize context: {}", e)))
    }

    fn row_to_chunk(row: &Row) -> Result<Chunk, rusqlite::Error> {
        let context: ChunkContext =
            serde_json::from_str::<ChunkContext>(&row.get::<_, String>(16)?).unwrap_or_default();
        Ok(Chunk::reconstitute(
            row.get::<_, String>(0)?,
            row.get::<_, String>(2)?,
            ChunkKind::parse(&row.get::<_, String>(3)?),
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            Span::new(
                row.get::<_, u32>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, u32>(9)?,
                row.get::<_, u32>(10)?,
                row.get::<_, i64>(11)? as usize,
                row.get::<_, i64>(12)? as usize,
            ),
            Language::parse(&row.get::<_, String>(15)?),
            context,
            row.get::<_, Option<String>>(17)?,
            row.get::<_, Option<String>>(18)?,
            row.get::<_, String>(19)?,
        ))
    }

    const CHUNK_COLUMNS: &'static str =
        "c.uid, c.file_id, c.file_path, c.kind, c.name, c.content, c.normalized_content, \
         c.start_line, c.start_column, c.end_line, c.end_column, c.start_byte, c.end_byte, \
         c.line_count, c.char_count, c.language, c.context, c.documentation, c.signature, \
         c.chunk_hash";

    /// Query chunks with filters and pagination. With a match string the
    /// result is ordered by FTS rank (name and signature weighted above
    /// body); otherwise by start line.
    pub async fn query_chunks(&self, query: &ChunkQuery) -> Result<Vec<Chunk>, IndexError> {
        let conn = self.conn.lock().await;

        let mut clauses: Vec<String> = Vec::new();
        if let Some(kinds) = &query.kinds {
            let list = kinds
                .iter()
                .map(|k| format!("'{}'", k.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            clauses.push(format!("c.kind IN ({})", list));
        }
        if let Some(languages) = &query.languages {
            let list = languages
                .iter()
                .map(|l| format!("'{}'", l.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            clauses.push(format!("c.language IN ({})", list));
        }
        if let Some(file_id) = query.file_id {
            clauses.push(format!("c.file_id = {}", file_id));
        }
        if let Some(min) = query.min_lines {
            clauses.push(format!("c.line_count >= {}", min));
        }
        if let Some(max) = query.max_lines {
            clauses.push(format!("c.line_count <= {}", max));
        }

        let (mut sql, has_match) = match &query.match_text {
            Some(_) => (
                format!(
                    "SELECT {} FROM chunks_fts JOIN chunks c ON c.id = chunks_fts.rowid \
                     WHERE chunks_fts MATCH ?1",
                    Self::CHUNK_COLUMNS
                ),
                true,
            ),
            None => (
                format!("SELECT {} FROM chunks c WHERE 1=1", Self::CHUNK_COLUMNS),
                false,
            ),
        };
        for clause in &clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        if has_match {
            sql.push_str(" ORDER BY bm25(chunks_fts, 10.0, 5.0, 2.0, 1.0)");
        } else {
            sql.push_str(" ORDER BY c.file_path, c.start_line");
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", query.limit, query.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| IndexError::store(format!("Failed to prepare chunk query: {}", e)))?;

        let map_row = |row: &Row| Self::row_to_chunk(row);
        let rows = if let Some(text) = &query.match_text {
            stmt.query_map(params![Self::fts_escape(text)], map_row)
        } else {
            stmt.query_map([], map_row)
        }
        .map_err(|e| IndexError::store(format!("Failed to run chunk query: {}", e)))?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks
                .push(row.map_err(|e| IndexError::store(format!("Failed to read chunk: {}", e)))?);
        }
        Ok(chunks)
    }

    /// Quote each term so user input cannot break FTS5 query syntax.
    pub fn fts_escape(text: &str) -> String {
        text.split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lexical candidates for the hybrid ranker, BM25-ordered.
    pub async fn search_lexical(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<RankingCandidate>, IndexError> {
        let escaped = Self::fts_escape(query_text);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT c.file_id, c.file_path, c.start_line, c.content, c.kind, c.name, \
                        c.language, f.size_bytes, f.mtime_ms, \
                        bm25(chunks_fts, 10.0, 5.0, 2.0, 1.0) AS rank \
                 FROM chunks_fts \
                 JOIN chunks c ON c.id = chunks_fts.rowid \
                 JOIN files f ON f.id = c.file_id \
                 WHERE chunks_fts MATCH ?1 \
                 ORDER BY rank \
                 LIMIT ?2",
            )
            .map_err(|e| IndexError::store(format!("Failed to prepare lexical search: {}", e)))?;

        let rows = stmt
            .query_map(params![escaped, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, f64>(9)?,
                ))
            })
            .map_err(|e| IndexError::store(format!("Failed to run lexical search: {}", e)))?;

        let mut candidates = Vec::new();
        for (index, row) in rows.enumerate() {
            let (file_id, file_path, start_line, content, kind, name, language, size, mtime, rank) =
                row.map_err(|e| IndexError::store(format!("Failed to read result: {}", e)))?;
            candidates.push(RankingCandidate {
                source: CandidateSource::Lexical,
                source_rank: index + 1,
                // bm25() returns lower-is-better; flip the sign so every
                // source_score is higher-is-better.
                source_score: -rank as f32,
                file_id,
                file_path,
                line_number: start_line,
                snippet: content.lines().take(3).collect::<Vec<_>>().join("\n"),
                symbol_kind: Some(ChunkKind::parse(&kind)),
                symbol_name: Some(name),
                language: Language::parse(&language),
                file_size: size as u64,
                last_modified: mtime,
            });
        }
        Ok(candidates)
    }

    /// Candidates for chunk uids returned by the vector shadow, preserving
    /// the given order.
    pub async fn candidates_for_uids(
        &self,
        hits: &[(String, f64)],
    ) -> Result<Vec<RankingCandidate>, IndexError> {
        let conn = self.conn.lock().await;
        let mut candidates = Vec::new();

        for (index, (uid, distance)) in hits.iter().enumerate() {
            let row = conn
                .query_row(
                    "SELECT c.file_id, c.file_path, c.start_line, c.content, c.kind, c.name, \
                            c.language, f.size_bytes, f.mtime_ms \
                     FROM chunks c JOIN files f ON f.id = c.file_id \
                     WHERE c.uid = ?1",
                    params![uid],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u32>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, i64>(7)?,
                            row.get::<_, i64>(8)?,
                        ))
                    },
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(IndexError::store(format!(
                        "Failed to resolve vector hit: {}",
                        other
                    ))),
                })?;

            let Some((file_id, file_path, start_line, content, kind, name, language, size, mtime)) =
                row
            else {
                continue;
            };
            candidates.push(RankingCandidate {
                source: CandidateSource::Vector,
                source_rank: index + 1,
                // Cosine distance in [0, 2] becomes a similarity score.
                source_score: (1.0 - distance) as f32,
                file_id,
                file_path,
                line_number: start_line,
                snippet: content.lines().take(3).collect::<Vec<_>>().join("\n"),
                symbol_kind: Some(ChunkKind::parse(&kind)),
                symbol_name: Some(name),
                language: Language::parse(&language),
                file_size: size as u64,
                last_modified: mtime,
            });
        }
        Ok(candidates)
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    pub async fn stats(&self) -> Result<StoreStats, IndexError> {
        let conn = self.conn.lock().await;
        let count = |sql: &str| -> Result<u64, IndexError> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| IndexError::store(format!("Failed to count: {}", e)))
        };

        Ok(StoreStats {
            file_count: count("SELECT COUNT(*) FROM files")?,
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            fts_count: count("SELECT COUNT(*) FROM chunks_fts")?,
            vector_count: count("SELECT COUNT(*) FROM vec_embeddings")?,
            schema_version: migrations::current_version(&conn)?,
        })
    }

    /// Drop all indexed data (files, chunks, FTS, vectors, embedding
    /// bookkeeping) in one transaction. Schema and version stay.
    pub async fn clear_all(&self) -> Result<(), IndexError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin clear tx: {}", e)))?;
        tx.execute_batch(
            "DELETE FROM vec_embeddings;
             DELETE FROM embeddings_meta;
             DELETE FROM chunks;
             DELETE FROM files;",
        )
        .map_err(|e| IndexError::store(format!("Failed to clear store: {}", e)))?;
        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit clear: {}", e)))?;
        Ok(())
    }

    /// FTS consistency check for `doctor`: every chunk row has a shadow row
    /// and no orphan shadow rows exist.
    pub async fn fts_is_consistent(&self) -> Result<bool, IndexError> {
        let conn = self.conn.lock().await;
        let missing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks c \
                 WHERE NOT EXISTS (SELECT 1 FROM chunks_fts f WHERE f.rowid = c.id)",
                [],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::store(format!("Failed FTS check: {}", e)))?;
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks_fts f \
                 WHERE NOT EXISTS (SELECT 1 FROM chunks c WHERE c.id = f.rowid)",
                [],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::store(format!("Failed FTS orphan check: {}", e)))?;
        Ok(missing == 0 && orphans == 0)
    }

    /// Rebuild the FTS shadow from the chunks table (`doctor --fix`).
    pub async fn rebuild_fts(&self) -> Result<(), IndexError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin rebuild tx: {}", e)))?;
        tx.execute_batch(
            "DELETE FROM chunks_fts;
             INSERT INTO chunks_fts(rowid, name, signature, documentation, content)
             SELECT id, name, signature, documentation, content FROM chunks;",
        )
        .map_err(|e| IndexError::store(format!("Failed to rebuild FTS: {}", e)))?;
        tx.commit()
            .map_err(|e| IndexError::store(format!("Failed to commit rebuild: {}", e)))?;
        Ok(())
    }
}
