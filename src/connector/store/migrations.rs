//! Ordered SQL migrations and the runner that applies them.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::domain::IndexError;

pub struct Migration {
    pub version: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Migrations in apply order. File names follow `NNN_<description>.sql`.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001",
        description: "initial schema: files, chunks, chunks_fts",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        version: "002",
        description: "embedding bookkeeping",
        sql: include_str!("migrations/002_embeddings.sql"),
    },
];

pub fn max_known_version() -> &'static str {
    MIGRATIONS.last().map(|m| m.version).unwrap_or("000")
}

/// Apply all pending migrations, each in its own transaction. Refuses to
/// run against a store whose version exceeds the newest known migration;
/// a failed migration rolls back and later ones are not attempted.
pub fn run(conn: &mut Connection) -> Result<(), IndexError> {
    let current = current_version(conn)?;

    if current.as_str() > max_known_version() {
        return Err(IndexError::SchemaVersionMismatch {
            on_disk: current,
            supported: max_known_version().to_string(),
        });
    }

    for migration in MIGRATIONS {
        if migration.version <= current.as_str() {
            continue;
        }

        let tx = conn
            .transaction()
            .map_err(|e| IndexError::store(format!("Failed to begin migration tx: {}", e)))?;

        tx.execute_batch(migration.sql)
            .map_err(|e| IndexError::MigrationFailure {
                version: migration.version.to_string(),
                message: e.to_string(),
            })?;

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
            [migration.version],
        )
        .map_err(|e| IndexError::MigrationFailure {
            version: migration.version.to_string(),
            message: e.to_string(),
        })?;

        tx.execute(
            "INSERT INTO migration_history (version, description, applied_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            [migration.version, migration.description],
        )
        .map_err(|e| IndexError::MigrationFailure {
            version: migration.version.to_string(),
            message: e.to_string(),
        })?;

        tx.commit().map_err(|e| IndexError::MigrationFailure {
            version: migration.version.to_string(),
            message: format!("commit failed: {}", e),
        })?;

        info!(
            "Applied migration {} ({})",
            migration.version, migration.description
        );
    }

    debug!("Store schema at version {}", max_known_version());
    Ok(())
}

/// Current `meta.schema_version`, or "000" on a fresh database.
pub fn current_version(conn: &Connection) -> Result<String, IndexError> {
    let has_meta: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .map_err(|e| IndexError::store(format!("Failed to inspect schema: {}", e)))?;

    if !has_meta {
        return Ok("000".to_string());
    }

    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok("000".to_string()),
        other => Err(IndexError::store(format!(
            "Failed to read schema version: {}",
            other
        ))),
    })
}
