//! Database layer for NeuroNest.
//!
//! Provides SQLite connection pooling and the note repository queries:
//! notes, tags, the note-tag association, and attachment rows.
//!
//! Query functions take either the pool (`&DbPool`) or, for the
//! `_tx` variants, an open transaction. None of the primitives apply
//! authorization except the explicitly owner-scoped lookups
//! (`find_note`, `lock_note_tx`, `lock_tag_tx`, `list_notes_by_owner`, ...).
//!
//! Write transactions start with a `lock_*_tx` call so they hold the WAL
//! write lock from their first statement.

mod attachments;
mod notes;
mod tags;

pub use attachments::*;
pub use notes::*;
pub use tags::*;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Type alias for an open SQLite transaction.
pub type DbTransaction<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

/// Initialize the database connection pool.
///
/// Creates parent directories if needed and configures SQLite with
/// WAL journaling, foreign keys, and a bounded busy timeout.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    // Create parent directories if they don't exist
    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .foreign_keys(true)
        .pragma("temp_store", "memory");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let schema = include_str!("../../schema.sql");

    info!("Initializing database schema");

    for statement in schema.split(';') {
        // Strip comment lines, keeping only actual SQL
        let clean_stmt: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let clean_stmt = clean_stmt.trim();
        if clean_stmt.is_empty() {
            continue;
        }
        sqlx::query(clean_stmt).execute(pool).await?;
    }

    info!("Database schema initialized successfully");

    Ok(())
}

/// Health check for the database connection.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Parse a JSON array column. An empty value is an empty list; anything
/// unparseable is logged and read as empty.
pub(crate) fn parse_json_list<T: serde::de::DeserializeOwned>(raw: &str) -> Vec<T> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, value = raw, "Discarding unparseable JSON list column");
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub async fn setup_test_db() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_in_memory() {
        let pool = init_pool(":memory:").await.unwrap();
        assert!(pool.size() > 0);
        health_check(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(table_names, vec!["attachments", "note_tags", "notes", "tags"]);
    }

    #[test]
    fn test_parse_json_list() {
        assert_eq!(parse_json_list::<i64>("[1,2,3]"), vec![1, 2, 3]);
        assert!(parse_json_list::<i64>("").is_empty());
        assert!(parse_json_list::<i64>("not json").is_empty());
    }
}
