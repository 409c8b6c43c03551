//! Repository layer for database persistence.
//!
//! One embedded SQLite database, one writer at a time, WAL-mode readers.
//! Every table is created with `CREATE TABLE IF NOT EXISTS` and missing
//! columns are added additively on open — never a destructive migration.

mod article;
mod article_error;
mod blocked_domain;
mod config;
mod crawler_status;
mod source;
mod store;

pub use article::ArticleRepository;
pub use article_error::ArticleErrorRepository;
pub use blocked_domain::BlockedDomainRepository;
pub use config::ConfigRepository;
pub use crawler_status::CrawlerStatusRepository;
pub use source::SourceRepository;
pub use store::Store;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Convert a rusqlite Result<T> to Result<Option<T>>, treating
/// QueryReturnedNoRows as None.
pub fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Open a connection with concurrency-friendly pragmas. WAL mode persists
/// once set, so this is effectively one-time per database file.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 30000;
        "#,
    )?;
    Ok(conn)
}

/// Add a column to `table` if it isn't already present, per the additive
/// migration policy in the store's schema contract.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, ddl_type: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if !existing.iter().any(|c| c == column) {
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN {column} {ddl_type}"
        ))?;
    }
    Ok(())
}

/// Execute a database operation with retry logic for lock errors. Retries
/// up to 5 times with exponential backoff (100ms, 200ms, 400ms, 800ms, 1600ms).
pub fn with_retry<T, F>(mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_retries = 5;
    let mut delay_ms = 100;

    for attempt in 0..max_retries {
        match operation() {
            Ok(result) => return Ok(result),
            Err(RepositoryError::Database(ref e)) => {
                let is_lock_error = e.to_string().contains("database is locked")
                    || e.to_string().contains("SQLITE_BUSY")
                    || e.to_string().contains("SQLITE_LOCKED");

                if is_lock_error && attempt < max_retries - 1 {
                    tracing::debug!(
                        "Database locked, retrying in {}ms (attempt {}/{})",
                        delay_ms,
                        attempt + 1,
                        max_retries
                    );
                    thread::sleep(Duration::from_millis(delay_ms));
                    delay_ms *= 2;
                    continue;
                }
                return Err(RepositoryError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(
                        e.sqlite_error_code()
                            .unwrap_or(rusqlite::ffi::ErrorCode::Unknown) as i32,
                    ),
                    Some(e.to_string()),
                )));
            }
            Err(e) => return Err(e),
        }
    }

    operation()
}
