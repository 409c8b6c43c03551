//! `ArticleError` repository: one record per failing URL, replace-on-new-failure,
//! clear-on-success.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::{parse_datetime, to_option, Result};
use crate::models::{ArticleError, Phase};

pub struct ArticleErrorRepository {
    db_path: PathBuf,
}

impl ArticleErrorRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS article_errors (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                title_hint TEXT,
                error_message TEXT NOT NULL,
                stack_trace TEXT,
                phase TEXT NOT NULL,
                context TEXT,
                created_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Record a new failure for `error.url`, replacing any prior record for
    /// the same URL.
    pub fn record(&self, error: &ArticleError) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute(
                r#"
                INSERT INTO article_errors (
                    id, url, title_hint, error_message, stack_trace, phase, context, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                ON CONFLICT(url) DO UPDATE SET
                    id = excluded.id,
                    title_hint = excluded.title_hint,
                    error_message = excluded.error_message,
                    stack_trace = excluded.stack_trace,
                    phase = excluded.phase,
                    context = excluded.context,
                    created_at = excluded.created_at
                "#,
                params![
                    error.id,
                    error.url,
                    error.title_hint,
                    error.error_message,
                    error.stack_trace,
                    error.phase.as_str(),
                    error.context,
                    error.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Delete the error record for `url`, if any. Called on successful full
    /// processing of that URL.
    pub fn clear(&self, url: &str) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute("DELETE FROM article_errors WHERE url = ?", params![url])?;
            Ok(())
        })
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<ArticleError>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM article_errors WHERE url = ?")?;
        to_option(stmt.query_row(params![url], Self::row_to_error))
    }

    /// The most recent `limit` errors, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<ArticleError>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM article_errors ORDER BY created_at DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit], Self::row_to_error)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_error(row: &rusqlite::Row) -> rusqlite::Result<ArticleError> {
        let phase_str: String = row.get("phase")?;
        Ok(ArticleError {
            id: row.get("id")?,
            url: row.get("url")?,
            title_hint: row.get("title_hint")?,
            error_message: row.get("error_message")?,
            stack_trace: row.get("stack_trace")?,
            phase: Phase::from_str(&phase_str).unwrap_or(Phase::Crawl),
            context: row.get("context")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo() -> (tempfile::TempDir, ArticleErrorRepository) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        (dir, ArticleErrorRepository::new(&path).unwrap())
    }

    #[test]
    fn record_replaces_prior_failure_for_same_url() {
        let (_dir, repo) = repo();
        let first = ArticleError::new("https://example.com/a", Phase::Crawl, "timeout");
        repo.record(&first).unwrap();
        let second = ArticleError::new("https://example.com/a", Phase::Eval, "invalid_llm_response");
        repo.record(&second).unwrap();

        let found = repo.get_by_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(found.phase, Phase::Eval);
        assert_eq!(found.error_message, "invalid_llm_response");
    }

    #[test]
    fn clear_removes_record() {
        let (_dir, repo) = repo();
        let e = ArticleError::new("https://example.com/a", Phase::Crawl, "timeout");
        repo.record(&e).unwrap();
        repo.clear("https://example.com/a").unwrap();
        assert!(repo.get_by_url("https://example.com/a").unwrap().is_none());
    }
}
