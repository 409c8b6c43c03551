//! Article repository: upsert-on-url, crawlable/unevaluated queries, all
//! filtered against `BlockedDomain`.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::{Article, ArticleUpsert, Scores};

pub struct ArticleRepository {
    db_path: PathBuf,
}

impl ArticleRepository {
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
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                host TEXT,
                resolved_url TEXT,
                original_title TEXT,
                translated_title TEXT,
                summary TEXT,
                short_summary TEXT,
                content TEXT,
                image_url TEXT,
                published_at TEXT,
                created_at TEXT NOT NULL,
                score_novelty INTEGER,
                score_importance INTEGER,
                score_reliability INTEGER,
                score_context_value INTEGER,
                score_thought_provoking INTEGER,
                average_score REAL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_host ON articles(host);
        "#,
        )?;
        // Additive migration: new columns land here as the schema grows.
        for (name, ty) in [("host", "TEXT")] {
            super::ensure_column(&conn, "articles", name, ty)?;
        }
        Ok(())
    }

    fn derive_host(url_str: &str) -> Option<String> {
        url::Url::parse(url_str)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Insert or merge an article keyed by `url`. Supplied fields overwrite;
    /// omitted fields preserve the prior row, including `resolved_url`.
    pub fn upsert(&self, update: &ArticleUpsert) -> Result<Article> {
        let conn = self.connect()?;
        let existing = Self::get_by_url_conn(&conn, &update.url)?;

        let id = existing
            .as_ref()
            .map(|a| a.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let created_at = existing
            .as_ref()
            .map(|a| a.created_at)
            .unwrap_or_else(chrono::Utc::now);

        let resolved_url = update
            .resolved_url
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.resolved_url.clone()));
        let host = Self::derive_host(resolved_url.as_deref().unwrap_or(&update.url));

        let original_title = update
            .original_title
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.original_title.clone()));
        let translated_title = update
            .translated_title
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.translated_title.clone()));
        let summary = update
            .summary
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.summary.clone()));
        let short_summary = update
            .short_summary
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.short_summary.clone()));
        let content = update
            .content
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.content.clone()));
        let image_url = update
            .image_url
            .clone()
            .or_else(|| existing.as_ref().and_then(|a| a.image_url.clone()));
        let published_at = update
            .published_at
            .or_else(|| existing.as_ref().and_then(|a| a.published_at));
        let scores = update
            .scores
            .or_else(|| existing.as_ref().map(|a| a.scores))
            .unwrap_or_default();

        super::with_retry(|| {
            conn.execute(
                r#"
                INSERT INTO articles (
                    id, url, host, resolved_url, original_title, translated_title,
                    summary, short_summary, content, image_url, published_at,
                    created_at, score_novelty, score_importance, score_reliability,
                    score_context_value, score_thought_provoking, average_score
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                ON CONFLICT(url) DO UPDATE SET
                    host = excluded.host,
                    resolved_url = excluded.resolved_url,
                    original_title = excluded.original_title,
                    translated_title = excluded.translated_title,
                    summary = excluded.summary,
                    short_summary = excluded.short_summary,
                    content = excluded.content,
                    image_url = excluded.image_url,
                    published_at = excluded.published_at,
                    score_novelty = excluded.score_novelty,
                    score_importance = excluded.score_importance,
                    score_reliability = excluded.score_reliability,
                    score_context_value = excluded.score_context_value,
                    score_thought_provoking = excluded.score_thought_provoking,
                    average_score = excluded.average_score
                "#,
                params![
                    id,
                    update.url,
                    host,
                    resolved_url,
                    original_title,
                    translated_title,
                    summary,
                    short_summary,
                    content,
                    image_url,
                    published_at.map(|d: chrono::DateTime<chrono::Utc>| d.to_rfc3339()),
                    created_at.to_rfc3339(),
                    scores.novelty,
                    scores.importance,
                    scores.reliability,
                    scores.context_value,
                    scores.thought_provoking,
                    scores.average,
                ],
            )?;
            Ok(())
        })?;

        Self::get_by_url_conn(&conn, &update.url)?
            .ok_or_else(|| super::RepositoryError::NotFound(update.url.clone()))
    }

    pub fn get(&self, id: &str) -> Result<Option<Article>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM articles WHERE id = ?")?;
        to_option(stmt.query_row(params![id], Self::row_to_article))
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let conn = self.connect()?;
        Self::get_by_url_conn(&conn, url)
    }

    fn get_by_url_conn(conn: &Connection, url: &str) -> Result<Option<Article>> {
        let mut stmt = conn.prepare("SELECT * FROM articles WHERE url = ?")?;
        to_option(stmt.query_row(params![url], Self::row_to_article))
    }

    pub fn exists_fully_processed(&self, url: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM articles WHERE url = ?1 AND length(content) >= 200 AND average_score IS NOT NULL",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Articles that are crawlable or unevaluated, filtered against
    /// `BlockedDomain`.
    pub fn unprocessed(&self, limit: u32) -> Result<Vec<Article>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM articles
            WHERE (host IS NULL OR host NOT IN (SELECT domain FROM blocked_domains))
              AND (
                content IS NULL OR length(content) < 200 OR average_score IS NULL
              )
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit], Self::row_to_article)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Articles with content but no image, filtered against `BlockedDomain`.
    pub fn without_images(&self, limit: u32) -> Result<Vec<Article>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM articles
            WHERE (host IS NULL OR host NOT IN (SELECT domain FROM blocked_domains))
              AND content IS NOT NULL
              AND image_url IS NULL
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit], Self::row_to_article)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_article(row: &rusqlite::Row) -> rusqlite::Result<Article> {
        let novelty: Option<i32> = row.get("score_novelty")?;
        let importance: Option<i32> = row.get("score_importance")?;
        let reliability: Option<i32> = row.get("score_reliability")?;
        let context_value: Option<i32> = row.get("score_context_value")?;
        let thought_provoking: Option<i32> = row.get("score_thought_provoking")?;
        let average: Option<f64> = row.get("average_score")?;

        Ok(Article {
            id: row.get("id")?,
            url: row.get("url")?,
            resolved_url: row.get("resolved_url")?,
            original_title: row.get("original_title")?,
            translated_title: row.get("translated_title")?,
            summary: row.get("summary")?,
            short_summary: row.get("short_summary")?,
            content: row.get("content")?,
            image_url: row.get("image_url")?,
            published_at: parse_datetime_opt(row.get("published_at")?),
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
            scores: Scores {
                novelty,
                importance,
                reliability,
                context_value,
                thought_provoking,
                average,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo() -> (tempfile::TempDir, ArticleRepository) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        // blocked_domains table is owned by BlockedDomainRepository; create
        // it here too since unprocessed()/without_images() reference it.
        let conn = super::super::connect(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocked_domains (domain TEXT PRIMARY KEY);",
        )
        .unwrap();
        drop(conn);
        (dir, ArticleRepository::new(&path).unwrap())
    }

    #[test]
    fn upsert_preserves_resolved_url_when_omitted() {
        let (_dir, repo) = repo();
        let mut first = ArticleUpsert::new("https://news.example/a");
        first.resolved_url = Some("https://real.example/a".to_string());
        repo.upsert(&first).unwrap();

        let mut second = ArticleUpsert::new("https://news.example/a");
        second.content = Some("x".repeat(300));
        let merged = repo.upsert(&second).unwrap();

        assert_eq!(
            merged.resolved_url.as_deref(),
            Some("https://real.example/a")
        );
        assert_eq!(merged.content.unwrap().len(), 300);
    }

    #[test]
    fn unprocessed_excludes_blocked_hosts() {
        let (_dir, repo) = repo();
        let mut a = ArticleUpsert::new("https://blocked.example/x");
        a.content = None;
        repo.upsert(&a).unwrap();

        let conn = super::super::connect(&_dir.path().join("db.sqlite")).unwrap();
        conn.execute(
            "INSERT INTO blocked_domains (domain) VALUES ('blocked.example')",
            [],
        )
        .unwrap();

        assert!(repo.unprocessed(10).unwrap().is_empty());
    }

    #[test]
    fn unprocessed_includes_short_content_and_unevaluated() {
        let (_dir, repo) = repo();
        let mut short = ArticleUpsert::new("https://example.com/short");
        short.content = Some("short".to_string());
        repo.upsert(&short).unwrap();

        let mut long_unevaluated = ArticleUpsert::new("https://example.com/long");
        long_unevaluated.content = Some("x".repeat(250));
        repo.upsert(&long_unevaluated).unwrap();

        let rows = repo.unprocessed(10).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
