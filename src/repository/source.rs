//! Source repository for SQLite persistence.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::{parse_datetime, to_option, Result};
use crate::models::Source;

/// SQLite-backed source repository.
pub struct SourceRepository {
    db_path: PathBuf,
}

impl SourceRepository {
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
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources WHERE id = ?")?;
        to_option(stmt.query_row(params![id], Self::row_to_source))
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources WHERE url = ?")?;
        to_option(stmt.query_row(params![url], Self::row_to_source))
    }

    pub fn get_all(&self) -> Result<Vec<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources ORDER BY created_at ASC")?;
        let sources = stmt
            .query_map([], Self::row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    pub fn save(&self, source: &Source) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute(
                r#"
                INSERT INTO sources (id, url, name, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(url) DO UPDATE SET
                    name = excluded.name
                "#,
                params![
                    source.id,
                    source.url,
                    source.name,
                    source.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        super::with_retry(|| Ok(conn.execute("DELETE FROM sources WHERE id = ?", params![id])? > 0))
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
        Ok(Source {
            id: row.get("id")?,
            url: row.get("url")?,
            name: row.get("name")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_fetch_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = SourceRepository::new(&dir.path().join("db.sqlite")).unwrap();
        let source = Source::new("https://example.com/feed.xml", "Example Feed");
        repo.save(&source).unwrap();

        let fetched = repo.get(&source.id).unwrap().unwrap();
        assert_eq!(fetched.url, source.url);
        assert_eq!(fetched.name, source.name);
    }

    #[test]
    fn save_is_unique_by_url() {
        let dir = tempdir().unwrap();
        let repo = SourceRepository::new(&dir.path().join("db.sqlite")).unwrap();
        let mut a = Source::new("https://example.com/feed.xml", "First Name");
        repo.save(&a).unwrap();
        a.id = uuid::Uuid::new_v4().to_string();
        a.name = "Renamed".to_string();
        repo.save(&a).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let fetched = repo.get_by_url("https://example.com/feed.xml").unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
    }
}
