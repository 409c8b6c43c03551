//! The singleton `Config` row, seeded with defaults on first open.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::Result;
use crate::models::Config;

const SINGLETON_ID: i64 = 1;

pub struct ConfigRepository {
    db_path: PathBuf,
}

impl ConfigRepository {
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
            CREATE TABLE IF NOT EXISTS config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                llm_api_key TEXT,
                webhook_url TEXT,
                score_threshold REAL NOT NULL,
                feed_fetch_concurrency INTEGER NOT NULL,
                max_concurrent_per_domain INTEGER NOT NULL,
                max_total_concurrent INTEGER NOT NULL,
                domain_delay_ms INTEGER NOT NULL,
                eval_concurrency INTEGER NOT NULL
            );
        "#,
        )?;
        let defaults = Config::default();
        conn.execute(
            r#"
            INSERT INTO config (
                id, llm_api_key, webhook_url, score_threshold, feed_fetch_concurrency,
                max_concurrent_per_domain, max_total_concurrent, domain_delay_ms, eval_concurrency
            ) VALUES (?1, NULL, NULL, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                SINGLETON_ID,
                defaults.score_threshold,
                defaults.feed_fetch_concurrency,
                defaults.max_concurrent_per_domain,
                defaults.max_total_concurrent,
                defaults.domain_delay_ms,
                defaults.eval_concurrency,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self) -> Result<Config> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM config WHERE id = ?1",
            params![SINGLETON_ID],
            Self::row_to_config,
        )
        .map_err(Into::into)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute(
                r#"
                UPDATE config SET
                    llm_api_key = ?1,
                    webhook_url = ?2,
                    score_threshold = ?3,
                    feed_fetch_concurrency = ?4,
                    max_concurrent_per_domain = ?5,
                    max_total_concurrent = ?6,
                    domain_delay_ms = ?7,
                    eval_concurrency = ?8
                WHERE id = ?9
                "#,
                params![
                    config.llm_api_key,
                    config.webhook_url,
                    config.score_threshold,
                    config.feed_fetch_concurrency,
                    config.max_concurrent_per_domain,
                    config.max_total_concurrent,
                    config.domain_delay_ms,
                    config.eval_concurrency,
                    SINGLETON_ID,
                ],
            )?;
            Ok(())
        })
    }

    fn row_to_config(row: &rusqlite::Row) -> rusqlite::Result<Config> {
        Ok(Config {
            llm_api_key: row.get("llm_api_key")?,
            webhook_url: row.get("webhook_url")?,
            score_threshold: row.get("score_threshold")?,
            feed_fetch_concurrency: row.get("feed_fetch_concurrency")?,
            max_concurrent_per_domain: row.get("max_concurrent_per_domain")?,
            max_total_concurrent: row.get("max_total_concurrent")?,
            domain_delay_ms: row.get("domain_delay_ms")?,
            eval_concurrency: row.get("eval_concurrency")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeds_defaults_on_first_open() {
        let dir = tempdir().unwrap();
        let repo = ConfigRepository::new(&dir.path().join("db.sqlite")).unwrap();
        let config = repo.get().unwrap();
        assert_eq!(config.score_threshold, 3.5);
        assert_eq!(config.max_concurrent_per_domain, 2);
        assert_eq!(config.max_total_concurrent, 10);
        assert_eq!(config.domain_delay_ms, 1000);
    }

    #[test]
    fn save_persists_changes() {
        let dir = tempdir().unwrap();
        let repo = ConfigRepository::new(&dir.path().join("db.sqlite")).unwrap();
        let mut config = repo.get().unwrap();
        config.score_threshold = 4.0;
        config.webhook_url = Some("https://hooks.example/x".to_string());
        repo.save(&config).unwrap();

        let reloaded = repo.get().unwrap();
        assert_eq!(reloaded.score_threshold, 4.0);
        assert_eq!(reloaded.webhook_url.as_deref(), Some("https://hooks.example/x"));
    }
}
