//! The singleton `CrawlerStatus` row: atomic partial updates and the
//! process-lease acquisition protocol.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::{parse_datetime_opt, Result};
use crate::models::{CrawlerStatus, CrawlerStatusUpdate};

const SINGLETON_ID: i64 = 1;

pub struct CrawlerStatusRepository {
    db_path: PathBuf,
}

impl CrawlerStatusRepository {
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
            CREATE TABLE IF NOT EXISTS crawler_status (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                is_crawling INTEGER NOT NULL,
                last_run TEXT,
                current_task TEXT NOT NULL,
                articles_processed INTEGER NOT NULL,
                last_error TEXT,
                worker_pid INTEGER
            );
        "#,
        )?;
        conn.execute(
            r#"
            INSERT INTO crawler_status (id, is_crawling, last_run, current_task, articles_processed, last_error, worker_pid)
            VALUES (?1, 0, NULL, ?2, 0, NULL, NULL)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![SINGLETON_ID, CrawlerStatus::default().current_task],
        )?;
        Ok(())
    }

    pub fn get(&self) -> Result<CrawlerStatus> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM crawler_status WHERE id = ?1",
            params![SINGLETON_ID],
            Self::row_to_status,
        )
        .map_err(Into::into)
    }

    /// Apply only the provided fields.
    pub fn update(&self, update: &CrawlerStatusUpdate) -> Result<CrawlerStatus> {
        let conn = self.connect()?;
        let current = conn.query_row(
            "SELECT * FROM crawler_status WHERE id = ?1",
            params![SINGLETON_ID],
            Self::row_to_status,
        )?;

        let merged = CrawlerStatus {
            is_crawling: update.is_crawling.unwrap_or(current.is_crawling),
            last_run: update.last_run.or(current.last_run),
            current_task: update
                .current_task
                .clone()
                .unwrap_or(current.current_task),
            articles_processed: update
                .articles_processed
                .unwrap_or(current.articles_processed),
            last_error: update
                .last_error
                .clone()
                .unwrap_or(current.last_error),
            worker_pid: update.worker_pid.unwrap_or(current.worker_pid),
        };

        super::with_retry(|| {
            conn.execute(
                r#"
                UPDATE crawler_status SET
                    is_crawling = ?1,
                    last_run = ?2,
                    current_task = ?3,
                    articles_processed = ?4,
                    last_error = ?5,
                    worker_pid = ?6
                WHERE id = ?7
                "#,
                params![
                    merged.is_crawling,
                    merged.last_run.map(|d: chrono::DateTime<chrono::Utc>| d.to_rfc3339()),
                    merged.current_task,
                    merged.articles_processed,
                    merged.last_error,
                    merged.worker_pid,
                    SINGLETON_ID,
                ],
            )?;
            Ok(())
        })?;

        Ok(merged)
    }

    /// Attempt to acquire the singleton worker lease.
    ///
    /// Returns `Some(status)` with `is_crawling=1, worker_pid=pid` if the
    /// lease was granted: no live worker held it, or the held lease was
    /// stale (dead PID). Returns `None` if another live worker already
    /// holds the lease. `is_alive` probes the recorded PID's liveness.
    pub fn acquire_lease(&self, pid: i32, is_alive: impl Fn(i32) -> bool) -> Result<Option<CrawlerStatus>> {
        let conn = self.connect()?;

        super::with_retry(|| {
            conn.execute("BEGIN IMMEDIATE", [])?;

            let result: Result<Option<CrawlerStatus>> = (|| {
                let current = conn.query_row(
                    "SELECT * FROM crawler_status WHERE id = ?1",
                    params![SINGLETON_ID],
                    Self::row_to_status,
                )?;

                let lease_held = current.is_crawling
                    && current
                        .worker_pid
                        .map(|held| held != pid && is_alive(held))
                        .unwrap_or(false);

                if lease_held {
                    return Ok(None);
                }

                let now = chrono::Utc::now();
                conn.execute(
                    r#"
                    UPDATE crawler_status SET
                        is_crawling = 1,
                        worker_pid = ?1,
                        last_run = ?2,
                        current_task = 'Initializing'
                    WHERE id = ?3
                    "#,
                    params![pid, now.to_rfc3339(), SINGLETON_ID],
                )?;

                Ok(Some(CrawlerStatus {
                    is_crawling: true,
                    last_run: Some(now),
                    current_task: "Initializing".to_string(),
                    articles_processed: current.articles_processed,
                    last_error: current.last_error,
                    worker_pid: Some(pid),
                }))
            })();

            if result.is_ok() {
                conn.execute("COMMIT", [])?;
            } else {
                let _ = conn.execute("ROLLBACK", []);
            }

            result
        })
    }

    /// Atomically bumps `articles_processed` by one. Expressed as a single
    /// `UPDATE ... SET col = col + 1` statement rather than a read-then-write
    /// `update()` call so concurrent completions from the same phase (Phase
    /// 2's per-host tasks, Phase 3's evaluation batch) never lose a count.
    pub fn increment_articles_processed(&self) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute(
                "UPDATE crawler_status SET articles_processed = articles_processed + 1 WHERE id = ?1",
                params![SINGLETON_ID],
            )?;
            Ok(())
        })
    }

    /// Release the lease: `is_crawling=0, current_task="Idle", worker_pid=null`.
    pub fn release_lease(&self) -> Result<()> {
        self.update(&CrawlerStatusUpdate {
            is_crawling: Some(false),
            current_task: Some("Idle".to_string()),
            worker_pid: Some(None),
            ..Default::default()
        })?;
        Ok(())
    }

    fn row_to_status(row: &rusqlite::Row) -> rusqlite::Result<CrawlerStatus> {
        Ok(CrawlerStatus {
            is_crawling: row.get("is_crawling")?,
            last_run: parse_datetime_opt(row.get("last_run")?),
            current_task: row.get("current_task")?,
            articles_processed: row.get("articles_processed")?,
            last_error: row.get("last_error")?,
            worker_pid: row.get("worker_pid")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeds_idle_singleton_on_open() {
        let dir = tempdir().unwrap();
        let repo = CrawlerStatusRepository::new(&dir.path().join("db.sqlite")).unwrap();
        let status = repo.get().unwrap();
        assert!(!status.is_crawling);
        assert_eq!(status.current_task, "Idle");
    }

    #[test]
    fn acquire_lease_fails_when_another_live_worker_holds_it() {
        let dir = tempdir().unwrap();
        let repo = CrawlerStatusRepository::new(&dir.path().join("db.sqlite")).unwrap();
        repo.acquire_lease(100, |_| true).unwrap();

        let second = repo.acquire_lease(200, |pid| pid == 100).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn acquire_lease_reclaims_stale_dead_pid() {
        let dir = tempdir().unwrap();
        let repo = CrawlerStatusRepository::new(&dir.path().join("db.sqlite")).unwrap();
        repo.acquire_lease(99999, |_| false).unwrap();

        let reclaimed = repo.acquire_lease(200, |_| false).unwrap();
        assert_eq!(reclaimed.unwrap().worker_pid, Some(200));
    }

    #[test]
    fn increment_articles_processed_accumulates() {
        let dir = tempdir().unwrap();
        let repo = CrawlerStatusRepository::new(&dir.path().join("db.sqlite")).unwrap();
        repo.increment_articles_processed().unwrap();
        repo.increment_articles_processed().unwrap();
        repo.increment_articles_processed().unwrap();

        assert_eq!(repo.get().unwrap().articles_processed, 3);
    }

    #[test]
    fn release_lease_resets_to_idle() {
        let dir = tempdir().unwrap();
        let repo = CrawlerStatusRepository::new(&dir.path().join("db.sqlite")).unwrap();
        repo.acquire_lease(100, |_| true).unwrap();
        repo.release_lease().unwrap();

        let status = repo.get().unwrap();
        assert!(!status.is_crawling);
        assert_eq!(status.current_task, "Idle");
        assert_eq!(status.worker_pid, None);
    }
}
