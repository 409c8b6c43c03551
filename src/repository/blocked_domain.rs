//! `BlockedDomain` repository: hosts treated as permanently hostile for the
//! remainder of the process lifetime.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{parse_datetime, to_option, Result};
use crate::models::BlockedDomain;

pub struct BlockedDomainRepository {
    db_path: PathBuf,
}

impl BlockedDomainRepository {
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
            CREATE TABLE IF NOT EXISTS blocked_domains (
                id TEXT PRIMARY KEY,
                domain TEXT NOT NULL UNIQUE,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Block `domain`, ignoring the call if already blocked.
    pub fn block(&self, domain: &BlockedDomain) -> Result<()> {
        let conn = self.connect()?;
        super::with_retry(|| {
            conn.execute(
                r#"
                INSERT INTO blocked_domains (id, domain, reason, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(domain) DO NOTHING
                "#,
                params![
                    domain.id,
                    domain.domain,
                    domain.reason,
                    domain.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn is_blocked(&self, domain: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM blocked_domains WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_by_domain(&self, domain: &str) -> Result<Option<BlockedDomain>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM blocked_domains WHERE domain = ?")?;
        to_option(stmt.query_row(params![domain], Self::row_to_domain))
    }

    pub fn get_all(&self) -> Result<Vec<BlockedDomain>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM blocked_domains ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], Self::row_to_domain)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_domain(row: &rusqlite::Row) -> rusqlite::Result<BlockedDomain> {
        Ok(BlockedDomain {
            id: row.get("id")?,
            domain: row.get("domain")?,
            reason: row.get("reason")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn block_is_idempotent_per_domain() {
        let dir = tempdir().unwrap();
        let repo = BlockedDomainRepository::new(&dir.path().join("db.sqlite")).unwrap();
        repo.block(&BlockedDomain::new("evil.example", "DataDome bot protection"))
            .unwrap();
        repo.block(&BlockedDomain::new("evil.example", "retried reason"))
            .unwrap();

        assert!(repo.is_blocked("evil.example").unwrap());
        let found = repo.get_by_domain("evil.example").unwrap().unwrap();
        assert_eq!(found.reason, "DataDome bot protection");
    }

    #[test]
    fn unblocked_domain_reports_false() {
        let dir = tempdir().unwrap();
        let repo = BlockedDomainRepository::new(&dir.path().join("db.sqlite")).unwrap();
        assert!(!repo.is_blocked("clean.example").unwrap());
    }
}
