//! `Store`: the single entry point composing all six repositories over one
//! embedded database file.

use std::path::Path;
use std::sync::Arc;

use super::{
    ArticleErrorRepository, ArticleRepository, BlockedDomainRepository, ConfigRepository,
    CrawlerStatusRepository, Result, SourceRepository,
};
use crate::models::Source;

/// Every repository is a cheap stateless wrapper around a database path (a
/// fresh connection is opened per call), so all are `Arc`-shared: the
/// `Worker`'s phases and the `Fetcher`/`FeedCollector` they construct all
/// need to hold a repository across spawned async tasks.
pub struct Store {
    pub sources: Arc<SourceRepository>,
    pub articles: Arc<ArticleRepository>,
    pub article_errors: Arc<ArticleErrorRepository>,
    pub blocked_domains: Arc<BlockedDomainRepository>,
    pub crawler_status: Arc<CrawlerStatusRepository>,
    pub config: Arc<ConfigRepository>,
}

impl Store {
    /// Opens (creating if absent) the database at `db_path`, creating all
    /// tables and seeding the `CrawlerStatus` and `Config` singletons.
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            sources: Arc::new(SourceRepository::new(db_path)?),
            articles: Arc::new(ArticleRepository::new(db_path)?),
            article_errors: Arc::new(ArticleErrorRepository::new(db_path)?),
            blocked_domains: Arc::new(BlockedDomainRepository::new(db_path)?),
            crawler_status: Arc::new(CrawlerStatusRepository::new(db_path)?),
            config: Arc::new(ConfigRepository::new(db_path)?),
        })
    }

    /// If no sources exist, seed one default so a fresh install has
    /// something to collect on its first cycle.
    pub fn bootstrap(&self) -> Result<()> {
        if self.sources.count()? == 0 {
            self.sources.save(&Source::new(
                "https://hnrss.org/frontpage",
                "Hacker News: Front Page",
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bootstrap_seeds_default_source_once() {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("db.sqlite")).unwrap();
        store.bootstrap().unwrap();
        store.bootstrap().unwrap();
        assert_eq!(store.sources.count().unwrap(), 1);
    }

    #[test]
    fn bootstrap_is_noop_when_sources_exist() {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("db.sqlite")).unwrap();
        store
            .sources
            .save(&Source::new("https://example.com/feed.xml", "Mine"))
            .unwrap();
        store.bootstrap().unwrap();
        assert_eq!(store.sources.count().unwrap(), 1);
    }
}
