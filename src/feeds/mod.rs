//! FeedCollector: parses configured sources into deduplicated candidate
//! articles, resolving aggregator redirects along the way.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::models::Source;
use crate::repository::ArticleRepository;
use crate::scrapers::Fetcher;

const RESOLUTION_BATCH_SIZE: usize = 5;

/// An item collected from a feed, prior to crawling.
#[derive(Debug, Clone)]
pub struct CollectedArticle {
    pub url: String,
    pub resolved_url: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub feed_source: String,
    /// The feed's own title for this entry, carried as `original_title`
    /// until the crawl phase overwrites it with the page's own title.
    pub title_hint: Option<String>,
}

pub struct FeedCollector {
    fetcher: Arc<Fetcher>,
    articles: Arc<ArticleRepository>,
}

impl FeedCollector {
    pub fn new(fetcher: Arc<Fetcher>, articles: Arc<ArticleRepository>) -> Self {
        Self { fetcher, articles }
    }

    /// Collects candidate articles across all `sources`, fetching up to
    /// `concurrency` feeds at once, deduplicated by `resolvedUrl || url`.
    pub async fn collect_all(&self, sources: &[Source], concurrency: usize) -> Vec<CollectedArticle> {
        let per_feed: Vec<Vec<CollectedArticle>> = stream::iter(sources.iter())
            .map(|source| self.collect_one(source))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut deduped = Vec::new();
        for item in per_feed.into_iter().flatten() {
            let key = item.resolved_url.clone().unwrap_or_else(|| item.url.clone());
            if seen.insert(key) {
                deduped.push(item);
            }
        }
        deduped
    }

    async fn collect_one(&self, source: &Source) -> Vec<CollectedArticle> {
        let body = match self.read_feed_body(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("feed fetch failed for {}: {e}", source.url);
                return Vec::new();
            }
        };

        let feed = match feed_rs::parser::parse(body.as_slice()) {
            Ok(feed) => feed,
            Err(e) => {
                warn!(
                    "feed parse failed for {} ({e}); retrying via browser fallback",
                    source.url
                );
                match self.fetch_feed_via_browser(&source.url).await {
                    Ok(feed) => feed,
                    Err(e) => {
                        warn!("browser-fallback feed fetch/parse failed for {}: {e}", source.url);
                        return Vec::new();
                    }
                }
            }
        };

        let candidates: Vec<(String, Option<DateTime<Utc>>, Option<String>)> = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let link = entry.links.first()?.href.clone();
                if link.trim().is_empty() {
                    return None;
                }
                let title_hint = entry.title.map(|t| t.content);
                Some((link, entry.published.map(|d| d.with_timezone(&Utc)), title_hint))
            })
            .collect();

        let mut collected = Vec::new();
        for batch in candidates.chunks(RESOLUTION_BATCH_SIZE) {
            let resolved_batch: Vec<Option<CollectedArticle>> = stream::iter(batch.iter().cloned())
                .map(|(url, pub_date, title_hint)| self.resolve_one(&source.name, url, pub_date, title_hint))
                .buffer_unordered(RESOLUTION_BATCH_SIZE)
                .collect()
                .await;
            collected.extend(resolved_batch.into_iter().flatten());
        }

        info!(
            "collected {} candidate(s) from {}",
            collected.len(),
            source.name
        );
        collected
    }

    async fn resolve_one(
        &self,
        feed_source: &str,
        url: String,
        pub_date: Option<DateTime<Utc>>,
        title_hint: Option<String>,
    ) -> Option<CollectedArticle> {
        if self.articles.exists_fully_processed(&url).ok()? {
            return None;
        }

        let cached_resolved = self
            .articles
            .get_by_url(&url)
            .ok()
            .flatten()
            .and_then(|a| a.resolved_url);

        let resolved_url = match cached_resolved {
            Some(resolved) => Some(resolved),
            None => match self.fetcher.resolve_aggregator(&url).await {
                Ok(resolved) if resolved != url => Some(resolved),
                _ => None,
            },
        };

        Some(CollectedArticle {
            url,
            resolved_url,
            pub_date,
            feed_source: feed_source.to_string(),
            title_hint,
        })
    }

    async fn fetch_feed_via_browser(&self, url: &str) -> Result<feed_rs::model::Feed, String> {
        let content = self
            .fetcher
            .fetch_raw_via_browser(url)
            .await
            .map_err(|e| e.to_string())?;
        feed_rs::parser::parse(content.bytes.as_slice()).map_err(|e| e.to_string())
    }

    async fn read_feed_body(&self, url: &str) -> Result<Vec<u8>, String> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path).await.map_err(|e| e.to_string());
        }

        match self.fetcher.fetch(url).await {
            Ok(content) => Ok(content.bytes),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_by_resolved_url_prefers_resolved_over_raw() {
        let mut seen = HashSet::new();
        let items = vec![
            CollectedArticle {
                url: "https://news.google.com/rss/articles/a".to_string(),
                resolved_url: Some("https://site.example/a".to_string()),
                pub_date: None,
                feed_source: "Feed".to_string(),
                title_hint: None,
            },
            CollectedArticle {
                url: "https://other-aggregator.example/a".to_string(),
                resolved_url: Some("https://site.example/a".to_string()),
                pub_date: None,
                feed_source: "Feed".to_string(),
                title_hint: None,
            },
        ];
        let mut kept = 0;
        for item in items {
            let key = item.resolved_url.clone().unwrap_or_else(|| item.url.clone());
            if seen.insert(key) {
                kept += 1;
            }
        }
        assert_eq!(kept, 1);
    }
}
