//! Fetcher: two-tier HTTP retrieval plus aggregator-redirect resolution and
//! bot-detection fingerprinting.

mod aggregator;
pub mod bot_detection;
pub mod browser;
mod http_client;

pub use browser::{BrowserConfig, BrowserFetcher};
pub use http_client::HttpClient;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::BlockedDomain;
use crate::repository::BlockedDomainRepository;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Failed to reach source (Timeout)")]
    Timeout,
    #[error("Article not found (404)")]
    NotFound,
    #[error("Domain blocked: {0}")]
    Blocked(String),
    #[error("Could not extract readable text from page")]
    ReadabilityFailed,
    #[error("{0}")]
    Transport(String),
}

pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub final_url: String,
}

const DIRECT_TIMEOUT: Duration = Duration::from_secs(15);
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(30);
const BROWSER_TIMEOUT: Duration = Duration::from_secs(45);

pub struct Fetcher {
    http: HttpClient,
    browser: BrowserFetcher,
    blocked_domains: Arc<BlockedDomainRepository>,
}

impl Fetcher {
    pub fn new(blocked_domains: Arc<BlockedDomainRepository>) -> Self {
        Self {
            http: HttpClient::new(DIRECT_TIMEOUT),
            browser: BrowserFetcher::new(BrowserConfig {
                timeout: BROWSER_TIMEOUT,
                ..BrowserConfig::default()
            }),
            blocked_domains,
        }
    }

    fn host_of(url: &str) -> Option<String> {
        url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
    }

    async fn is_blocked(&self, url: &str) -> bool {
        match Self::host_of(url) {
            Some(host) => self.blocked_domains.is_blocked(&host).unwrap_or(false),
            None => false,
        }
    }

    async fn block(&self, url: &str, reason: &str) {
        if let Some(host) = Self::host_of(url) {
            let _ = self.blocked_domains.block(&BlockedDomain::new(host, reason));
        }
    }

    /// Resolves an aggregator redirect URL to its real target. Structural
    /// base64 decoding is attempted first (no network I/O); if that fails,
    /// falls back to navigating with the browser and reading `page.url()`.
    pub async fn resolve_aggregator(&self, url: &str) -> Result<String, FetchError> {
        if !aggregator::is_aggregator_url(url) {
            return Ok(url.to_string());
        }
        if let Some(resolved) = aggregator::try_decode(url) {
            return Ok(resolved);
        }

        match tokio::time::timeout(REDIRECT_TIMEOUT, self.browser.fetch(url)).await {
            Ok(Ok(result)) => Ok(result.final_url),
            Ok(Err(e)) => Err(FetchError::Transport(e.to_string())),
            Err(_elapsed) => Err(FetchError::Timeout),
        }
    }

    /// Fetches `url`, following the direct-then-browser strategy of §4.2.
    pub async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        if self.is_blocked(url).await {
            let host = Self::host_of(url).unwrap_or_default();
            return Err(FetchError::Blocked(host));
        }

        match self.http.get(url).await {
            Ok(response) if response.status == StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            Ok(response)
                if response.status == StatusCode::UNAUTHORIZED
                    || response.status == StatusCode::FORBIDDEN =>
            {
                self.fetch_via_browser(url, response.status).await
            }
            Ok(response) if response.status.is_success() => Ok(FetchedContent {
                bytes: response.body,
                content_type: response.content_type,
                final_url: response.final_url,
            }),
            Ok(response) if (response.status.as_u16()) < 500 => Ok(FetchedContent {
                bytes: response.body,
                content_type: response.content_type,
                final_url: response.final_url,
            }),
            Ok(response) => Err(FetchError::Transport(format!(
                "HTTP {} {}",
                response.status.as_u16(),
                response.status.canonical_reason().unwrap_or("")
            ))),
            Err(e) if e.is_timeout() => Err(FetchError::Timeout),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }

    async fn fetch_via_browser(
        &self,
        url: &str,
        direct_status: StatusCode,
    ) -> Result<FetchedContent, FetchError> {
        match self.browser.fetch(url).await {
            Ok(result) => {
                if let Some(reason) = bot_detection::detect(&result.html) {
                    warn!("bot protection fingerprint matched for {url}: {reason}");
                    self.block(url, reason).await;
                    let host = Self::host_of(url).unwrap_or_default();
                    return Err(FetchError::Blocked(host));
                }
                info!("browser fallback succeeded for {url} after HTTP {direct_status}");
                Ok(FetchedContent {
                    bytes: result.html.into_bytes(),
                    content_type: Some("text/html".to_string()),
                    final_url: result.final_url,
                })
            }
            Err(e) => {
                self.block(
                    url,
                    &format!("HTTP {} + browser fetch failed", direct_status.as_u16()),
                )
                .await;
                Err(FetchError::Transport(e.to_string()))
            }
        }
    }

    pub async fn close_browser(&self) {
        self.browser.close().await;
    }

    /// Fetches `url` through the browser fallback directly, bypassing the
    /// direct-HTTP tier. Used by the feed collector when a feed fetched
    /// directly fails to parse (§4.4 step 1).
    pub async fn fetch_raw_via_browser(&self, url: &str) -> Result<FetchedContent, FetchError> {
        if self.is_blocked(url).await {
            let host = Self::host_of(url).unwrap_or_default();
            return Err(FetchError::Blocked(host));
        }
        match self.browser.fetch(url).await {
            Ok(result) => Ok(FetchedContent {
                bytes: result.html.into_bytes(),
                content_type: Some("text/html".to_string()),
                final_url: result.final_url,
            }),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blocked_repo() -> (tempfile::TempDir, Arc<BlockedDomainRepository>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        (dir, Arc::new(BlockedDomainRepository::new(&path).unwrap()))
    }

    #[tokio::test]
    async fn fetch_returns_not_found_on_404() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let (_dir, repo) = blocked_repo();
        let fetcher = Fetcher::new(repo);
        let url = format!("{}/missing", server.url());
        let result = fetcher.fetch(&url).await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }

    #[tokio::test]
    async fn fetch_rejects_blocked_host_without_network_call() {
        let (_dir, repo) = blocked_repo();
        repo.block(&BlockedDomain::new("blocked.example", "DataDome bot protection"))
            .unwrap();
        let fetcher = Fetcher::new(repo);
        let result = fetcher.fetch("https://blocked.example/a").await;
        assert!(matches!(result, Err(FetchError::Blocked(h)) if h == "blocked.example"));
    }

    #[tokio::test]
    async fn fetch_returns_success_body_on_200() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/a")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let (_dir, repo) = blocked_repo();
        let fetcher = Fetcher::new(repo);
        let url = format!("{}/a", server.url());
        let content = fetcher.fetch(&url).await.unwrap();
        assert_eq!(content.content_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn resolve_aggregator_is_noop_for_ordinary_urls() {
        assert!(aggregator::is_aggregator_url("https://news.google.com/rss/articles/x"));
        assert!(!aggregator::is_aggregator_url("https://site.example/a"));
    }
}
