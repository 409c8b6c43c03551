//! Worker: the singleton-leased orchestrator that drives one ingestion cycle
//! through collection, domain-throttled crawling, image backfill, and LLM
//! evaluation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::domain_queue::{DomainQueue, DomainQueueConfig};
use crate::extractor;
use crate::feeds::{CollectedArticle, FeedCollector};
use crate::llm::{Evaluator, LlmClient, LlmConfig};
use crate::models::{ArticleError, ArticleUpsert, Phase};
use crate::notifier::Notifier;
use crate::repository::{RepositoryError, Store};
use crate::scrapers::Fetcher;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

type Result<T> = std::result::Result<T, WorkerError>;

const IMAGE_BACKFILL_LIMIT: u32 = 100;
const IMAGE_BACKFILL_DELAY: Duration = Duration::from_secs(1);
const EVAL_BATCH_LIMIT: u32 = 200;

pub struct Worker {
    store: Arc<Store>,
    fetcher: Arc<Fetcher>,
    notifier: Notifier,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(store: Arc<Store>) -> Self {
        let fetcher = Arc::new(Fetcher::new(store.blocked_domains.clone()));
        Self {
            store,
            fetcher,
            notifier: Notifier::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// A handle a signal handler can call `cancel()` on to request that
    /// the in-flight cycle abandon its remaining queue at the next
    /// suspension point. Teardown still runs unconditionally.
    pub fn cancellation_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Checks whether a process with `pid` is alive via `kill(pid, 0)`.
    /// Exposed for the control surface's `start`/`stop` commands, which
    /// probe liveness before deciding whether to spawn or signal.
    #[cfg(unix)]
    pub fn process_is_alive(pid: i32) -> bool {
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[cfg(not(unix))]
    pub fn process_is_alive(_pid: i32) -> bool {
        true
    }

    /// Runs one full cycle. Exits immediately, without error, if another
    /// live worker already holds the singleton lease. Always releases the
    /// lease and closes the browser on the way out, success or failure.
    pub async fn run_cycle(&self) -> Result<()> {
        let pid = std::process::id() as i32;
        let lease = self
            .store
            .crawler_status
            .acquire_lease(pid, Self::process_is_alive)?;

        if lease.is_none() {
            info!("another worker holds the crawl lease; exiting");
            return Ok(());
        }

        let result = self.run_phases().await;

        self.fetcher.close_browser().await;
        if let Err(e) = self.store.crawler_status.release_lease() {
            warn!("failed to release crawl lease: {e}");
        }

        result
    }

    async fn set_task(&self, task: &str) -> Result<()> {
        self.store.crawler_status.update(&crate::models::CrawlerStatusUpdate {
            current_task: Some(task.to_string()),
            ..Default::default()
        })?;
        Ok(())
    }

    async fn run_phases(&self) -> Result<()> {
        self.store.bootstrap()?;
        let config = self.store.config.get()?;

        self.set_task("Phase 1").await?;
        let sources = self.store.sources.get_all()?;
        let collector = FeedCollector::new(self.fetcher.clone(), self.store.articles.clone());
        let collected = collector
            .collect_all(&sources, config.feed_fetch_concurrency as usize)
            .await;

        for item in &collected {
            if self.store.articles.get_by_url(&item.url)?.is_none() {
                let mut upsert = ArticleUpsert::new(item.url.clone());
                upsert.resolved_url = item.resolved_url.clone();
                upsert.original_title = item.title_hint.clone();
                upsert.published_at = item.pub_date;
                self.store.articles.upsert(&upsert)?;
            }
        }
        info!("phase 1 collected {} candidate(s)", collected.len());

        if !collected.is_empty() && !self.cancel.is_cancelled() {
            self.set_task("Phase 2").await?;
            self.run_crawl_phase(&collected, &config).await;
            self.fetcher.close_browser().await;

            if !self.cancel.is_cancelled() {
                self.set_task("Phase 2.5").await?;
                self.run_image_backfill().await;
            }
        }

        if !self.cancel.is_cancelled() {
            self.set_task("Phase 3").await?;
            self.run_eval_phase(&config).await?;
        }

        self.set_task("Idle").await?;
        Ok(())
    }

    async fn run_crawl_phase(&self, collected: &[CollectedArticle], config: &crate::models::Config) {
        let queue = Arc::new(DomainQueue::<CollectedArticle>::new(DomainQueueConfig {
            max_concurrent_per_domain: config.max_concurrent_per_domain,
            max_total_concurrent: config.max_total_concurrent,
            domain_delay: Duration::from_millis(config.domain_delay_ms),
        }));

        for item in collected {
            let host = item
                .resolved_url
                .as_deref()
                .unwrap_or(&item.url)
                .parse::<url::Url>()
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| item.url.clone());
            queue.push(host, item.clone()).await;
        }

        let total = collected.len();
        let dispatched = Arc::new(AtomicUsize::new(0));
        let fetcher = self.fetcher.clone();
        let articles = self.store.articles.clone();
        let article_errors = self.store.article_errors.clone();
        let crawler_status = self.store.crawler_status.clone();
        let queue_for_status = queue.clone();
        let cancel = self.cancel.clone();

        queue
            .run_cancellable(move |item: CollectedArticle| {
                let fetcher = fetcher.clone();
                let articles = articles.clone();
                let article_errors = article_errors.clone();
                let crawler_status = crawler_status.clone();
                let dispatched = dispatched.clone();
                let queue_for_status = queue_for_status.clone();

                async move {
                    let k = dispatched.fetch_add(1, Ordering::SeqCst) + 1;
                    let (active, queued) = queue_for_status.snapshot_counts().await;
                    let _ = crawler_status.update(&crate::models::CrawlerStatusUpdate {
                        current_task: Some(format!(
                            "Phase 2: Crawling [{k}/{total}] ({active} active, {queued} queued)"
                        )),
                        ..Default::default()
                    });

                    let target = item.resolved_url.as_deref().unwrap_or(&item.url);
                    match crawl_one(&fetcher, &articles, target, &item).await {
                        Ok(()) => {
                            let _ = crawler_status.increment_articles_processed();
                        }
                        Err(e) => {
                            article_errors
                                .record(
                                    &ArticleError::new(item.url.clone(), Phase::Crawl, e.clone())
                                        .with_context("domain-throttled crawl phase"),
                                )
                                .ok();
                            let _ = crawler_status.update(&crate::models::CrawlerStatusUpdate {
                                last_error: Some(Some(e)),
                                ..Default::default()
                            });
                        }
                    }
                }
            }, &cancel)
            .await;
    }

    async fn run_image_backfill(&self) {
        let Ok(candidates) = self.store.articles.without_images(IMAGE_BACKFILL_LIMIT) else {
            return;
        };

        for article in candidates {
            if self.cancel.is_cancelled() {
                break;
            }
            let target = article.resolved_url.as_deref().unwrap_or(&article.url);
            match self.fetcher.fetch(target).await {
                Ok(content) => {
                    if let Ok(extracted) = extractor::extract(
                        &content.bytes,
                        content.content_type.as_deref(),
                        &content.final_url,
                    ) {
                        if let Some(image_url) = extracted.image_url {
                            let mut upsert = ArticleUpsert::new(article.url.clone());
                            upsert.image_url = Some(image_url);
                            let _ = self.store.articles.upsert(&upsert);
                        }
                    }
                }
                Err(e) => warn!("image backfill fetch failed for {}: {e}", article.url),
            }
            tokio::time::sleep(IMAGE_BACKFILL_DELAY).await;
        }
    }

    async fn run_eval_phase(&self, config: &crate::models::Config) -> Result<()> {
        let Some(api_key) = config.llm_api_key.clone() else {
            info!("no llm_api_key configured; skipping evaluation phase");
            return Ok(());
        };

        // `unprocessed` mixes still-crawlable articles (no/short content) with
        // unevaluated ones; only the latter may reach the evaluator (spec
        // invariant: no article with <200 chars of content is ever scored).
        let unprocessed: Vec<_> = self
            .store
            .articles
            .unprocessed(EVAL_BATCH_LIMIT)?
            .into_iter()
            .filter(|a| !a.is_crawlable())
            .collect();
        if unprocessed.is_empty() {
            return Ok(());
        }

        let evaluator = Arc::new(Evaluator::new(LlmClient::new(LlmConfig {
            api_key: Some(api_key),
            ..LlmConfig::default()
        })));

        let articles_repo = self.store.articles.clone();
        let article_errors = self.store.article_errors.clone();
        let crawler_status = self.store.crawler_status.clone();
        let notifier_webhook = config.webhook_url.clone();
        let score_threshold = config.score_threshold;
        let concurrency = (config.eval_concurrency as usize).max(1);
        let notifier = self.notifier.clone();
        let cancel = self.cancel.clone();

        stream::iter(unprocessed.into_iter())
            .map(|article| {
                let evaluator = evaluator.clone();
                let articles_repo = articles_repo.clone();
                let article_errors = article_errors.clone();
                let crawler_status = crawler_status.clone();
                let webhook_url = notifier_webhook.clone();
                let notifier = notifier.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match evaluator.evaluate(&article).await {
                        Ok(mut upsert) => {
                            upsert.url = article.url.clone();
                            match articles_repo.upsert(&upsert) {
                                Ok(updated) => {
                                    let _ = article_errors.clear(&article.url);
                                    let _ = crawler_status.increment_articles_processed();
                                    if updated.scores.average.unwrap_or(0.0) >= score_threshold {
                                        notifier.notify(webhook_url.as_deref(), &updated).await;
                                    }
                                }
                                Err(e) => warn!("failed to persist evaluation for {}: {e}", article.url),
                            }
                        }
                        Err(e) => {
                            let _ = article_errors.record(
                                &ArticleError::new(article.url.clone(), Phase::Eval, e.to_string()),
                            );
                            let _ = crawler_status.update(&crate::models::CrawlerStatusUpdate {
                                last_error: Some(Some(e.to_string())),
                                ..Default::default()
                            });
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<()>>()
            .await;

        Ok(())
    }

    /// Runs the full crawl+evaluate pipeline for one URL synchronously,
    /// bypassing the phased cycle but using the same Fetcher, Extractor,
    /// Evaluator, and Notifier. Backs both the `ingest` and `retry`
    /// control-surface operations (spec.md §6): `retry` differs only in
    /// how the caller resolved `url` (from an article id or an error id).
    pub async fn ingest(&self, url: &str) -> Result<()> {
        let config = self.store.config.get()?;

        let cached_resolved = self
            .store
            .articles
            .get_by_url(url)?
            .and_then(|a| a.resolved_url);

        let resolved = match cached_resolved {
            Some(r) => r,
            None => match self.fetcher.resolve_aggregator(url).await {
                Ok(r) => r,
                Err(e) => {
                    self.store.article_errors.record(
                        &ArticleError::new(url.to_string(), Phase::Crawl, e.to_string())
                            .with_context("ingest"),
                    )?;
                    return Ok(());
                }
            },
        };

        let item = CollectedArticle {
            url: url.to_string(),
            resolved_url: if resolved == url { None } else { Some(resolved.clone()) },
            pub_date: None,
            feed_source: "ingest".to_string(),
            title_hint: None,
        };

        if let Err(e) = crawl_one(&self.fetcher, &self.store.articles, &resolved, &item).await {
            self.store.article_errors.record(
                &ArticleError::new(url.to_string(), Phase::Crawl, e).with_context("ingest"),
            )?;
            return Ok(());
        }

        let Some(article) = self.store.articles.get_by_url(url)? else {
            return Ok(());
        };

        if article.is_crawlable() {
            return Ok(());
        }

        let Some(api_key) = config.llm_api_key.clone() else {
            self.store.article_errors.clear(url)?;
            return Ok(());
        };

        let evaluator = Evaluator::new(LlmClient::new(LlmConfig {
            api_key: Some(api_key),
            ..LlmConfig::default()
        }));

        match evaluator.evaluate(&article).await {
            Ok(mut upsert) => {
                upsert.url = article.url.clone();
                let updated = self.store.articles.upsert(&upsert)?;
                self.store.article_errors.clear(url)?;
                if updated.scores.average.unwrap_or(0.0) >= config.score_threshold {
                    self.notifier
                        .notify(config.webhook_url.as_deref(), &updated)
                        .await;
                }
            }
            Err(e) => {
                self.store.article_errors.record(&ArticleError::new(
                    url.to_string(),
                    Phase::Eval,
                    e.to_string(),
                ))?;
            }
        }

        Ok(())
    }
}

async fn crawl_one(
    fetcher: &Fetcher,
    articles: &crate::repository::ArticleRepository,
    url: &str,
    item: &CollectedArticle,
) -> std::result::Result<(), String> {
    let content = fetcher.fetch(url).await.map_err(|e| e.to_string())?;
    let extracted = extractor::extract(&content.bytes, content.content_type.as_deref(), &content.final_url)
        .map_err(|e| e.to_string())?;

    let mut upsert = ArticleUpsert::new(item.url.clone());
    upsert.original_title = Some(extracted.title);
    upsert.content = Some(extracted.text);
    upsert.image_url = extracted.image_url;
    if content.final_url != item.url {
        upsert.resolved_url = Some(content.final_url);
    }
    articles.upsert(&upsert).map_err(|e| e.to_string())?;
    Ok(())
}
