//! End-to-end cycle coverage: a full mocked pipeline run (collect, crawl,
//! evaluate, notify) and LLM failure isolation across a batch, driven
//! entirely through `Worker::run_cycle` against mockito-stubbed feed,
//! article, LLM, and webhook endpoints.

use std::sync::{Arc, Mutex};

use rss_reader::models::{ArticleUpsert, Phase, Source};
use rss_reader::repository::Store;
use rss_reader::worker::Worker;

/// `LLM_ENDPOINT` is process-global; serialize tests that set it so two
/// `#[tokio::test]` tasks can't race each other's mock server URL.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn store(dir: &tempfile::TempDir) -> Arc<Store> {
    Arc::new(Store::open(&dir.path().join("db.sqlite")).unwrap())
}

#[tokio::test]
async fn full_cycle_scores_and_notifies_once() {
    let _guard = ENV_LOCK.lock().unwrap();
    let mut server = mockito::Server::new_async().await;

    let article_path = "/article";
    let article_url = format!("{}{article_path}", server.url());

    let feed_xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0"><channel><title>Feed</title><link>http://example.com</link><description>d</description>
        <item><title>Original Title</title><link>{article_url}</link></item>
        </channel></rss>"#
    );
    let _feed_mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_xml)
        .create_async()
        .await;

    let article_html = format!(
        r#"<html><head><title>T</title><meta property="og:image" content="I"></head>
        <body><article><p>{}</p></article></body></html>"#,
        "word ".repeat(60)
    );
    let _article_mock = server
        .mock("GET", article_path)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(article_html)
        .create_async()
        .await;

    let llm_response = serde_json::json!({
        "choices": [{
            "message": {
                "content": serde_json::json!({
                    "translatedTitle": "T-ja",
                    "summary": "A longer summary of the article content.",
                    "shortSummary": "S",
                    "scores": {
                        "novelty": 5,
                        "importance": 4,
                        "reliability": 4,
                        "contextValue": 3,
                        "thoughtProvoking": 5
                    }
                }).to_string()
            }
        }]
    });
    let _llm_mock = server
        .mock("POST", "/llm")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(llm_response.to_string())
        .create_async()
        .await;

    let _webhook_mock = server
        .mock("POST", "/webhook")
        .with_status(200)
        .match_body(mockito::Matcher::Regex("Avg: 4.20".to_string()))
        .expect(1)
        .create_async()
        .await;

    std::env::set_var("LLM_ENDPOINT", format!("{}/llm", server.url()));

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store
        .sources
        .save(&Source::new(format!("{}/feed.xml", server.url()), "Test Feed"))
        .unwrap();

    let mut config = store.config.get().unwrap();
    config.score_threshold = 0.0;
    config.llm_api_key = Some("test-key".to_string());
    config.webhook_url = Some(format!("{}/webhook", server.url()));
    store.config.save(&config).unwrap();

    let worker = Worker::new(store.clone());
    worker.run_cycle().await.unwrap();

    std::env::remove_var("LLM_ENDPOINT");

    let article = store.articles.get_by_url(&article_url).unwrap().unwrap();
    assert_eq!(article.original_title.as_deref(), Some("T"));
    assert_eq!(article.image_url.as_deref(), Some("I"));
    assert_eq!(article.translated_title.as_deref(), Some("T-ja"));
    assert_eq!(article.scores.average, Some(4.2));

    _webhook_mock.assert_async().await;

    let status = store.crawler_status.get().unwrap();
    assert!(!status.is_crawling);
    assert_eq!(status.current_task, "Idle");
    // One article crawled in phase 2, the same article evaluated in phase 3.
    assert_eq!(status.articles_processed, 2);
}

#[tokio::test]
async fn eval_phase_isolates_a_single_llm_failure_across_a_batch() {
    let _guard = ENV_LOCK.lock().unwrap();
    let mut server = mockito::Server::new_async().await;

    // An empty feed so phase 1 collects nothing and phase 3 runs directly
    // against the pre-seeded articles below, with no network crawling.
    let _feed_mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0"><channel><title>Empty</title><link>http://example.com</link><description>d</description></channel></rss>"#,
        )
        .create_async()
        .await;

    let mut _llm_mocks = Vec::new();
    for i in 0..5 {
        let body = if i == 3 {
            // Malformed shape: `novelty` is a string, not numeric.
            serde_json::json!({
                "choices": [{ "message": { "content": r#"{"translatedTitle":"x","summary":"s","shortSummary":"ss","scores":{"novelty":"bad","importance":1,"reliability":1,"contextValue":1,"thoughtProvoking":1}}"# } }]
            })
        } else {
            serde_json::json!({
                "choices": [{
                    "message": {
                        "content": serde_json::json!({
                            "translatedTitle": format!("Article {i} (ja)"),
                            "summary": "A summary.",
                            "shortSummary": "S",
                            "scores": { "novelty": 3, "importance": 3, "reliability": 3, "contextValue": 3, "thoughtProvoking": 3 }
                        }).to_string()
                    }
                }]
            })
        };
        let mock = server
            .mock("POST", "/llm")
            .match_body(mockito::Matcher::Regex(format!("Article body {i}")))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
        _llm_mocks.push(mock);
    }

    std::env::set_var("LLM_ENDPOINT", format!("{}/llm", server.url()));

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store
        .sources
        .save(&Source::new(format!("{}/feed.xml", server.url()), "Empty Feed"))
        .unwrap();

    for i in 0..5 {
        let mut upsert = ArticleUpsert::new(format!("https://example.com/article-{i}"));
        upsert.original_title = Some(format!("Article {i}"));
        upsert.content = Some(format!("Article body {i} {}", "word ".repeat(60)));
        store.articles.upsert(&upsert).unwrap();
    }

    let mut config = store.config.get().unwrap();
    config.score_threshold = 0.0;
    config.llm_api_key = Some("test-key".to_string());
    store.config.save(&config).unwrap();

    let worker = Worker::new(store.clone());
    worker.run_cycle().await.unwrap();

    std::env::remove_var("LLM_ENDPOINT");

    for i in 0..5 {
        let url = format!("https://example.com/article-{i}");
        let article = store.articles.get_by_url(&url).unwrap().unwrap();
        if i == 3 {
            assert_eq!(article.scores.average, None);
            let error = store.article_errors.get_by_url(&url).unwrap().unwrap();
            assert_eq!(error.phase, Phase::Eval);
            assert_eq!(error.error_message, "AI returned invalid analysis data");
        } else {
            assert_eq!(article.scores.average, Some(3.0));
            assert!(store.article_errors.get_by_url(&url).unwrap().is_none());
        }
    }

    let status = store.crawler_status.get().unwrap();
    assert!(!status.is_crawling);
    // 4 successful evaluations out of 5 attempted; the failure isn't counted
    // but does surface as the crawler status's last_error.
    assert_eq!(status.articles_processed, 4);
    assert_eq!(
        status.last_error.as_deref(),
        Some("AI returned invalid analysis data")
    );
}
