//! Notifier: posts a scored article to a configured webhook.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::models::Article;

const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct Notifier {
    client: Client,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .expect("failed to build notifier HTTP client");
        Self { client }
    }

    /// Silent no-op if `webhook_url` is unset. Non-2xx responses are logged
    /// and swallowed; the surrounding evaluation must not fail on them.
    pub async fn notify(&self, webhook_url: Option<&str>, article: &Article) {
        let Some(webhook_url) = webhook_url else {
            return;
        };

        let payload = build_payload(article);
        match self.client.post(webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    "webhook post for {} returned HTTP {}",
                    article.url,
                    response.status()
                );
            }
            Err(e) => {
                warn!("webhook post for {} failed: {e}", article.url);
            }
        }
    }
}

fn build_payload(article: &Article) -> serde_json::Value {
    let scores = &article.scores;
    let scores_field = format!(
        "Avg: {:.2} (N:{} I:{} R:{} C:{} T:{})",
        scores.average.unwrap_or(0.0),
        scores.novelty.unwrap_or(0),
        scores.importance.unwrap_or(0),
        scores.reliability.unwrap_or(0),
        scores.context_value.unwrap_or(0),
        scores.thought_provoking.unwrap_or(0),
    );

    let link = article.resolved_url.as_deref().unwrap_or(&article.url);
    let title = article
        .translated_title
        .as_deref()
        .or(article.original_title.as_deref())
        .unwrap_or(&article.url);

    let mut embed = json!({
        "title": title,
        "url": link,
        "description": article.short_summary.clone().unwrap_or_default(),
        "fields": [
            { "name": "Scores", "value": scores_field, "inline": true },
            { "name": "Source", "value": article.url, "inline": true },
        ],
        "color": 3_447_003,
        "timestamp": article.published_at.map(|t| t.to_rfc3339()),
    });

    if let Some(image_url) = &article.image_url {
        embed["image"] = json!({ "url": image_url });
    }

    json!({ "embeds": [embed] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_formatted_scores_and_title() {
        let mut article = Article::new("https://example.com/a");
        article.translated_title = Some("Headline".to_string());
        article.short_summary = Some("One line.".to_string());
        article.scores = crate::models::Scores::from_values(5, 4, 4, 3, 5);
        let payload = build_payload(&article);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Headline");
        assert_eq!(embed["fields"][0]["value"], "Avg: 4.20 (N:5 I:4 R:4 C:3 T:5)");
    }

    #[test]
    fn payload_prefers_resolved_url_for_link() {
        let mut article = Article::new("https://news.google.com/rss/articles/a");
        article.resolved_url = Some("https://site.example/a".to_string());
        let payload = build_payload(&article);
        assert_eq!(payload["embeds"][0]["url"], "https://site.example/a");
    }
}
