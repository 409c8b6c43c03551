//! An ingested article, identified by its feed-given URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five integer scores produced by the evaluator, plus their average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub novelty: Option<i32>,
    pub importance: Option<i32>,
    pub reliability: Option<i32>,
    pub context_value: Option<i32>,
    pub thought_provoking: Option<i32>,
    pub average: Option<f64>,
}

impl Scores {
    pub fn from_values(
        novelty: i32,
        importance: i32,
        reliability: i32,
        context_value: i32,
        thought_provoking: i32,
    ) -> Self {
        let average = (novelty + importance + reliability + context_value + thought_provoking)
            as f64
            / 5.0;
        Self {
            novelty: Some(novelty),
            importance: Some(importance),
            reliability: Some(reliability),
            context_value: Some(context_value),
            thought_provoking: Some(thought_provoking),
            average: Some(average),
        }
    }
}

/// A unit of content identified by its feed-given URL.
///
/// Fields populate in two stages: the crawl stage fills `resolved_url`,
/// `original_title`, `content`, `image_url`, `published_at`; the evaluation
/// stage fills the translated/summary/score fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub resolved_url: Option<String>,
    pub original_title: Option<String>,
    pub translated_title: Option<String>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub scores: Scores,
}

impl Article {
    /// A new, crawl-stage article identified only by its feed link.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    /// An article is evaluated iff `average_score IS NOT NULL`.
    pub fn is_evaluated(&self) -> bool {
        self.scores.average.is_some()
    }

    /// An article is crawlable iff `content IS NULL OR length(content) < 200`.
    pub fn is_crawlable(&self) -> bool {
        match &self.content {
            None => true,
            Some(c) => c.chars().count() < 200,
        }
    }

    /// The host this article's current best URL resolves to, used as the
    /// `DomainQueue` key: `resolvedUrl || url`.
    pub fn host(&self) -> Option<String> {
        let target = self.resolved_url.as_deref().unwrap_or(&self.url);
        url::Url::parse(target)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Partial update applied via upsert-on-`url`: supplied fields overwrite,
/// omitted fields preserve the prior row (including `resolved_url`).
#[derive(Debug, Clone, Default)]
pub struct ArticleUpsert {
    pub url: String,
    pub resolved_url: Option<String>,
    pub original_title: Option<String>,
    pub translated_title: Option<String>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scores: Option<Scores>,
}

impl ArticleUpsert {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawlable_boundary_is_strict() {
        let mut a = Article::new("https://example.com/a");
        a.content = Some("x".repeat(199));
        assert!(a.is_crawlable());
        a.content = Some("x".repeat(200));
        assert!(!a.is_crawlable());
    }

    #[test]
    fn scores_average_is_mean_of_five() {
        let s = Scores::from_values(5, 4, 4, 3, 5);
        assert_eq!(s.average, Some(4.2));
    }

    #[test]
    fn host_prefers_resolved_url() {
        let mut a = Article::new("https://news.google.com/rss/articles/abc");
        a.resolved_url = Some("https://site.example/a".to_string());
        assert_eq!(a.host().as_deref(), Some("site.example"));
    }
}
