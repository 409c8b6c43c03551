//! Evaluator: scores and summarizes one article via the configured LLM.

use crate::models::{Article, ArticleUpsert, Scores};

use super::client::{LlmClient, LlmError};

pub struct Evaluator {
    client: LlmClient,
}

impl Evaluator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Evaluates one article, producing the upsert payload to persist.
    /// Fails with `LlmError::InvalidResponse` on any shape-validation
    /// failure, matching the component's `invalid_llm_response` contract.
    pub async fn evaluate(&self, article: &Article) -> Result<ArticleUpsert, LlmError> {
        let title = article.original_title.as_deref().unwrap_or(&article.url);
        let content = article.content.as_deref().unwrap_or_default();

        let result = self.client.evaluate(title, content).await?;

        let scores = Scores::from_values(
            result.novelty,
            result.importance,
            result.reliability,
            result.context_value,
            result.thought_provoking,
        );

        let mut upsert = ArticleUpsert::new(article.url.clone());
        upsert.translated_title = Some(result.translated_title);
        upsert.summary = Some(result.summary);
        upsert.short_summary = Some(result.short_summary);
        upsert.scores = Some(scores);
        Ok(upsert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::LlmConfig;

    #[test]
    fn evaluator_constructs_with_a_client() {
        let _evaluator = Evaluator::new(LlmClient::new(LlmConfig::default()));
    }
}
