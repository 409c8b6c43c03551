//! LLM client for article scoring and summarization.
//!
//! Talks to any OpenAI-compatible chat-completions endpoint (the hosted
//! services and self-hosted gateways share this shape); the only vendor-
//! specific bit is the bearer token.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("api error: {0}")]
    Api(String),
    /// The detail (parse error or which field failed shape validation) is
    /// kept on the variant for logging, but the surfaced message is the
    /// fixed `invalid_llm_response` human text from the error kind table.
    #[error("AI returned invalid analysis data")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for LlmConfig {
    /// `LLM_ENDPOINT`, when set, overrides the default chat-completions
    /// endpoint — the same explicit-override-over-provider-default idiom
    /// the teacher's `llm/client/config.rs` uses for `ANNOTATE_ENDPOINT`.
    /// Lets a self-hosted gateway (or a test harness) stand in for the
    /// hosted default without touching the database-resident `Config` row.
    fn default() -> Self {
        let endpoint = std::env::var("LLM_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
        Self {
            endpoint,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// The parsed, shape-validated scoring payload for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub translated_title: String,
    pub summary: String,
    pub short_summary: String,
    pub novelty: i32,
    pub importance: i32,
    pub reliability: i32,
    pub context_value: i32,
    pub thought_provoking: i32,
}

#[derive(Debug, Deserialize)]
struct RawScores {
    novelty: serde_json::Value,
    importance: serde_json::Value,
    reliability: serde_json::Value,
    #[serde(rename = "contextValue")]
    context_value: serde_json::Value,
    #[serde(rename = "thoughtProvoking")]
    thought_provoking: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(rename = "translatedTitle")]
    translated_title: String,
    summary: String,
    #[serde(rename = "shortSummary")]
    short_summary: String,
    scores: RawScores,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .expect("failed to build LLM HTTP client");
        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Sends the scoring prompt and validates the shape of the response.
    pub async fn evaluate(&self, title: &str, content: &str) -> Result<EvaluationResult, LlmError> {
        let prompt = build_prompt(title, &truncate(content));

        let body = json!({
            "model": self.config.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        debug!("evaluating article: {}", title);
        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {body}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        parse_evaluation(&content)
    }
}

/// Keeps the first `MAX_CONTENT_CHARS` *characters* (not bytes) of
/// `content`, so multi-byte-UTF-8 articles get the same character budget
/// as ASCII ones.
fn truncate(content: &str) -> String {
    content.chars().take(MAX_CONTENT_CHARS).collect()
}

fn build_prompt(title: &str, content: &str) -> String {
    format!(
        r#"You are scoring a news article for a curated feed. Read the title and content below, then respond with ONLY a JSON object (no markdown fences, no prose) with this exact shape:

{{
  "translatedTitle": "<title, translated to English if needed>",
  "summary": "<a few sentence summary>",
  "shortSummary": "<a one sentence summary>",
  "scores": {{
    "novelty": <integer 1-5>,
    "importance": <integer 1-5>,
    "reliability": <integer 1-5>,
    "contextValue": <integer 1-5>,
    "thoughtProvoking": <integer 1-5>
  }}
}}

Title: {title}

Content:
{content}"#
    )
}

fn parse_evaluation(raw: &str) -> Result<EvaluationResult, LlmError> {
    let parsed: RawEvaluation =
        serde_json::from_str(raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let novelty = parsed
        .scores
        .novelty
        .as_i64()
        .ok_or_else(|| LlmError::InvalidResponse("scores.novelty is not numeric".to_string()))?
        as i32;
    let importance = as_score(&parsed.scores.importance, "importance")?;
    let reliability = as_score(&parsed.scores.reliability, "reliability")?;
    let context_value = as_score(&parsed.scores.context_value, "contextValue")?;
    let thought_provoking = as_score(&parsed.scores.thought_provoking, "thoughtProvoking")?;

    Ok(EvaluationResult {
        translated_title: parsed.translated_title,
        summary: parsed.summary,
        short_summary: parsed.short_summary,
        novelty,
        importance,
        reliability,
        context_value,
        thought_provoking,
    })
}

fn as_score(value: &serde_json::Value, field: &str) -> Result<i32, LlmError> {
    value
        .as_i64()
        .map(|v| v as i32)
        .ok_or_else(|| LlmError::InvalidResponse(format!("scores.{field} is not numeric")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_evaluation() {
        let raw = r#"{
            "translatedTitle": "Rust 2.0 Announced",
            "summary": "A long form summary of the announcement.",
            "shortSummary": "Rust 2.0 is here.",
            "scores": { "novelty": 5, "importance": 4, "reliability": 4, "contextValue": 3, "thoughtProvoking": 5 }
        }"#;
        let parsed = parse_evaluation(raw).unwrap();
        assert_eq!(parsed.translated_title, "Rust 2.0 Announced");
        assert_eq!(parsed.novelty, 5);
        assert_eq!(parsed.thought_provoking, 5);
    }

    #[test]
    fn rejects_non_numeric_novelty() {
        let raw = r#"{
            "translatedTitle": "t", "summary": "s", "shortSummary": "ss",
            "scores": { "novelty": "high", "importance": 1, "reliability": 1, "contextValue": 1, "thoughtProvoking": 1 }
        }"#;
        assert!(matches!(parse_evaluation(raw), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse_evaluation("not json"), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let content = "é".repeat(MAX_CONTENT_CHARS);
        let truncated = truncate(&content);
        assert!(truncated.len() <= content.len());
        assert!(String::from_utf8(truncated.as_bytes().to_vec()).is_ok());
    }

    #[test]
    fn truncate_counts_multi_byte_characters_not_bytes() {
        // Each "é" is 2 bytes in UTF-8, so a byte-length truncation would
        // cut this off at half as many characters as the spec's budget.
        let content = "é".repeat(MAX_CONTENT_CHARS + 500);
        let truncated = truncate(&content);
        assert_eq!(truncated.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn truncate_is_a_noop_under_the_budget() {
        let content = "short content";
        assert_eq!(truncate(content), content);
    }
}
