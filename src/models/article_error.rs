//! A per-URL failure record. One record per failing URL; new failures
//! replace older ones for the same URL. Cleared on first successful full
//! processing of that URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The stage of the worker that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Crawl,
    Eval,
    Notify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "CRAWL",
            Self::Eval => "EVAL",
            Self::Notify => "NOTIFY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CRAWL" => Some(Self::Crawl),
            "EVAL" => Some(Self::Eval),
            "NOTIFY" => Some(Self::Notify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleError {
    pub id: String,
    pub url: String,
    pub title_hint: Option<String>,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub phase: Phase,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ArticleError {
    pub fn new(url: impl Into<String>, phase: Phase, error_message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            title_hint: None,
            error_message: error_message.into(),
            stack_trace: None,
            phase,
            context: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_title_hint(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }
}
