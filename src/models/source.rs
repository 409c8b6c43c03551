//! A syndication feed registered by the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed source: `{id, url, name}`. Unique by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
