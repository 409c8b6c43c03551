//! A host recorded as permanently hostile for the remainder of the process
//! lifetime; filtered out of read and work queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedDomain {
    pub id: String,
    pub domain: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl BlockedDomain {
    pub fn new(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            domain: domain.into(),
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}
