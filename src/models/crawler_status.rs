//! The singleton crawler-status row.
//!
//! Invariant: at most one row exists; `worker_pid` is non-null iff
//! `is_crawling = true`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerStatus {
    pub is_crawling: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub current_task: String,
    pub articles_processed: i64,
    pub last_error: Option<String>,
    pub worker_pid: Option<i32>,
}

impl Default for CrawlerStatus {
    fn default() -> Self {
        Self {
            is_crawling: false,
            last_run: None,
            current_task: "Idle".to_string(),
            articles_processed: 0,
            last_error: None,
            worker_pid: None,
        }
    }
}

/// A partial update to `CrawlerStatus`: only provided fields change.
#[derive(Debug, Clone, Default)]
pub struct CrawlerStatusUpdate {
    pub is_crawling: Option<bool>,
    pub last_run: Option<DateTime<Utc>>,
    pub current_task: Option<String>,
    pub articles_processed: Option<i64>,
    pub last_error: Option<Option<String>>,
    pub worker_pid: Option<Option<i32>>,
}
