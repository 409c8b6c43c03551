//! The singleton runtime configuration row.
//!
//! Distinct from `crate::config::Settings` (process-level, env/CLI driven,
//! selects the database file). Everything here lives in the database and is
//! mutable at runtime through the (out-of-scope) configuration API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub score_threshold: f64,
    pub feed_fetch_concurrency: u32,
    pub max_concurrent_per_domain: u32,
    pub max_total_concurrent: u32,
    pub domain_delay_ms: u64,
    pub eval_concurrency: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            webhook_url: None,
            score_threshold: 3.5,
            feed_fetch_concurrency: 5,
            max_concurrent_per_domain: 2,
            max_total_concurrent: 10,
            domain_delay_ms: 1000,
            eval_concurrency: 5,
        }
    }
}
