//! Process-level configuration: environment and CLI, resolved once at
//! startup. Distinct from `crate::models::Config` (the database-backed
//! runtime row); this only ever selects *where* that row lives.

use std::path::PathBuf;

use clap::Args;

/// Settings resolved from the environment and CLI before the store opens.
/// Everything the spec calls "Config" (§3: `llm_api_key`, `webhook_url`,
/// `score_threshold`, concurrency knobs) lives in the database `config`
/// row instead, read/written through the Store.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Path to the SQLite database file.
    #[arg(long, env = "DB_PATH", default_value = "./rss_reader.db")]
    pub db_path: PathBuf,
}

impl Settings {
    /// Reads `DB_PATH`, defaulting to `./rss_reader.db`, without going
    /// through `clap` (used by tests and other non-CLI entry points).
    pub fn from_env() -> Self {
        let db_path = std::env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./rss_reader.db"));
        Self { db_path }
    }
}
