//! rss-reader - background ingestion pipeline for a scored, summarized
//! syndication reader.
//!
//! The read API, CRUD endpoints, dialogue-script prompt, and browser UI are
//! external collaborators that live outside this crate; this binary is the
//! worker and the thin control-surface CLI (spec.md §6, §4.9) that drives it.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let default_filter = if cli::is_verbose() {
        "rss_reader=info"
    } else {
        "rss_reader=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
