//! The worker control surface (spec.md §6, §4.9): the HTTP/JSON read API is
//! an explicit external collaborator and out of scope here, so this thin
//! CLI is the adapter that exercises the worker end-to-end.

mod commands;

use clap::{Parser, Subcommand};

use rss_reader::config::Settings;

pub use commands::is_verbose;

#[derive(Parser, Debug)]
#[command(name = "rss-reader", about = "Background ingestion pipeline for a scored, summarized syndication reader")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Verbose logging (`rss_reader=info` instead of `=warn`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one ingestion cycle in the foreground.
    Run,
    /// Spawn a detached worker running one cycle, recording its PID.
    Start,
    /// Signal the recorded worker (process group, then PID) and clear the lease.
    Stop,
    /// Print the crawler status plus the latest 50 article errors, as JSON.
    Status,
    /// Run the full crawl+evaluate pipeline for one URL, synchronously.
    Ingest {
        /// The article URL to crawl and evaluate.
        url: String,
    },
    /// Re-run the full pipeline for an article (by id) or a failing URL (by error id).
    Retry {
        /// An article id, an article-error id, or a bare URL.
        id_or_url: String,
    },
}

/// Global CLI entry point: dispatch to the requested subcommand.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::dispatch(cli).await
}
