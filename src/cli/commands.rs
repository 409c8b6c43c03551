//! Subcommand implementations for the worker control surface.

use std::sync::Arc;

use console::style;

use rss_reader::repository::Store;
use rss_reader::worker::Worker;

use super::{Cli, Command};

/// Scans raw argv for a verbosity flag ahead of `clap::Parser::parse`, so
/// logging can be initialized before argument parsing (and before a
/// `--help`/`--version` early exit would otherwise skip it).
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&cli.settings.db_path)?);

    match cli.command {
        Command::Run => cmd_run(store).await,
        Command::Start => cmd_start(&cli.settings.db_path, store).await,
        Command::Stop => cmd_stop(store).await,
        Command::Status => cmd_status(store).await,
        Command::Ingest { url } => cmd_ingest(store, &url).await,
        Command::Retry { id_or_url } => cmd_retry(store, &id_or_url).await,
    }
}

/// `run`: one cycle in the foreground. SIGINT/SIGTERM request cancellation
/// of the in-flight cycle; teardown still runs to completion either way.
async fn cmd_run(store: Arc<Store>) -> anyhow::Result<()> {
    let worker = Worker::new(store);

    #[cfg(unix)]
    {
        let cancel = worker.cancellation_handle();
        tokio::spawn(async move {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            tracing::info!("stop requested; cancelling the in-flight cycle");
            cancel.cancel();
        });
    }

    worker.run_cycle().await?;
    println!("{} cycle complete", style("✓").green());
    Ok(())
}

/// `start`: spawn a detached child running `run`, recording its PID. A
/// no-op if a live worker already holds the lease.
async fn cmd_start(db_path: &std::path::Path, store: Arc<Store>) -> anyhow::Result<()> {
    let status = store.crawler_status.get()?;
    if status.is_crawling {
        if let Some(pid) = status.worker_pid {
            if Worker::process_is_alive(pid) {
                println!(
                    "{} a worker is already running (pid {pid})",
                    style("!").yellow()
                );
                return Ok(());
            }
        }
    }

    let exe = std::env::current_exe()?;
    let mut command = std::process::Command::new(exe);
    command.arg("--db-path").arg(db_path).arg("run");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            command.pre_exec(|| {
                // New session + process group, so `stop` can signal the
                // whole group rather than only the direct child.
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    println!("{} started worker (pid {})", style("✓").green(), child.id());
    Ok(())
}

/// `stop`: signal the recorded process group, then the PID directly, and
/// clear the lease. The worker's own teardown still does the authoritative
/// lease release; this is a best-effort nudge plus a forced recovery path
/// if the worker is unresponsive.
async fn cmd_stop(store: Arc<Store>) -> anyhow::Result<()> {
    let status = store.crawler_status.get()?;
    let Some(pid) = status.worker_pid else {
        println!("{} no worker is running", style("!").yellow());
        return Ok(());
    };

    #[cfg(unix)]
    {
        unsafe {
            libc::kill(-pid, libc::SIGTERM);
            libc::kill(pid, libc::SIGTERM);
        }
    }

    store.crawler_status.release_lease()?;
    println!("{} stop requested for pid {pid}", style("✓").green());
    Ok(())
}

/// `status`: the `CrawlerStatus` singleton plus the latest 50 `ArticleError`s, as JSON.
async fn cmd_status(store: Arc<Store>) -> anyhow::Result<()> {
    let status = store.crawler_status.get()?;
    let errors = store.article_errors.recent(50)?;

    let payload = serde_json::json!({
        "status": status,
        "errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

/// `ingest <url>`: run the full crawl+evaluate pipeline for one URL synchronously.
async fn cmd_ingest(store: Arc<Store>, url: &str) -> anyhow::Result<()> {
    let worker = Worker::new(store);
    worker.ingest(url).await?;
    println!("{} ingested {url}", style("✓").green());
    Ok(())
}

/// `retry <id-or-url>`: resolve `id_or_url` to a URL (an article id, an
/// article-error id, or a bare URL) and re-run the full pipeline for it.
async fn cmd_retry(store: Arc<Store>, id_or_url: &str) -> anyhow::Result<()> {
    let url = resolve_retry_target(&store, id_or_url)?;
    let worker = Worker::new(store);
    worker.ingest(&url).await?;
    println!("{} retried {url}", style("✓").green());
    Ok(())
}

fn resolve_retry_target(store: &Store, id_or_url: &str) -> anyhow::Result<String> {
    if id_or_url.starts_with("http://") || id_or_url.starts_with("https://") {
        return Ok(id_or_url.to_string());
    }
    if let Some(article) = store.articles.get(id_or_url)? {
        return Ok(article.url);
    }
    if let Some(error) = store
        .article_errors
        .recent(u32::MAX)?
        .into_iter()
        .find(|e| e.id == id_or_url)
    {
        return Ok(error.url);
    }
    anyhow::bail!("no article or error found for id {id_or_url}")
}
