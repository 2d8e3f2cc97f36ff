//! boardwatch CLI: run the scrape scheduler, or reset board documents.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use boardwatch::scrape::{ScrapeEngine, ScrapeOptions};
use boardwatch::store::{reset_boards, BoardStore};
use boardwatch::worker::{self, WorkerConfig};
use boardwatch::{HttpClient, Renderer};

#[derive(Parser)]
#[command(name = "boardwatch", version, about = "Job board lifecycle tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scrape scheduler.
    Run {
        /// Directory of board documents (*.json).
        #[arg(long, env = "BOARDWATCH_PAGES_DIR", default_value = "data/pages")]
        pages_dir: PathBuf,
        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,
        /// Scrape but do not write any documents.
        #[arg(long)]
        dry_run: bool,
        /// Maximum concurrent board scrapes.
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
        /// Base scrape cadence, in seconds.
        #[arg(long, default_value_t = 3600)]
        base_frequency_secs: u64,
        /// Cadence jitter (± seconds).
        #[arg(long, default_value_t = 1800)]
        jitter_secs: u64,
        /// Minimum delay before a rescheduled scrape, in seconds.
        #[arg(long, default_value_t = 300)]
        min_delay_secs: u64,
        /// Backoff after a failed scrape, in seconds.
        #[arg(long, default_value_t = 1200)]
        error_backoff_secs: u64,
        /// Backoff jitter (± seconds).
        #[arg(long, default_value_t = 300)]
        error_jitter_secs: u64,
        /// Per-request scrape timeout, in seconds.
        #[arg(long, default_value_t = 20)]
        scrape_timeout_secs: u64,
        /// Listing pages to follow per board.
        #[arg(long, default_value_t = 5)]
        max_pages: usize,
    },
    /// Clear content and scrape markers on every board document.
    Reset {
        #[arg(long, env = "BOARDWATCH_PAGES_DIR", default_value = "data/pages")]
        pages_dir: PathBuf,
        /// Write .bak siblings before modifying.
        #[arg(long)]
        backup: bool,
    },
}

fn init_tracing() {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // Adapter debug toggles: observational only.
    if std::env::var("BOARDWATCH_META_DEBUG").is_ok_and(|v| v == "1" || v == "true") {
        filter = filter.add_directive(
            "boardwatch::scrape::ats::meta=debug"
                .parse()
                .expect("static directive"),
        );
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            pages_dir,
            once,
            dry_run,
            concurrency,
            base_frequency_secs,
            jitter_secs,
            min_delay_secs,
            error_backoff_secs,
            error_jitter_secs,
            scrape_timeout_secs,
            max_pages,
        } => {
            let cfg = WorkerConfig {
                pages_dir: pages_dir.clone(),
                base_frequency: Duration::from_secs(base_frequency_secs),
                jitter: Duration::from_secs(jitter_secs),
                min_delay: Duration::from_secs(min_delay_secs),
                error_backoff: Duration::from_secs(error_backoff_secs),
                error_jitter: Duration::from_secs(error_jitter_secs),
                concurrency,
                dry_run,
                once,
                scrape: ScrapeOptions {
                    timeout: Duration::from_secs(scrape_timeout_secs),
                    max_pages,
                    ..ScrapeOptions::default()
                },
            };

            let http = Arc::new(HttpClient::new().context("building HTTP client")?);
            let renderer = Arc::new(Renderer::new());
            let engine = Arc::new(ScrapeEngine::new(http, Arc::clone(&renderer)));
            let store = Arc::new(BoardStore::new(pages_dir));

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });

            let result = worker::run(engine, store, cfg, shutdown_rx).await;
            renderer.shutdown().await;
            result
        }
        Command::Reset { pages_dir, backup } => {
            let store = BoardStore::new(&pages_dir);
            let count = reset_boards(&store, backup)
                .await
                .with_context(|| format!("resetting boards in {}", pages_dir.display()))?;
            info!(count, "boards reset");
            Ok(())
        }
    }
}
