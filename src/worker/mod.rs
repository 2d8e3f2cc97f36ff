//! Scheduler: selects due boards each tick, scrapes them under a bounded
//! concurrency budget, merges results with the health gate, and persists.
//!
//! The worker is the sole writer of board documents. Exclusion per board is
//! implicit: the due set is snapshotted once per tick and a board in flight
//! only regains a `next_scrape_at` when its task finishes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::model::JobBoard;
use crate::scrape::{ScrapeEngine, ScrapeOptions};
use crate::store::BoardStore;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub pages_dir: PathBuf,
    /// Scrape cadence: base plus uniform jitter.
    pub base_frequency: Duration,
    pub jitter: Duration,
    /// Never schedule earlier than now + min_delay.
    pub min_delay: Duration,
    /// Failed scrapes retry after error_backoff ± error_jitter.
    pub error_backoff: Duration,
    pub error_jitter: Duration,
    pub concurrency: usize,
    pub dry_run: bool,
    pub once: bool,
    pub scrape: ScrapeOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("data/pages"),
            base_frequency: Duration::from_secs(3600),
            jitter: Duration::from_secs(30 * 60),
            min_delay: Duration::from_secs(5 * 60),
            error_backoff: Duration::from_secs(20 * 60),
            error_jitter: Duration::from_secs(5 * 60),
            concurrency: 3,
            dry_run: false,
            once: false,
            scrape: ScrapeOptions::default(),
        }
    }
}

fn jittered_seconds(span: Duration) -> f64 {
    let secs = span.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    rand::rng().random_range(-secs..=secs)
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis() as i64)
}

/// `next = (last_scraped or now) + base + U[-jitter, +jitter]`, floored at
/// `now + min_delay` with a little extra randomness so rescheduled boards
/// don't all land on the same instant.
pub fn compute_next_scrape_at(
    last_scraped: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    base: Duration,
    jitter: Duration,
    min_delay: Duration,
) -> DateTime<Utc> {
    let t0 = last_scraped.unwrap_or(now);
    let candidate = t0
        + to_chrono(base)
        + chrono::Duration::milliseconds((jittered_seconds(jitter) * 1000.0) as i64);

    let floor = now + to_chrono(min_delay);
    if candidate < floor {
        let pad = rand::rng().random_range(0.0..30.0);
        floor + chrono::Duration::milliseconds((pad * 1000.0) as i64)
    } else {
        candidate
    }
}

fn due_boards(
    boards: Vec<(PathBuf, JobBoard)>,
    now: DateTime<Utc>,
) -> Vec<(PathBuf, JobBoard)> {
    boards
        .into_iter()
        .filter(|(_, b)| b.next_scrape_at.is_none_or(|at| at <= now))
        .collect()
}

/// Scrape a single board and persist the result. Returns the number of
/// postings seen.
async fn process_board(
    engine: &ScrapeEngine,
    store: &BoardStore,
    cfg: &WorkerConfig,
    path: PathBuf,
    mut board: JobBoard,
    now: DateTime<Utc>,
) -> Result<usize> {
    let started = std::time::Instant::now();
    let outcome = engine.scrape(&board.website_url, &cfg.scrape).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    board.apply_scrape(
        &outcome.postings,
        now,
        outcome.ok,
        Some(duration_ms),
        outcome.meta.renderer_used,
        outcome.error_kind,
    );

    board.next_scrape_at = if outcome.ok {
        Some(compute_next_scrape_at(
            board.last_scraped,
            now,
            cfg.base_frequency,
            cfg.jitter,
            cfg.min_delay,
        ))
    } else {
        Some(compute_next_scrape_at(
            Some(now),
            now,
            cfg.error_backoff,
            cfg.error_jitter,
            cfg.min_delay,
        ))
    };

    if outcome.ok {
        info!(
            board = %board.title,
            count = outcome.postings.len(),
            adapter = outcome.meta.ats_adapter.unwrap_or("generic"),
            rendered_pages = outcome.meta.rendered_pages,
            duration_ms,
            "scrape finished"
        );
    } else {
        warn!(
            board = %board.title,
            error_kind = outcome.error_kind.unwrap_or("unknown"),
            duration_ms,
            "scrape failed"
        );
    }

    if cfg.dry_run {
        info!(path = %path.display(), "dry-run: skipping write");
    } else {
        store.save(&path, &board).await?;
    }
    Ok(outcome.postings.len())
}

/// Main scheduler loop. Runs until `shutdown` flips (or after one pass with
/// `once`). A shutdown mid-scrape abandons the in-flight task without
/// persisting anything for it.
pub async fn run(
    engine: Arc<ScrapeEngine>,
    store: Arc<BoardStore>,
    cfg: WorkerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(cfg.concurrency.max(1)));
    let cfg = Arc::new(cfg);
    info!(pages_dir = %cfg.pages_dir.display(), concurrency = cfg.concurrency, "worker started");

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        let now = Utc::now();
        let mut boards = store.load_all().await?;

        // First-run bias: boards never scraped before are due immediately.
        for (_, board) in &mut boards {
            if board.next_scrape_at.is_none() && board.last_scraped.is_none() {
                board.next_scrape_at = Some(now);
            }
        }

        let due = due_boards(boards, now);
        if !due.is_empty() {
            let batch: Vec<_> = due.into_iter().take(cfg.concurrency * 2).collect();
            let mut tasks: JoinSet<()> = JoinSet::new();

            for (path, board) in batch {
                let engine = Arc::clone(&engine);
                let store = Arc::clone(&store);
                let cfg = Arc::clone(&cfg);
                let semaphore = Arc::clone(&semaphore);
                let mut shutdown = shutdown.clone();

                tasks.spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    let board_title = board.title.clone();
                    tokio::select! {
                        _ = shutdown.changed() => {
                            info!(board = %board_title, "shutdown: abandoning scrape");
                        }
                        result = process_board(&engine, &store, &cfg, path, board, now) => {
                            if let Err(e) = result {
                                error!(error = %e, "board task failed");
                            }
                        }
                    }
                });
            }

            while tasks.join_next().await.is_some() {}
        }

        if cfg.once {
            return Ok(());
        }

        let mut shutdown_wait = shutdown.clone();
        tokio::select! {
            _ = shutdown_wait.changed() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_time_respects_min_delay_floor() {
        let now = Utc::now();
        // Stale last_scraped pushes the candidate into the past.
        let stale = now - chrono::Duration::hours(48);
        let next = compute_next_scrape_at(
            Some(stale),
            now,
            Duration::from_secs(3600),
            Duration::from_secs(0),
            Duration::from_secs(300),
        );
        assert!(next >= now + chrono::Duration::seconds(300));
        assert!(next <= now + chrono::Duration::seconds(300 + 31));
    }

    #[test]
    fn next_time_uses_cadence_from_last_scrape() {
        let now = Utc::now();
        let next = compute_next_scrape_at(
            Some(now),
            now,
            Duration::from_secs(3600),
            Duration::from_secs(0),
            Duration::from_secs(300),
        );
        assert_eq!(next, now + chrono::Duration::seconds(3600));
    }

    #[test]
    fn unscheduled_boards_are_due() {
        let now = Utc::now();
        let mut board = JobBoard::new("b", "https://x/icon.png", "https://x/jobs");
        let due = due_boards(vec![(PathBuf::from("b.json"), board.clone())], now);
        assert_eq!(due.len(), 1);

        board.next_scrape_at = Some(now + chrono::Duration::hours(1));
        let due = due_boards(vec![(PathBuf::from("b.json"), board)], now);
        assert!(due.is_empty());
    }
}
