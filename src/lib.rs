//! boardwatch: tracks the lifecycle of job postings across heterogeneous
//! career sites.
//!
//! Each tracked board is periodically scraped (native ATS API, generic HTML
//! extraction, or headless render), reconciled against its previously
//! observed state with flap suppression and a health-aware merge, and
//! persisted as a standalone JSON document. The scheduler applies jittered
//! cadence plus error backoff under a bounded concurrency budget.

pub mod model;
pub mod scrape;
pub mod store;
pub mod worker;

pub use model::{
    normalize_history, HealthReason, HealthStatus, Job, JobBoard, JobStatus, Posting,
    ScrapeAttempt, ScrapeHealth, ScrapePolicy, Status,
};
pub use scrape::ats::{AdapterContext, AdapterRegistry, AtsAdapter};
pub use scrape::error::ScrapeError;
pub use scrape::http::HttpClient;
pub use scrape::render::{RenderOptions, Renderer};
pub use scrape::url::{canonical_job_url, normalize_listing_identity};
pub use scrape::{ScrapeEngine, ScrapeMeta, ScrapeOptions, ScrapeOutcome};
pub use store::{reset_boards, slugify, BoardStore};
pub use worker::{compute_next_scrape_at, WorkerConfig};
