//! Scrape error taxonomy.
//!
//! Every failure inside a scrape reduces to one of these kinds at the engine
//! boundary; the stable [`ScrapeError::kind`] identifiers are what ends up in
//! a board's attempt log and what the scheduler's backoff consumes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// DNS, TCP, TLS, connection reset, or timeout during an HTTP fetch.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response that survived the per-host retry.
    #[error("http status {0}")]
    HttpStatus(u16),

    /// Headless render exceeded its deadline.
    #[error("render timed out: {0}")]
    RenderTimeout(String),

    /// Browser or browsing-context failure.
    #[error("render failed: {0}")]
    RenderError(String),

    /// HTML was decodable but no extractor produced results where results
    /// were expected. An empty-but-ok scrape is *not* this kind.
    #[error("no extractor yielded results")]
    Parse,

    /// Adapter-specific failure, e.g. an expected JSON shape was missing.
    #[error("ats adapter failure: {0}")]
    Ats(String),

    /// An on-disk board document failed schema validation. Such documents
    /// are skipped by the store; no attempt is recorded against them.
    #[error("document failed validation: {0}")]
    Validation(String),
}

impl ScrapeError {
    /// Stable identifier recorded in [`crate::model::ScrapeAttempt::error_kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Network(_) => "network",
            ScrapeError::HttpStatus(_) => "http_status",
            ScrapeError::RenderTimeout(_) => "render_timeout",
            ScrapeError::RenderError(_) => "render_error",
            ScrapeError::Parse => "parse_error",
            ScrapeError::Ats(_) => "ats_error",
            ScrapeError::Validation(_) => "validation",
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ScrapeError::HttpStatus(status.as_u16()),
            None => ScrapeError::Network(err.to_string()),
        }
    }
}
