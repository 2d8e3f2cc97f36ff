//! ATS adapter registry.
//!
//! Each vendor adapter exposes the same contract: a host pattern, a stable
//! name, a declaration of whether it intrinsically renders, a cheap URL
//! match, and the scrape itself. The registry is an ordered list; the first
//! matching adapter wins and the generic flow is skipped entirely.

mod ashby;
mod greenhouse;
mod join;
mod lever;
mod meta;
mod microsoft;
mod proton;
mod workday;
mod workday_site;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::info;
use url::Url;

use crate::model::Posting;

use super::error::ScrapeError;
use super::http::HttpClient;
use super::render::Renderer;
use super::url::canonical_job_url;

pub use ashby::AshbyAdapter;
pub use greenhouse::{GreenhouseApiAdapter, GreenhouseBoardAdapter};
pub use join::JoinAdapter;
pub use lever::LeverAdapter;
pub use meta::MetaCareersAdapter;
pub use microsoft::MicrosoftAdapter;
pub use proton::ProtonAdapter;
pub use workday::WorkdayAdapter;
pub use workday_site::WorkdaySiteAdapter;

/// Shared process-wide handles threaded into every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub http: Arc<HttpClient>,
    pub renderer: Arc<Renderer>,
}

pub trait AtsAdapter: Send + Sync {
    /// Host pattern this adapter claims.
    fn pattern(&self) -> &Regex;

    /// Stable identifier recorded in scrape metadata.
    fn name(&self) -> &'static str;

    /// Whether the adapter intrinsically needs the headless renderer.
    fn renders(&self) -> bool;

    fn matches(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.pattern().is_match(&h.to_ascii_lowercase())))
            .unwrap_or(false)
    }

    fn scrape<'a>(
        &'a self,
        cx: &'a AdapterContext,
        url: &'a str,
        timeout: Duration,
        max_pages: usize,
    ) -> BoxFuture<'a, Result<Vec<Posting>, ScrapeError>>;
}

/// Ordered adapter list; order is significant, first match wins.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn AtsAdapter>>,
}

impl AdapterRegistry {
    /// The standard vendor set.
    pub fn standard() -> Self {
        Self {
            adapters: vec![
                Box::new(LeverAdapter),
                Box::new(MetaCareersAdapter),
                Box::new(MicrosoftAdapter),
                Box::new(ProtonAdapter::new(vec![
                    "Geneva".into(),
                    "Switzerland".into(),
                    "Zurich".into(),
                ])),
                Box::new(WorkdayAdapter),
                Box::new(WorkdaySiteAdapter),
                Box::new(JoinAdapter),
                Box::new(GreenhouseApiAdapter),
                Box::new(GreenhouseBoardAdapter),
                Box::new(AshbyAdapter),
            ],
        }
    }

    /// Build a registry from an explicit adapter list (order preserved).
    pub fn with_adapters(adapters: Vec<Box<dyn AtsAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn find(&self, url: &str) -> Option<&dyn AtsAdapter> {
        self.adapters
            .iter()
            .find(|a| a.matches(url))
            .map(|boxed| boxed.as_ref())
    }

    /// Run the first matching adapter, if any, deduplicating the result by
    /// canonical link. Returns `None` when no adapter claims the URL.
    pub async fn scrape_if_supported(
        &self,
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        max_pages: usize,
    ) -> Option<Result<(Vec<Posting>, &'static str, bool), ScrapeError>> {
        let adapter = self.find(url)?;
        info!(adapter = adapter.name(), url, "ATS fast-path");

        let result = adapter.scrape(cx, url, timeout, max_pages).await.map(|raw| {
            let mut seen: HashSet<String> = HashSet::new();
            let mut out = Vec::with_capacity(raw.len());
            for posting in raw {
                let link = canonical_job_url(&posting.link);
                if seen.insert(link.clone()) {
                    out.push(Posting::new(posting.title, link));
                }
            }
            (out, adapter.name(), adapter.renders())
        });
        Some(result)
    }
}
