//! Scrape engine.
//!
//! Routes a board URL to the right extraction strategy: the ATS fast-path
//! when an adapter claims the host, otherwise the generic HTML loop with
//! JS-shell detection, headless-render fallback, and conservative
//! pagination. All failures reduce to a uniform `(ok, count, error_kind)`
//! signal at this boundary; partial results are never thrown away.

pub mod ats;
pub mod detail;
pub mod error;
pub mod extract;
pub mod http;
pub mod js_detect;
pub mod pagination;
pub mod render;
pub mod url;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use scraper::Html;
use tracing::{info, warn};
// `::url` disambiguates the crate from this module's `url` child.
use ::url::Url;

use crate::model::Posting;

use self::ats::{AdapterContext, AdapterRegistry};
use self::error::ScrapeError;
use self::extract::extract_all;
use self::http::HttpClient;
use self::js_detect::looks_js_shell;
use self::pagination::discover_next_page_url;
use self::render::{RenderOptions, Renderer};
use self::url::normalize_listing_identity;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub timeout: Duration,
    pub max_pages: usize,
    /// Conservative default: pagination never leaves the board's host.
    pub same_host_only: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_pages: 5,
            same_host_only: true,
        }
    }
}

/// What happened during a scrape, alongside the postings themselves.
#[derive(Debug, Clone, Default)]
pub struct ScrapeMeta {
    /// `Some(true)` once a render occurred, `Some(false)` for pure-HTTP
    /// flows, `None` when it never got far enough to know.
    pub renderer_used: Option<bool>,
    pub attempted_pages: u32,
    pub rendered_pages: u32,
    pub ats_adapter: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub postings: Vec<Posting>,
    pub meta: ScrapeMeta,
    /// False only on complete failure; a partial harvest is still ok.
    pub ok: bool,
    pub error_kind: Option<&'static str>,
}

/// Process-wide engine: one HTTP client, one renderer, one adapter registry.
pub struct ScrapeEngine {
    registry: AdapterRegistry,
    cx: AdapterContext,
}

impl ScrapeEngine {
    pub fn new(http: Arc<HttpClient>, renderer: Arc<Renderer>) -> Self {
        Self {
            registry: AdapterRegistry::standard(),
            cx: AdapterContext { http, renderer },
        }
    }

    pub fn with_registry(
        http: Arc<HttpClient>,
        renderer: Arc<Renderer>,
        registry: AdapterRegistry,
    ) -> Self {
        Self {
            registry,
            cx: AdapterContext { http, renderer },
        }
    }

    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.cx.renderer
    }

    /// Scrape one board URL. Never returns an error: failures are folded
    /// into the outcome so the caller can feed them straight into the
    /// board's attempt log.
    pub async fn scrape(&self, website_url: &str, opts: &ScrapeOptions) -> ScrapeOutcome {
        // 1) ATS fast-path.
        if let Some(result) = self
            .registry
            .scrape_if_supported(&self.cx, website_url, opts.timeout, opts.max_pages)
            .await
        {
            return match result {
                Ok((postings, adapter, renders)) => ScrapeOutcome {
                    meta: ScrapeMeta {
                        renderer_used: Some(renders),
                        attempted_pages: 0,
                        rendered_pages: 0,
                        ats_adapter: Some(adapter),
                    },
                    ok: true,
                    error_kind: None,
                    postings,
                },
                Err(e) => {
                    warn!(url = website_url, error = %e, "ATS adapter failed");
                    ScrapeOutcome {
                        postings: Vec::new(),
                        meta: ScrapeMeta {
                            renderer_used: None,
                            ..ScrapeMeta::default()
                        },
                        ok: false,
                        error_kind: Some(e.kind()),
                    }
                }
            };
        }

        // 2) Generic HTML loop with conservative pagination.
        self.scrape_generic(website_url, opts).await
    }

    async fn scrape_generic(&self, website_url: &str, opts: &ScrapeOptions) -> ScrapeOutcome {
        let mut meta = ScrapeMeta {
            renderer_used: Some(false),
            ..ScrapeMeta::default()
        };
        let mut collected: Vec<Posting> = Vec::new();
        let mut seen_links: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut last_error: Option<ScrapeError> = None;

        let base_host = Url::parse(website_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned));

        let mut current = website_url.to_string();
        for _ in 0..opts.max_pages {
            let page_url = normalize_listing_identity(&current);
            if !visited.insert(page_url.clone()) {
                break;
            }
            meta.attempted_pages += 1;

            let mut html = match self.cx.http.fetch_text(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %page_url, error = %e, "page fetch failed");
                    last_error = Some(e);
                    break;
                }
            };

            if looks_js_shell(&html) {
                info!(url = %page_url, "JS shell detected; rendering");
                match self
                    .cx
                    .renderer
                    .fetch_rendered_html(&page_url, &RenderOptions::generic(opts.timeout))
                    .await
                {
                    Ok(rendered) => {
                        html = rendered;
                        meta.rendered_pages += 1;
                        meta.renderer_used = Some(true);
                    }
                    Err(e) => {
                        warn!(url = %page_url, error = %e, "render failed");
                        last_error = Some(e);
                        break;
                    }
                }
            }

            // Parse and extract synchronously so nothing non-Send lives
            // across an await point.
            let (page_postings, next_url) = {
                let Ok(base) = Url::parse(&page_url) else {
                    break;
                };
                let doc = Html::parse_document(&html);
                let postings = extract_all(&doc, &base);
                let next = discover_next_page_url(&doc, &page_url, &page_url);
                (postings, next)
            };

            for posting in page_postings {
                if seen_links.insert(posting.link.clone()) {
                    collected.push(posting);
                }
            }

            let Some(next) = next_url else { break };
            if opts.same_host_only {
                let next_host = Url::parse(&next)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_owned));
                if next_host.is_some() && next_host != base_host {
                    break;
                }
            }
            current = next;
        }

        let ok = !collected.is_empty() || last_error.is_none();
        let error_kind = if collected.is_empty() {
            last_error.as_ref().map(ScrapeError::kind)
        } else {
            None
        };
        ScrapeOutcome {
            postings: collected,
            meta,
            ok,
            error_kind,
        }
    }
}
