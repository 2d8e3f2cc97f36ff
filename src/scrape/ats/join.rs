//! join.com adapter. Company listings render job tiles as
//! `a[data-testid="Link"]` anchors pointing at `/companies/<org>/<id>-<slug>`
//! detail pages; details are followed for the `<h1>` title.
//!
//! The listing uses infinite scroll; this scrapes the initially rendered page.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::render::RenderOptions;
use crate::scrape::url::{absolutize, canonical_job_url};

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref JOIN_HOST_RE: Regex =
        Regex::new(r"(?i)(?:^|\.)join\.com$").expect("static regex");
    static ref JOIN_JOB_PATH_RE: Regex =
        Regex::new(r"^/companies/[^/]+/\d{5,}-[A-Za-z0-9-]+/?$").expect("static regex");
}

static TILE_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[data-testid=\"Link\"][href]").expect("static selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));

const WAIT_SELECTOR: &str = "a[data-testid=\"Link\"][href*=\"/companies/\"][href*=\"-\"]";

fn normalize_job_url(href: &str, base: &Url) -> Option<String> {
    let abs = absolutize(href, base)?;
    let host = abs.host_str()?.to_ascii_lowercase();
    if !JOIN_HOST_RE.is_match(&host) {
        return None;
    }
    if !JOIN_JOB_PATH_RE.is_match(abs.path()) {
        return None;
    }
    let mut cleaned = abs.clone();
    cleaned.set_query(None);
    cleaned.set_fragment(None);
    let trimmed = cleaned.path().trim_end_matches('/').to_string();
    cleaned.set_path(&trimmed);
    Some(cleaned.to_string())
}

fn title_from_h1(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let h1 = doc.select(&H1_SELECTOR).next()?;
    let title = h1.text().collect::<Vec<_>>().join(" ").trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}

pub struct JoinAdapter;

impl JoinAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        _max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let base = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;

        let listing_html = cx
            .renderer
            .fetch_rendered_html(url, &RenderOptions::new(WAIT_SELECTOR, timeout))
            .await?;

        let links: Vec<String> = {
            let doc = Html::parse_document(&listing_html);
            doc.select(&TILE_ANCHOR_SELECTOR)
                .filter_map(|a| normalize_job_url(a.value().attr("href")?, &base))
                .collect()
        };

        let mut jobs = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for cleaned in links {
            let link = canonical_job_url(&cleaned);
            if !seen.insert(link.clone()) {
                continue;
            }
            let detail_html = cx
                .renderer
                .fetch_rendered_html(&link, &RenderOptions::new("h1", timeout))
                .await?;
            let Some(title) = title_from_h1(&detail_html) else {
                continue;
            };
            jobs.push(Posting::new(title, link));
        }

        Ok(jobs)
    }
}

impl AtsAdapter for JoinAdapter {
    fn pattern(&self) -> &Regex {
        &JOIN_HOST_RE
    }

    fn name(&self) -> &'static str {
        "join.com"
    }

    fn renders(&self) -> bool {
        true
    }

    fn scrape<'a>(
        &'a self,
        cx: &'a AdapterContext,
        url: &'a str,
        timeout: Duration,
        max_pages: usize,
    ) -> BoxFuture<'a, Result<Vec<Posting>, ScrapeError>> {
        Box::pin(Self::scrape_impl(cx, url, timeout, max_pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_paths_need_id_and_slug() {
        let base = Url::parse("https://join.com/companies/acme").unwrap();
        assert_eq!(
            normalize_job_url("/companies/acme/13371337-rust-engineer/", &base).unwrap(),
            "https://join.com/companies/acme/13371337-rust-engineer"
        );
        assert!(normalize_job_url("/companies/acme/about", &base).is_none());
        assert!(normalize_job_url("/companies/acme/123-x", &base).is_none());
    }
}
