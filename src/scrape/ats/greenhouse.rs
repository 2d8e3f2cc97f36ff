//! Greenhouse adapters.
//!
//! Classic `boards.greenhouse.io` boards expose a JSON feed at
//! `/{company}.json`; the newer `job-boards.greenhouse.io` boards are
//! hydrated client-side and are walked DOM-then-detail.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::http::JsonBody;
use crate::scrape::render::RenderOptions;
use crate::scrape::url::{absolutize, canonical_job_url};

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref GH_API_HOST_RE: Regex =
        Regex::new(r"(?i)(?:^|\.)boards\.greenhouse\.io$").expect("static regex");
    static ref GH_BOARD_HOST_RE: Regex =
        Regex::new(r"(?i)^job-boards\.greenhouse\.io$").expect("static regex");
    static ref GH_JOB_PATH_RE: Regex = Regex::new(r"/jobs/(\d{6,})(?:/|$)").expect("static regex");
}

static ROW_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.job-post td.cell a[href]").expect("static selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));

/// JSON-feed adapter for `boards.greenhouse.io/{company}`.
pub struct GreenhouseApiAdapter;

impl GreenhouseApiAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        _timeout: Duration,
        _max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let Some(company) = parsed.path().split('/').find(|s| !s.is_empty()) else {
            return Ok(Vec::new());
        };

        let api = format!("https://boards.greenhouse.io/{company}.json");
        let data = cx.http.fetch_json(&api, JsonBody::Get).await?;

        let mut jobs = Vec::new();
        for j in data.get("jobs").and_then(Value::as_array).into_iter().flatten() {
            let title = j.get("title").and_then(Value::as_str).unwrap_or("").trim();
            let link = j
                .get("absolute_url")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            if !title.is_empty() && !link.is_empty() {
                jobs.push(Posting::new(title, canonical_job_url(link)));
            }
        }
        Ok(jobs)
    }
}

impl AtsAdapter for GreenhouseApiAdapter {
    fn pattern(&self) -> &Regex {
        &GH_API_HOST_RE
    }

    fn name(&self) -> &'static str {
        "greenhouse"
    }

    fn renders(&self) -> bool {
        false
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

/// Make absolute, require a greenhouse host and a `/jobs/<6+ digits>` path,
/// and strip query/fragment before canonicalisation.
fn normalize_board_job_url(href: &str, base: &Url) -> Option<(String, String)> {
    let abs = absolutize(href, base)?;
    let host = abs.host_str()?.to_ascii_lowercase();
    if !(GH_BOARD_HOST_RE.is_match(&host) || GH_API_HOST_RE.is_match(&host)) {
        return None;
    }
    let caps = GH_JOB_PATH_RE.captures(abs.path())?;
    let job_id = caps[1].to_string();

    let mut cleaned = abs.clone();
    cleaned.set_query(None);
    cleaned.set_fragment(None);
    let trimmed = cleaned.path().trim_end_matches('/').to_string();
    cleaned.set_path(&trimmed);
    Some((cleaned.to_string(), job_id))
}

fn title_from_h1(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let h1 = doc.select(&H1_SELECTOR).next()?;
    let title = h1.text().collect::<Vec<_>>().join(" ").trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}

/// DOM-then-detail adapter for `job-boards.greenhouse.io` boards.
pub struct GreenhouseBoardAdapter;

impl GreenhouseBoardAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        _max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let base = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;

        let listing_html = cx
            .renderer
            .fetch_rendered_html(
                url,
                &RenderOptions::new("tr.job-post a[href*=\"/jobs/\"]", timeout),
            )
            .await?;

        let links: Vec<(String, String)> = {
            let doc = Html::parse_document(&listing_html);
            doc.select(&ROW_ANCHOR_SELECTOR)
                .filter_map(|a| normalize_board_job_url(a.value().attr("href")?, &base))
                .collect()
        };

        let mut jobs = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (cleaned, job_id) in links {
            if !seen_ids.insert(job_id) {
                continue;
            }
            let link = canonical_job_url(&cleaned);

            // Greenhouse job pages are SSR, but play safe and wait for <h1>.
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

impl AtsAdapter for GreenhouseBoardAdapter {
    fn pattern(&self) -> &Regex {
        &GH_BOARD_HOST_RE
    }

    fn name(&self) -> &'static str {
        "greenhouse-board"
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
    fn board_job_urls_require_numeric_ids() {
        let base = Url::parse("https://job-boards.greenhouse.io/acme").unwrap();
        let (cleaned, id) =
            normalize_board_job_url("/acme/jobs/8071417002?gh_src=x#apply", &base).unwrap();
        assert_eq!(cleaned, "https://job-boards.greenhouse.io/acme/jobs/8071417002");
        assert_eq!(id, "8071417002");

        assert!(normalize_board_job_url("/acme/jobs/abc", &base).is_none());
        assert!(normalize_board_job_url("https://elsewhere.com/jobs/123456", &base).is_none());
    }
}
