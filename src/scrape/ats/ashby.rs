//! Ashby adapter. Boards on `jobs.ashbyhq.com` hydrate client-side and use
//! hashed class names, so job tiles are recognised purely by href shape:
//! `/<org>/<uuid>`.

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
    static ref ASHBY_HOST_RE: Regex =
        Regex::new(r"(?i)(?:^|\.)jobs\.ashbyhq\.com$").expect("static regex");
    static ref UUID_PATH_RE: Regex = Regex::new(
        r"/[^/]+/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})(?:/|$)"
    )
    .expect("static regex");
}

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));

fn org_slug(url: &Url) -> Option<String> {
    url.path()
        .split('/')
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Absolute + Ashby host + UUID in path; query/fragment stripped.
fn normalize_job_url(href: &str, base: &Url) -> Option<(String, String)> {
    let abs = absolutize(href, base)?;
    let host = abs.host_str()?.to_ascii_lowercase();
    if !ASHBY_HOST_RE.is_match(&host) {
        return None;
    }
    let uuid = UUID_PATH_RE.captures(abs.path())?[1].to_ascii_lowercase();

    let mut cleaned = abs.clone();
    cleaned.set_query(None);
    cleaned.set_fragment(None);
    let trimmed = cleaned.path().trim_end_matches('/').to_string();
    cleaned.set_path(&trimmed);
    Some((cleaned.to_string(), uuid))
}

fn title_from_h1(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let h1 = doc.select(&H1_SELECTOR).next()?;
    let title = h1.text().collect::<Vec<_>>().join(" ").trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}

pub struct AshbyAdapter;

impl AshbyAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        _max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let base = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let org = org_slug(&base);

        // Tiles are anchors at "/<org>/…" containing dashes (the UUID).
        let wait_for = match &org {
            Some(org) => format!("a[href^=\"/{org}/\"][href*=\"-\"]"),
            None => "a[href*=\"-\"]".to_string(),
        };
        let listing_html = cx
            .renderer
            .fetch_rendered_html(url, &RenderOptions::new(wait_for, timeout))
            .await?;

        let links: Vec<(String, String)> = {
            let doc = Html::parse_document(&listing_html);
            doc.select(&ANCHOR_SELECTOR)
                .filter_map(|a| normalize_job_url(a.value().attr("href")?, &base))
                .collect()
        };

        let mut jobs = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (cleaned, uuid) in links {
            if !seen_ids.insert(uuid) {
                continue;
            }
            let link = canonical_job_url(&cleaned);

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

impl AtsAdapter for AshbyAdapter {
    fn pattern(&self) -> &Regex {
        &ASHBY_HOST_RE
    }

    fn name(&self) -> &'static str {
        "ashbyhq"
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
    fn job_urls_require_uuid_leaves() {
        let base = Url::parse("https://jobs.ashbyhq.com/lakera.ai").unwrap();
        let (cleaned, uuid) = normalize_job_url(
            "/lakera.ai/4F9A0675-1A2B-4C3D-9E8F-001122334455/?src=top",
            &base,
        )
        .unwrap();
        assert_eq!(
            cleaned,
            "https://jobs.ashbyhq.com/lakera.ai/4F9A0675-1A2B-4C3D-9E8F-001122334455"
        );
        assert_eq!(uuid, "4f9a0675-1a2b-4c3d-9e8f-001122334455");

        assert!(normalize_job_url("/lakera.ai/about-us", &base).is_none());
    }
}
