//! Rendered-DOM Workday adapter for `wd<n>.myworkdaysite.com` boards, which
//! have no usable cxs endpoint. Listing pages hydrate client-side; job cards
//! carry `data-automation-id="jobTitle"` anchors.

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
    static ref WORKDAY_SITE_HOST_RE: Regex =
        Regex::new(r"(?i)(?:^|\.)wd\d+\.myworkdaysite\.com$").expect("static regex");
    static ref REQ_ID_RE: Regex =
        Regex::new(r"(?i)\b((?:JR|R|REQ)[-_]?\d{4,8}(?:-\d+)?)\b").expect("static regex");
}

static JOB_TITLE_ANCHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[data-automation-id=\"jobTitle\"][href]").expect("static selector")
});

const WAIT_SELECTOR: &str = "a[data-automation-id=\"jobTitle\"][href]";

fn build_page_url(base: &Url, page: usize) -> String {
    let mut pairs: Vec<(String, String)> = base
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| k != "page")
        .collect();
    pairs.push(("page".to_string(), page.to_string()));

    let mut out = base.clone();
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    out.set_query(Some(&query));
    out.to_string()
}

/// Rewrite `/…/job/<location>/<slug>` listing hrefs to `/…/details/<slug>`.
fn to_details_url(abs: &Url) -> String {
    let segments: Vec<&str> = abs.path().split('/').filter(|s| !s.is_empty()).collect();
    if segments.contains(&"details") {
        return abs.to_string();
    }
    if let Some(idx) = segments.iter().position(|s| *s == "job")
        && idx + 1 < segments.len()
    {
        let mut new_segments: Vec<&str> = segments[..idx].to_vec();
        new_segments.push("details");
        new_segments.extend_from_slice(&segments[idx + 2..]);
        let mut out = abs.clone();
        out.set_path(&format!("/{}", new_segments.join("/")));
        return out.to_string();
    }
    abs.to_string()
}

fn extract_req_id(text: &str) -> Option<String> {
    REQ_ID_RE.captures(text).map(|c| c[1].to_uppercase())
}

pub struct WorkdaySiteAdapter;

impl WorkdaySiteAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let base = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let has_page_param = base.query_pairs().any(|(k, _)| k == "page");
        let start_page: usize = base
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);

        let mut jobs: Vec<Posting> = Vec::new();
        let mut seen_req_ids: HashSet<String> = HashSet::new();
        let mut seen_links: HashSet<String> = HashSet::new();

        for i in 0..max_pages {
            let page_url = if i == 0 && !has_page_param {
                base.to_string()
            } else {
                build_page_url(&base, start_page + i)
            };

            let html = cx
                .renderer
                .fetch_rendered_html(&page_url, &RenderOptions::new(WAIT_SELECTOR, timeout))
                .await?;

            // Parse synchronously; nothing borrowed survives past this block.
            let page_jobs: Vec<(String, String, Option<String>)> = {
                let doc = Html::parse_document(&html);
                let page_base = Url::parse(&page_url).unwrap_or_else(|_| base.clone());
                doc.select(&JOB_TITLE_ANCHOR)
                    .filter_map(|a| {
                        let href = a.value().attr("href")?;
                        let abs = absolutize(href, &page_base)?;
                        let link = canonical_job_url(&to_details_url(&abs));
                        let title = a.text().collect::<String>().trim().to_string();
                        if title.is_empty() {
                            return None;
                        }
                        let rid = extract_req_id(&link)
                            .or_else(|| extract_req_id(&title))
                            .or_else(|| extract_req_id(abs.as_str()));
                        Some((title, link, rid))
                    })
                    .collect()
            };

            if page_jobs.is_empty() {
                break;
            }

            let mut page_added = 0usize;
            for (title, link, rid) in page_jobs {
                match rid {
                    Some(rid) => {
                        if !seen_req_ids.insert(rid) {
                            continue;
                        }
                    }
                    None => {
                        if !seen_links.insert(link.clone()) {
                            continue;
                        }
                    }
                }
                jobs.push(Posting::new(title, link));
                page_added += 1;
            }

            // A page of nothing-new means pagination is exhausted.
            if page_added == 0 {
                break;
            }
        }

        Ok(jobs)
    }
}

impl AtsAdapter for WorkdaySiteAdapter {
    fn pattern(&self) -> &Regex {
        &WORKDAY_SITE_HOST_RE
    }

    fn name(&self) -> &'static str {
        "workday-site"
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
    fn rewrites_job_location_paths_to_details() {
        let url =
            Url::parse("https://wd1.myworkdaysite.com/en-US/recruiting/acme/jobs/job/Zurich/Engineer_JR-10203")
                .unwrap();
        assert_eq!(
            to_details_url(&url),
            "https://wd1.myworkdaysite.com/en-US/recruiting/acme/jobs/details/Engineer_JR-10203"
        );
    }

    #[test]
    fn leaves_details_urls_alone() {
        let url = Url::parse("https://wd1.myworkdaysite.com/a/details/Engineer_JR-10203").unwrap();
        assert_eq!(to_details_url(&url), url.as_str());
    }

    #[test]
    fn req_ids_normalise_case() {
        assert_eq!(extract_req_id("Engineer_jr-10203"), Some("JR-10203".to_string()));
        assert_eq!(extract_req_id("no id here"), None);
    }
}
