//! Microsoft Careers adapter. The search UI is fully client-rendered; job
//! ids are recovered from the cards and composed into canonical global
//! detail URLs using Microsoft's observed slug rules.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::render::RenderOptions;
use crate::scrape::url::canonical_job_url;

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref MS_HOST_RE: Regex =
        Regex::new(r"(?i)(^|\.)careers\.microsoft\.com$").expect("static regex");
    static ref JOB_ITEM_ID_RE: Regex =
        Regex::new(r"(?i)\bJob item\s+(\d{6,})\b").expect("static regex");
    static ref ANY_DIGITS_RE: Regex = Regex::new(r"(\d{6,})").expect("static regex");
}

static JOB_ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "#job-search-app [role=\"listitem\"].ms-List-cell, div[role=\"listitem\"].ms-List-cell",
    )
    .expect("static selector")
});
static ARIA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[aria-label]").expect("static selector"));
static H2_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("static selector"));

const WAIT_SELECTOR: &str = "#job-search-app [role='listitem'], [data-automationid='ListCell']";

/// Microsoft slug rule as observed: trim, space → `-`, percent-encode
/// anything outside `[A-Za-z0-9-]` byte-wise, preserve case, never collapse
/// repeated hyphens.
fn slugify_ms_title(title: &str) -> String {
    let replaced = title.trim().replace(' ', "-");
    let mut out = String::with_capacity(replaced.len());
    for byte in replaced.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Pull the job id out of a card: aria-label "Job item NNNNNNN" first, then
/// any descendant attribute carrying a 6+ digit block (preferring 6–8 digit
/// candidates, then shorter ones).
fn extract_job_id(item: ElementRef<'_>) -> Option<String> {
    for el in item.select(&ARIA_SELECTOR) {
        if let Some(aria) = el.value().attr("aria-label")
            && let Some(caps) = JOB_ITEM_ID_RE.captures(aria)
        {
            return Some(caps[1].to_string());
        }
    }

    let mut candidates: Vec<(usize, String)> = Vec::new();
    for el in item.descendants().filter_map(ElementRef::wrap) {
        for (_, value) in el.value().attrs() {
            for caps in ANY_DIGITS_RE.captures_iter(value) {
                let digits = caps[1].to_string();
                let bucket = if (6..=8).contains(&digits.len()) { 0 } else { 1 };
                candidates.push((bucket * 100 + digits.len(), digits));
            }
        }
    }
    candidates.sort();
    candidates.into_iter().next().map(|(_, digits)| digits)
}

fn extract_title(item: ElementRef<'_>) -> Option<String> {
    let h2 = item.select(&H2_SELECTOR).next()?;
    let title = h2.text().collect::<Vec<_>>().join(" ").trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}

fn build_page_url(base: &Url, page: usize) -> String {
    let mut pairs: Vec<(String, String)> = base
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| k != "pg")
        .collect();
    pairs.push(("pg".to_string(), page.to_string()));

    let mut out = base.clone();
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    out.set_query(Some(&query));
    out.to_string()
}

pub struct MicrosoftAdapter;

impl MicrosoftAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let base = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let start_page: usize = base
            .query_pairs()
            .find(|(k, _)| k == "pg")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);

        let mut jobs: Vec<Posting> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for i in 0..max_pages {
            let page_url = build_page_url(&base, start_page + i);
            let html = cx
                .renderer
                .fetch_rendered_html(&page_url, &RenderOptions::new(WAIT_SELECTOR, timeout))
                .await?;

            let cards: Vec<(String, String)> = {
                let doc = Html::parse_document(&html);
                doc.select(&JOB_ITEM_SELECTOR)
                    .filter_map(|item| {
                        let id = extract_job_id(item)?;
                        let title = extract_title(item)?;
                        Some((id, title))
                    })
                    .collect()
            };

            // Nothing rendered: stop early.
            if cards.is_empty() {
                break;
            }

            let mut page_added = 0usize;
            for (id, title) in cards {
                if !seen_ids.insert(id.clone()) {
                    continue;
                }
                let slug = slugify_ms_title(&title);
                let link = canonical_job_url(&format!(
                    "https://jobs.careers.microsoft.com/global/en/job/{id}/{slug}"
                ));
                jobs.push(Posting::new(title, link));
                page_added += 1;
            }

            // Zero new jobs on a page means pagination is exhausted.
            if page_added == 0 {
                break;
            }
        }

        Ok(jobs)
    }
}

impl AtsAdapter for MicrosoftAdapter {
    fn pattern(&self) -> &Regex {
        &MS_HOST_RE
    }

    fn name(&self) -> &'static str {
        "microsoft"
    }

    fn renders(&self) -> bool {
        true
    }

    fn matches(&self, url: &str) -> bool {
        // Suffix check avoids subtle regex anchoring issues across
        // jobs.careers.microsoft.com and friends.
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .is_some_and(|h| h == "careers.microsoft.com" || h.ends_with(".careers.microsoft.com"))
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
    fn slug_preserves_case_and_hyphens() {
        assert_eq!(
            slugify_ms_title("Senior Software Engineer"),
            "Senior-Software-Engineer"
        );
        assert_eq!(slugify_ms_title("C++ Engineer"), "C%2B%2B-Engineer");
        assert_eq!(slugify_ms_title("  Data -- Scientist "), "Data----Scientist");
    }

    #[test]
    fn job_id_prefers_aria_label() {
        let html = r#"<div id="card">
            <a aria-label="Job item 1854316">Open</a>
            <span data-x="99999999123">x</span>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("#card").unwrap();
        let card = doc.select(&sel).next().unwrap();
        assert_eq!(extract_job_id(card), Some("1854316".to_string()));
    }

    #[test]
    fn job_id_falls_back_to_attribute_digits() {
        let html = r#"<div id="card"><div data-job-id="1234567"></div></div>"#;
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("#card").unwrap();
        let card = doc.select(&sel).next().unwrap();
        assert_eq!(extract_job_id(card), Some("1234567".to_string()));
    }
}
