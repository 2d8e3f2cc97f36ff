//! Strict anchor extractor: the last-resort sweep over every link.
//!
//! An anchor qualifies only when it carries a known job-title automation
//! marker, points at a detail-looking URL, or wraps a meaningful heading.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::Posting;
use crate::scrape::detail::{
    clean_anchor_text, first_heading_by_rank, looks_like_job_detail_url, title_from_aria,
};
use crate::scrape::url::{absolutize, canonical_job_url, is_http_url};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// CTA phrases that disqualify a heading from being a job title.
const CTA_HEADINGS: &[&str] = &["apply now", "learn more", "see all jobs", "view all"];

fn meaningful_heading(anchor: ElementRef<'_>) -> String {
    let heading = first_heading_by_rank(anchor);
    if heading.len() < 4 {
        return String::new();
    }
    if CTA_HEADINGS.contains(&heading.to_ascii_lowercase().as_str()) {
        return String::new();
    }
    heading
}

pub fn extract_anchor_jobs_strict(doc: &Html, base_url: &Url) -> Vec<Posting> {
    let mut jobs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !is_http_url(href) {
            continue;
        }
        let Some(abs) = absolutize(href, base_url) else {
            continue;
        };

        let has_marker = anchor.value().attr("data-automation-id") == Some("jobTitle");
        let heading = meaningful_heading(anchor);
        if !has_marker && !looks_like_job_detail_url(abs.as_str()) && heading.is_empty() {
            continue;
        }

        let link = canonical_job_url(abs.as_str());
        if seen.contains(&link) {
            continue;
        }

        let mut title = heading;
        if title.is_empty() {
            title = title_from_aria(anchor);
        }
        if title.is_empty() {
            title = clean_anchor_text(anchor);
        }
        if title.is_empty() {
            continue;
        }

        seen.insert(link.clone());
        jobs.push(Posting::new(title, link));
    }

    jobs
}
