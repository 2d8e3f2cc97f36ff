//! Proton adapter: their board on Greenhouse EU, filtered to configured
//! locations with a fuzzy matcher tolerant of small misspellings.

use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::render::RenderOptions;
use crate::scrape::url::{absolutize, canonical_job_url};

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref PROTON_HOST_RE: Regex =
        Regex::new(r"(?i)(^|\.)job-boards\.eu\.greenhouse\.io$").expect("static regex");
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]+").expect("static regex");
    static ref LOCATION_SPLIT_RE: Regex = Regex::new(r"[;,/|•·]+").expect("static regex");
}

static ROW_ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".job-posts--table--department tr.job-post a[href]").expect("static selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".body.body--medium").expect("static selector"));
static LOCATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".body.body__secondary.body--metadata").expect("static selector")
});

const WAIT_SELECTOR: &str = ".job-posts--table--department tr.job-post a[href]";
const LIST_PATH: &str = "/proton";

fn strip_accents(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Case- and accent-insensitive, non-alphanumerics collapsed to spaces.
fn norm(s: &str) -> String {
    let folded = strip_accents(s).to_lowercase();
    NON_ALNUM_RE.replace_all(&folded, " ").trim().to_string()
}

fn split_locations(text: &str) -> Vec<String> {
    LOCATION_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Damerau-Levenshtein distance with an early exit once `max_dist` is
/// exceeded; returns `max_dist + 1` in that case. Inputs are short
/// normalized location strings.
fn damerau_levenshtein_capped(a: &str, b: &str, max_dist: usize) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max_dist {
        return max_dist + 1;
    }

    let mut prev_prev: Vec<usize> = (0..=b.len()).collect();
    let mut prev: Vec<usize> = vec![0; b.len() + 1];
    let mut curr: Vec<usize> = vec![0; b.len() + 1];
    prev.copy_from_slice(&prev_prev);

    for i in 1..=a.len() {
        curr[0] = i;
        let mut row_min = usize::MAX;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                d = d.min(prev_prev[j - 2] + 1);
            }
            curr[j] = d;
            row_min = row_min.min(d);
        }
        if row_min > max_dist {
            return max_dist + 1;
        }
        std::mem::swap(&mut prev_prev, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()].min(max_dist + 1)
}

/// True when any candidate location matches any configured term, by
/// substring either way or within the edit-distance cap.
fn any_fuzzy_match(candidates: &[String], terms: &[String], max_edit_distance: usize) -> bool {
    let norm_terms: Vec<String> = terms
        .iter()
        .map(|t| norm(t))
        .filter(|t| !t.is_empty())
        .collect();
    if norm_terms.is_empty() {
        // No filters configured: accept everything.
        return true;
    }

    for candidate in candidates {
        let c = norm(candidate);
        if c.is_empty() {
            continue;
        }
        for t in &norm_terms {
            if c.contains(t.as_str()) || t.contains(c.as_str()) {
                return true;
            }
            if damerau_levenshtein_capped(t, &c, max_edit_distance) <= max_edit_distance {
                return true;
            }
        }
    }
    false
}

/// Title text excluding the "New" pill container.
fn title_without_badges(title_el: ElementRef<'_>) -> String {
    fn walk(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut String) {
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().classes().any(|c| c == "tag-container") {
                return;
            }
        } else if let scraper::Node::Text(text) = node.value() {
            out.push_str(text);
            out.push(' ');
        }
        for child in node.children() {
            walk(child, out);
        }
    }

    let mut out = String::new();
    walk(*title_el, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct ProtonAdapter {
    location_terms: Vec<String>,
    max_edit_distance: usize,
}

impl ProtonAdapter {
    pub fn new(location_terms: Vec<String>) -> Self {
        Self {
            location_terms,
            max_edit_distance: 2,
        }
    }

    async fn scrape_impl(
        &self,
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;

        // Land on the list page even when given a job detail URL.
        let mut list_url = parsed.clone();
        list_url.set_path(LIST_PATH);
        list_url.set_query(None);
        list_url.set_fragment(None);

        let html = cx
            .renderer
            .fetch_rendered_html(list_url.as_str(), &RenderOptions::new(WAIT_SELECTOR, timeout))
            .await?;

        let rows: Vec<(String, String, Vec<String>)> = {
            let doc = Html::parse_document(&html);
            doc.select(&ROW_ANCHOR_SELECTOR)
                .filter_map(|a| {
                    let href = a.value().attr("href")?;
                    let title = match a.select(&TITLE_SELECTOR).next() {
                        Some(el) => title_without_badges(el),
                        None => a.text().collect::<Vec<_>>().join(" ").trim().to_string(),
                    };
                    let locations = a
                        .select(&LOCATION_SELECTOR)
                        .next()
                        .map(|el| {
                            split_locations(&el.text().collect::<Vec<_>>().join(" "))
                        })
                        .unwrap_or_default();
                    let abs = absolutize(href, &list_url)?;
                    Some((title, canonical_job_url(abs.as_str()), locations))
                })
                .collect()
        };

        let mut jobs = Vec::new();
        for (title, link, locations) in rows {
            if !any_fuzzy_match(&locations, &self.location_terms, self.max_edit_distance) {
                continue;
            }
            if !title.is_empty() {
                jobs.push(Posting::new(title, link));
            }
        }
        Ok(jobs)
    }
}

impl AtsAdapter for ProtonAdapter {
    fn pattern(&self) -> &Regex {
        &PROTON_HOST_RE
    }

    fn name(&self) -> &'static str {
        "proton"
    }

    fn renders(&self) -> bool {
        true
    }

    fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
        if !PROTON_HOST_RE.is_match(&host) {
            return false;
        }
        let path = parsed.path().trim_end_matches('/');
        path == LIST_PATH || parsed.path().starts_with("/proton/")
    }

    fn scrape<'a>(
        &'a self,
        cx: &'a AdapterContext,
        url: &'a str,
        timeout: Duration,
        _max_pages: usize,
    ) -> BoxFuture<'a, Result<Vec<Posting>, ScrapeError>> {
        Box::pin(self.scrape_impl(cx, url, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_handles_swaps_and_caps() {
        assert_eq!(damerau_levenshtein_capped("geneva", "geneva", 2), 0);
        assert_eq!(damerau_levenshtein_capped("geneva", "genvea", 2), 1);
        assert_eq!(damerau_levenshtein_capped("zurich", "zurch", 2), 1);
        assert!(damerau_levenshtein_capped("geneva", "taipei", 2) > 2);
    }

    #[test]
    fn fuzzy_match_is_accent_insensitive() {
        let candidates = vec!["Zürich".to_string()];
        let terms = vec!["Zurich".to_string()];
        assert!(any_fuzzy_match(&candidates, &terms, 2));
    }

    #[test]
    fn no_terms_accepts_everything() {
        assert!(any_fuzzy_match(&["Taipei".to_string()], &[], 2));
    }

    #[test]
    fn location_splitting() {
        assert_eq!(
            split_locations("Geneva; Taipei; Paris; "),
            vec!["Geneva", "Taipei", "Paris"]
        );
    }
}
