//! List-item extractor: `<ul>`/`<ol>` structures that look like job lists.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::Posting;
use crate::scrape::detail::{
    clean_anchor_text, looks_like_job_detail_url, max_heading_text, title_from_aria,
};
use crate::scrape::url::{absolutize, canonical_job_url};

static LIST_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul, ol").expect("static selector"));
static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li, div[role=\"listitem\"]").expect("static selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static MARKER_ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[data-automation-id=\"jobTitle\"][href]").expect("static selector")
});
static SPAN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span").expect("static selector"));

const LIST_LABEL_HINTS: &[&str] = &["job", "career", "vacan", "opening", "position"];

fn list_is_job_list(list: ElementRef<'_>, base_url: &Url) -> bool {
    let label = list
        .value()
        .attr("aria-label")
        .unwrap_or("")
        .to_ascii_lowercase();
    if LIST_LABEL_HINTS.iter().any(|hint| label.contains(hint)) {
        return true;
    }

    // Workday signature: several jobTitle anchors inside this list.
    if list.select(&MARKER_ANCHOR_SELECTOR).take(2).count() >= 2 {
        return true;
    }

    // Generic fallback: at least two detail-looking anchors.
    let mut count = 0;
    for a in list.select(&ANCHOR_SELECTOR) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(abs) = absolutize(href, base_url) else {
            continue;
        };
        if looks_like_job_detail_url(abs.as_str()) {
            count += 1;
            if count >= 2 {
                return true;
            }
        }
    }
    false
}

fn item_title(item: ElementRef<'_>, anchor: ElementRef<'_>) -> String {
    let mut title = max_heading_text(item);
    if title.is_empty() {
        title = title_from_aria(anchor);
    }
    if title.is_empty() {
        title = clean_anchor_text(anchor);
    }
    if title.is_empty() {
        for other in item.select(&ANCHOR_SELECTOR) {
            let t = {
                let aria = title_from_aria(other);
                if aria.is_empty() { clean_anchor_text(other) } else { aria }
            };
            if !t.trim().is_empty() {
                title = t;
                break;
            }
        }
    }
    if title.is_empty() {
        for span in item.select(&SPAN_SELECTOR) {
            if span.value().classes().any(|c| c.contains("title")) {
                let t = span.text().collect::<String>();
                if !t.trim().is_empty() {
                    title = t.trim().to_string();
                    break;
                }
            }
        }
    }
    title
}

pub fn extract_listitem_jobs(doc: &Html, base_url: &Url) -> Vec<Posting> {
    let mut jobs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let candidate_lists: Vec<ElementRef<'_>> = doc
        .select(&LIST_SELECTOR)
        .filter(|l| list_is_job_list(*l, base_url))
        .collect();

    let items: Vec<ElementRef<'_>> = if candidate_lists.is_empty() {
        doc.select(&ITEM_SELECTOR).collect()
    } else {
        candidate_lists
            .iter()
            .flat_map(|l| l.select(&ITEM_SELECTOR))
            .collect()
    };

    for item in items {
        let mut chosen = item.select(&MARKER_ANCHOR_SELECTOR).next();
        let mut link_abs = chosen
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolutize(href, base_url))
            .map(|u| u.to_string());

        if chosen.is_none() {
            // First anchor that looks like a job detail page.
            for candidate in item.select(&ANCHOR_SELECTOR) {
                let Some(href) = candidate.value().attr("href") else {
                    continue;
                };
                let Some(abs) = absolutize(href, base_url) else {
                    continue;
                };
                if looks_like_job_detail_url(abs.as_str()) {
                    chosen = Some(candidate);
                    link_abs = Some(abs.to_string());
                    break;
                }
            }
        }

        let (Some(anchor), Some(link_abs)) = (chosen, link_abs) else {
            continue;
        };
        let link = canonical_job_url(&link_abs);
        if seen.contains(&link) {
            continue;
        }

        let title = item_title(item, anchor);
        if title.is_empty() {
            continue;
        }

        seen.insert(link.clone());
        jobs.push(Posting::new(title.trim(), link));
    }

    jobs
}
