//! Repeated-block extractor: card grids without list semantics.
//!
//! Finds containers whose direct children repeat a `(tag, class set)` shape
//! at least three times, treats that shape as an item prototype, and then
//! harvests every element in the document matching any prototype.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::Posting;
use crate::scrape::detail::{
    class_key, clean_anchor_text, is_generic_class_key, looks_like_job_detail_url,
    max_heading_text, title_from_attrs,
};
use crate::scrape::url::{absolutize, canonical_job_url};

static CONTAINER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, main, article").expect("static selector"));
static MARKER_ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[data-automation-id=\"jobTitle\"][href]").expect("static selector")
});
static POSTING_TITLE_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.posting-title[href]").expect("static selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

const MIN_CHILDREN: usize = 3;

fn direct_element_children<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap)
}

fn best_anchor<'a>(item: ElementRef<'a>) -> Option<ElementRef<'a>> {
    item.select(&MARKER_ANCHOR_SELECTOR)
        .next()
        .or_else(|| item.select(&POSTING_TITLE_ANCHOR_SELECTOR).next())
        .or_else(|| item.select(&ANCHOR_SELECTOR).next())
}

pub fn extract_repeated_block_jobs(doc: &Html, base_url: &Url) -> Vec<Posting> {
    // Discover item prototypes: (tag, sorted class key) shared by >=3
    // direct children of some container, with a non-generic class key.
    let mut prototypes: HashSet<(String, String)> = HashSet::new();
    for container in doc.select(&CONTAINER_SELECTOR) {
        let mut groups: HashMap<(String, String), usize> = HashMap::new();
        for child in direct_element_children(container) {
            let tag = child.value().name().to_string();
            let key = class_key(child);
            if is_generic_class_key(&key) {
                continue;
            }
            *groups.entry((tag, key)).or_insert(0) += 1;
        }
        for (key, count) in groups {
            if count >= MIN_CHILDREN {
                prototypes.insert(key);
            }
        }
    }

    if prototypes.is_empty() {
        return Vec::new();
    }

    // Harvest every element matching a prototype, document-wide.
    let mut jobs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for item in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        let shape = (item.value().name().to_string(), class_key(item));
        if !prototypes.contains(&shape) {
            continue;
        }

        let Some(anchor) = best_anchor(item) else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(abs) = absolutize(href, base_url) else {
            continue;
        };
        if !looks_like_job_detail_url(abs.as_str()) {
            continue;
        }
        let link = canonical_job_url(abs.as_str());
        if seen.contains(&link) {
            continue;
        }

        let mut title = max_heading_text(item);
        if title.is_empty() {
            title = title_from_attrs(anchor);
        }
        if title.is_empty() {
            title = clean_anchor_text(anchor);
        }
        if title.is_empty() {
            title = max_heading_text(anchor);
        }
        if title.is_empty() {
            continue;
        }

        seen.insert(link.clone());
        jobs.push(Posting::new(title, link));
    }

    jobs
}
