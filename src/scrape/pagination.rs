//! Next-listing-page discovery.
//!
//! Prefers an explicit next link in the DOM; otherwise constructs one by
//! incrementing a known paging query parameter, stopping at whatever
//! total-pages value the page exposes.

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::url::absolutize;

lazy_static! {
    static ref NEXT_LABEL_RE: Regex =
        Regex::new(r"(?i)\b(next|go to next page|weiter|suivant|siguiente)\b")
            .expect("static regex");
    static ref RESULTS_WINDOW_RE: Regex = Regex::new(
        r"(?i)(\d+)\s*[\u{2010}\u{2011}\u{2012}\u{2013}\-]\s*(\d+)\s*of\s*(\d+)"
    )
    .expect("static regex");
    static ref PAGE_LABEL_RE: Regex = Regex::new(r"(?i)page\s+(\d+)").expect("static regex");
    static ref ANY_PARAM_RE: Regex = Regex::new(r"[?&](\w+)=\d+\b").expect("static regex");
}

/// Alternatives to `page` seen in the wild.
const ALT_PAGE_KEYS: &[&str] = &["p", "pg", "pageNo", "pageNumber", "currentPage"];
const OFFSET_KEYS: &[&str] = &["start", "offset", "from", "startrow"];

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static ARIA_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[aria-label][href]").expect("static selector"));
// Button-wrapped pager anchors: any anchor under a next-marked container,
// plus label-constrained anchors in the Google-style widget.
static ANALYTICS_NEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-analytics-pagination=\"next\"] a[href]").expect("static selector")
});
static WIDGET_PAGER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".VfPpkd-wZVHld-gruSEe a[href]").expect("static selector"));
static NAV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("nav[aria-label]").expect("static selector"));
static PAGINATION_CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul.pagination a[aria-label][href], .pagination a[aria-label][href]")
        .expect("static selector")
});
static PAGE_INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("input[data-autom=\"paginationPageInput\"], input.rc-pagination-pageinput")
        .expect("static selector")
});
static TOTAL_PAGES_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".rc-pagination-total-pages").expect("static selector"));
static ARIA_LIVE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[aria-live]").expect("static selector"));

fn anchor_disabled(a: ElementRef<'_>) -> bool {
    let aria_disabled = a.value().attr("aria-disabled").unwrap_or("");
    if matches!(aria_disabled.to_ascii_lowercase().as_str(), "true" | "1") {
        return true;
    }
    a.value().classes().any(|c| c == "disabled")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Parse a "1-20 of 25" results window into (page size, total results).
fn parse_results_window(doc: &Html) -> (Option<u32>, Option<u32>) {
    for node in doc.root_element().text() {
        let s = node.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(caps) = RESULTS_WINDOW_RE.captures(&s) {
            let start: u32 = caps[1].parse().unwrap_or(0);
            let end: u32 = caps[2].parse().unwrap_or(0);
            let total: u32 = caps[3].parse().unwrap_or(0);
            let pagesize = if end >= start { Some(end - start + 1) } else { None };
            return (pagesize, Some(total));
        }
    }
    (None, None)
}

fn current_page_from_dom(doc: &Html) -> Option<u32> {
    if let Some(input) = doc.select(&PAGE_INPUT_SELECTOR).next()
        && let Some(value) = input.value().attr("value")
        && let Ok(page) = value.trim().parse()
    {
        return Some(page);
    }
    for el in doc.select(&ARIA_LIVE_SELECTOR) {
        if let Some(caps) = PAGE_LABEL_RE.captures(&element_text(el)) {
            return caps[1].parse().ok();
        }
    }
    None
}

fn total_pages_from_dom(doc: &Html) -> Option<u32> {
    let el = doc.select(&TOTAL_PAGES_SELECTOR).next()?;
    element_text(el).replace(',', "").parse().ok()
}

/// Find an explicit next-page href in the DOM, if one exists.
fn find_next_href_direct(doc: &Html, current_page: Option<u32>) -> Option<String> {
    // rel="next"
    for a in doc.select(&ANCHOR_SELECTOR) {
        if let Some(rel) = a.value().attr("rel")
            && rel.to_ascii_lowercase().contains("next")
        {
            return a.value().attr("href").map(str::to_owned);
        }
    }

    // aria-label mentioning "next" in any supported locale, not disabled
    for a in doc.select(&ARIA_ANCHOR_SELECTOR) {
        let label = a.value().attr("aria-label").unwrap_or("");
        if NEXT_LABEL_RE.is_match(label) && !anchor_disabled(a) {
            return a.value().attr("href").map(str::to_owned);
        }
    }

    // Known button-wrapped pager anchors. The analytics-marked container is
    // trusted as-is; the widget anchors need "next" in their aria-label.
    if let Some(a) = doc.select(&ANALYTICS_NEXT_SELECTOR).next() {
        return a.value().attr("href").map(str::to_owned);
    }
    for a in doc.select(&WIDGET_PAGER_SELECTOR) {
        let label = a.value().attr("aria-label").unwrap_or("");
        if label.to_ascii_lowercase().contains("next") {
            return a.value().attr("href").map(str::to_owned);
        }
    }

    // Generic pager nav
    for nav in doc.select(&NAV_SELECTOR) {
        let label = nav.value().attr("aria-label").unwrap_or("").to_ascii_lowercase();
        if !label.contains("pagination") {
            continue;
        }
        for a in nav.select(&ANCHOR_SELECTOR) {
            let rel = a.value().attr("rel").unwrap_or("").to_ascii_lowercase();
            let aria = a.value().attr("aria-label").unwrap_or("").to_ascii_lowercase();
            if rel.contains("next") || aria.contains("next") {
                return a.value().attr("href").map(str::to_owned);
            }
        }
    }

    // Last resort: lowest ?page=k (or variant) above the current page in
    // pager anchors.
    let mut keys = vec!["page"];
    keys.extend_from_slice(ALT_PAGE_KEYS);
    let key_patterns: Vec<Regex> = keys
        .iter()
        .map(|key| {
            Regex::new(&format!(r"[?&]{}=(\d+)\b", regex::escape(key))).expect("escaped key regex")
        })
        .collect();
    let mut candidates: Vec<(u32, String)> = Vec::new();

    let mut pager_anchors: Vec<ElementRef<'_>> = Vec::new();
    for nav in doc.select(&NAV_SELECTOR) {
        let label = nav.value().attr("aria-label").unwrap_or("").to_ascii_lowercase();
        if label.contains("pagination") {
            pager_anchors.extend(nav.select(&ARIA_ANCHOR_SELECTOR));
        }
    }
    pager_anchors.extend(doc.select(&PAGINATION_CONTAINER_SELECTOR));

    for a in pager_anchors {
        let href = a.value().attr("href").unwrap_or("");
        for re in &key_patterns {
            if let Some(caps) = re.captures(href) {
                let k: u32 = match caps[1].parse() {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if current_page.is_none_or(|cur| k > cur) {
                    candidates.push((k, href.to_string()));
                }
                break;
            }
        }
    }
    candidates.sort();
    candidates.into_iter().next().map(|(_, href)| href)
}

/// Replace (or append) one query parameter, leaving the rest intact.
fn update_query_param(url: &Url, key: &str, value: u32) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (k, v) in url.query_pairs() {
        // Repeated keys collapse to the final value, like browsers do.
        match pairs.iter_mut().find(|(pk, _)| pk.as_str() == k.as_ref()) {
            Some(existing) => existing.1 = v.into_owned(),
            None => pairs.push((k.into_owned(), v.into_owned())),
        }
    }
    match pairs.iter_mut().find(|(pk, _)| pk.as_str() == key) {
        Some(existing) => existing.1 = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }

    let mut out = url.clone();
    {
        let mut serializer = out.query_pairs_mut();
        serializer.clear();
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
    }
    out.to_string()
}

/// Return the absolute URL of the next results page, or `None` when the end
/// of pagination is reached (or nothing discoverable exists).
pub fn discover_next_page_url(doc: &Html, base_url: &str, current_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;

    let current_page = current_page_from_dom(doc);
    if let Some(href) = find_next_href_direct(doc, current_page)
        && let Some(resolved) = absolutize(&href, &base)
    {
        return Some(resolved.to_string());
    }

    let total_pages = total_pages_from_dom(doc);
    let current = Url::parse(current_url).ok()?;
    let query: Vec<(String, String)> = current
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let get = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

    // ?page=N and its common aliases: increment
    let mut page_keys = vec!["page"];
    page_keys.extend_from_slice(ALT_PAGE_KEYS);
    for key in page_keys {
        if let Some(value) = get(key) {
            if let Ok(cur) = value.parse::<u32>() {
                let next = cur + 1;
                if total_pages.is_some_and(|t| next > t) {
                    return None;
                }
                return Some(update_query_param(&current, key, next));
            }
        }
    }

    // Offset-style params: step by the page size from the results window.
    for key in OFFSET_KEYS {
        if let Some(value) = get(key) {
            let (pagesize, total) = parse_results_window(doc);
            let cur: u32 = value.parse().unwrap_or(0);
            if let Some(step) = pagesize {
                let next = cur + step;
                if total.is_some_and(|t| next >= t) {
                    return None;
                }
                return Some(update_query_param(&current, key, next));
            }
        }
    }

    // DOM exposes current/total: reuse whatever numeric param an anchor shows.
    if let Some(cur) = current_page
        && total_pages.is_none_or(|t| cur < t)
    {
        for a in doc.select(&ANCHOR_SELECTOR) {
            let href = a.value().attr("href").unwrap_or("");
            if let Some(caps) = ANY_PARAM_RE.captures(href) {
                let key = caps[1].to_string();
                return Some(update_query_param(&current, &key, cur + 1));
            }
        }
    }

    None
}
