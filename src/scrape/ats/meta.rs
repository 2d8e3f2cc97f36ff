//! Meta Careers adapter. The board is a heavily scripted SPA on
//! `metacareers.com` / `facebookcareers.com`: a warm-up visit obtains the
//! consent cookie, the listing is paged by clicking "Next" while watching
//! the "Page X of Y" label, and titles come from each detail page.
//!
//! Set `BOARDWATCH_META_DEBUG=1` (read at startup) to raise this module's
//! log verbosity; it changes nothing else.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::page::Page;
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::render::{dismiss_consent, settle, wait_for_selector, RenderSession};

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref META_HOST_RE: Regex =
        Regex::new(r"(?i)(?:^|\.)metacareers\.com$|(?:^|\.)facebookcareers\.com$")
            .expect("static regex");
    static ref PAGE_OF_RE: Regex =
        Regex::new(r"(?i)Page\s+(\d+)\s+of\s+(\d+)").expect("static regex");
}

const PER_PAGE_SCROLLS: usize = 6;

/// Readiness markers: detail anchors or the pagination label.
const READY_SELECTORS: &[&str] = &[
    "a[href^='/jobs/']",
    "a[href*='metacareers.com/jobs/']",
    "a[href*='facebookcareers.com/jobs/']",
];

const COLLECT_URLS_JS: &str = r#"
(() => Array.from(new Set(
  Array.from(document.querySelectorAll(
    "a[href^='/jobs/'], a[href*='metacareers.com/jobs/'], a[href*='facebookcareers.com/jobs/']"
  ))
  .map(a => a.getAttribute('href') || '')
  .map(h => h.startsWith('http') ? h : new URL(h, location.origin).toString())
  .filter(u => /\/jobs\/[^/?#]+$/.test(u))
)))()
"#;

const PAGINATION_TEXT_JS: &str = r#"
(() => {
  const el = Array.from(document.querySelectorAll('div'))
    .find(d => /Page\s+\d+\s+of\s+\d+/i.test(d.innerText || ''));
  return el ? (el.innerText || '').trim() : '';
})()
"#;

const CLICK_NEXT_JS: &str = r#"
(() => {
  const btn = Array.from(document.querySelectorAll('a'))
    .find(a => (a.innerText || '').trim() === 'Next');
  if (!btn) return false;
  const aria = btn.getAttribute('aria-disabled');
  if (aria === 'true' || aria === 'disabled') return false;
  btn.click();
  return true;
})()
"#;

const CLICK_VIEW_JOBS_JS: &str = r#"
(() => {
  const wanted = ['view jobs', 'find jobs'];
  for (const el of document.querySelectorAll('a, button')) {
    const label = (el.innerText || '').trim().toLowerCase();
    if (wanted.includes(label)) { el.click(); return true; }
  }
  return false;
})()
"#;

const CLICK_LOAD_MORE_JS: &str = r#"
(() => {
  const wanted = ['see more', 'load more', 'show more'];
  for (const btn of document.querySelectorAll('button')) {
    const label = (btn.innerText || '').trim().toLowerCase();
    if (wanted.includes(label)) { btn.click(); return true; }
  }
  return false;
})()
"#;

const DETAIL_TITLE_JS: &str = r#"
(() => {
  for (const sel of ["div[class*='_army']", "div._army", "div[role='heading']", 'h1', 'h2']) {
    const el = document.querySelector(sel);
    if (el && (el.innerText || '').trim()) return (el.innerText || '').trim();
  }
  for (const s of document.querySelectorAll("script[type='application/ld+json']")) {
    try {
      const data = JSON.parse(s.innerText);
      const items = Array.isArray(data) ? data : [data];
      for (const it of items) {
        const t = ((it && (it.title || it.name)) || '').trim();
        if (t) return t;
      }
    } catch (e) {}
  }
  const og = document.querySelector("meta[property='og:title']");
  if (og && og.content) return og.content.trim();
  return document.title || '';
})()
"#;

/// Placeholder titles the site serves before hydration finishes.
const PLACEHOLDER_TITLES: &[&str] = &["find your role", "job openings at meta | meta careers"];

fn clean_title(raw: &str) -> String {
    let mut t = raw.trim();
    if let Some(stripped) = t.strip_suffix(" - Meta") {
        t = stripped.trim_end();
    }
    if PLACEHOLDER_TITLES.contains(&t.to_lowercase().as_str()) {
        return String::new();
    }
    t.to_string()
}

async fn eval_bool(page: &Page, js: &str) -> bool {
    match page.evaluate(js).await {
        Ok(result) => result.into_value::<bool>().unwrap_or(false),
        Err(_) => false,
    }
}

async fn eval_string(page: &Page, js: &str) -> String {
    match page.evaluate(js).await {
        Ok(result) => result.into_value::<String>().unwrap_or_default(),
        Err(_) => String::new(),
    }
}

async fn scroll_nudge(page: &Page, pixels: u32) {
    let _ = page
        .evaluate(format!("window.scrollBy(0, {pixels}); true"))
        .await;
}

fn pagination_info(text: &str) -> (Option<u32>, Option<u32>) {
    match PAGE_OF_RE.captures(text) {
        Some(caps) => (caps[1].parse().ok(), caps[2].parse().ok()),
        None => (None, None),
    }
}

async fn collect_job_urls(page: &Page) -> HashSet<String> {
    match page.evaluate(COLLECT_URLS_JS).await {
        Ok(result) => result
            .into_value::<Vec<String>>()
            .map(HashSet::from_iter)
            .unwrap_or_default(),
        Err(_) => HashSet::new(),
    }
}

/// Give the SPA time to render results: one settle, a scroll nudge, then
/// short waits on each readiness marker with scroll retries.
async fn ensure_results_ready(page: &Page) {
    settle(page, Duration::from_secs(8)).await;
    scroll_nudge(page, 2000).await;

    for sel in READY_SELECTORS {
        if wait_for_selector(page, sel, Duration::from_secs(3)).await {
            debug!(selector = *sel, "results ready");
            return;
        }
    }
    if !eval_string(page, PAGINATION_TEXT_JS).await.is_empty() {
        return;
    }

    for _ in 0..2 {
        scroll_nudge(page, 16_000).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        for sel in READY_SELECTORS {
            if wait_for_selector(page, sel, Duration::from_secs(2)).await {
                return;
            }
        }
    }
    debug!("no readiness marker seen; continuing anyway");
}

/// Warm-up: visit the origin (long consent timeout the first time), click
/// through to the jobs view.
async fn warmup(page: &Page, origin: &str) {
    if page.goto(format!("{origin}/")).await.is_err() {
        debug!("warmup navigation failed; continuing");
        return;
    }
    let _ = page.wait_for_navigation().await;
    dismiss_consent(page).await;

    if eval_bool(page, CLICK_VIEW_JOBS_JS).await {
        debug!("warmup: clicked through to jobs view");
        let _ = page.wait_for_navigation().await;
    }

    let on_jobs = page
        .url()
        .await
        .ok()
        .flatten()
        .is_some_and(|u| u.contains("/jobs"));
    if !on_jobs {
        let _ = page.goto(format!("{origin}/jobs")).await;
        let _ = page.wait_for_navigation().await;
    }
}

/// Gather all job URLs across pagination by clicking "Next" and verifying
/// that either the page label or the URL set actually changed.
async fn collect_all_pages(page: &Page, max_pages: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut visited = 0usize;

    loop {
        visited += 1;
        let mut stagnant = 0usize;
        let mut prev_total = seen.len();
        for _ in 0..PER_PAGE_SCROLLS.max(1) {
            seen.extend(collect_job_urls(page).await);
            if seen.len() == prev_total {
                stagnant += 1;
            } else {
                stagnant = 0;
                prev_total = seen.len();
            }
            if stagnant >= 2 {
                break;
            }
            let _ = eval_bool(page, CLICK_LOAD_MORE_JS).await;
            scroll_nudge(page, 16_000).await;
            tokio::time::sleep(Duration::from_millis(350)).await;
        }

        let label = eval_string(page, PAGINATION_TEXT_JS).await;
        let (current, total) = pagination_info(&label);
        debug!(page = visited, total_urls = seen.len(), label = %label, "page gathered");

        let Some(total) = total else { break };
        if current.is_some_and(|cur| cur >= total) {
            break;
        }
        if visited >= max_pages {
            debug!(max_pages, "page budget reached");
            break;
        }

        let before_label = label;
        let before_urls = seen.clone();
        if !eval_bool(page, CLICK_NEXT_JS).await {
            debug!("next not clickable; stopping");
            break;
        }
        if !wait_page_change(page, &before_label, &before_urls).await {
            break;
        }
    }

    seen.into_iter().collect()
}

async fn wait_page_change(
    page: &Page,
    before_label: &str,
    before_urls: &HashSet<String>,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(6);
    while tokio::time::Instant::now() < deadline {
        let label = eval_string(page, PAGINATION_TEXT_JS).await;
        if !label.is_empty() && label != before_label {
            return true;
        }
        let urls = collect_job_urls(page).await;
        if urls.difference(before_urls).next().is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    false
}

async fn resolve_detail_title(session: &RenderSession, url: &str) -> String {
    let Ok(page) = session.new_page().await else {
        return String::new();
    };
    let title = if page.goto(url).await.is_ok() {
        let _ = page.wait_for_navigation().await;
        dismiss_consent(&page).await;
        wait_for_selector(
            &page,
            "div[class*='_army'], h1, div[role='heading']",
            Duration::from_secs(15),
        )
        .await;
        clean_title(&eval_string(&page, DETAIL_TITLE_JS).await)
    } else {
        String::new()
    };
    let _ = page.close().await;
    title
}

pub struct MetaCareersAdapter;

impl MetaCareersAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        timeout: Duration,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let origin = format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or("www.metacareers.com")
        );

        let session = cx.renderer.session().await?;
        let result = tokio::time::timeout(
            // Warm-up, listing pages, and per-posting detail visits all share
            // one generous deadline.
            timeout.max(Duration::from_secs(30)) * (max_pages as u32 + 2),
            Self::run(&session, &origin, url, max_pages),
        )
        .await;
        session.close().await;

        match result {
            Ok(jobs) => jobs,
            Err(_) => Err(ScrapeError::RenderTimeout(format!(
                "meta careers scrape of {url} timed out"
            ))),
        }
    }

    async fn run(
        session: &RenderSession,
        origin: &str,
        url: &str,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let page = session.new_page().await?;

        warmup(&page, origin).await;

        page.goto(url)
            .await
            .map_err(|e| ScrapeError::RenderError(format!("goto {url}: {e}")))?;
        let _ = page.wait_for_navigation().await;
        dismiss_consent(&page).await;
        ensure_results_ready(&page).await;

        let mut urls = collect_all_pages(&page, max_pages).await;
        urls.sort();
        info!(count = urls.len(), "meta: unique job urls collected");

        let mut jobs = Vec::new();
        for u in &urls {
            let title = resolve_detail_title(session, u).await;
            debug!(url = u.as_str(), title = title.as_str(), "meta detail resolved");
            if !title.is_empty() {
                jobs.push(Posting::new(title, u.clone()));
            }
        }
        Ok(jobs)
    }
}

impl AtsAdapter for MetaCareersAdapter {
    fn pattern(&self) -> &Regex {
        &META_HOST_RE
    }

    fn name(&self) -> &'static str {
        "metacareers"
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
    fn titles_are_cleaned_of_suffix_and_placeholders() {
        assert_eq!(clean_title("Research Scientist - Meta"), "Research Scientist");
        assert_eq!(clean_title("Find Your Role"), "");
        assert_eq!(clean_title("  Production Engineer  "), "Production Engineer");
    }

    #[test]
    fn pagination_label_parses() {
        assert_eq!(pagination_info("Page 2 of 7"), (Some(2), Some(7)));
        assert_eq!(pagination_info("no pages here"), (None, None));
    }

    #[test]
    fn matches_both_domains() {
        let adapter = MetaCareersAdapter;
        assert!(adapter.matches("https://www.metacareers.com/jobs"));
        assert!(adapter.matches("https://www.facebookcareers.com/jobs"));
        assert!(!adapter.matches("https://careers.microsoft.com/"));
    }
}
