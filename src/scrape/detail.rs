//! Job-detail URL heuristics and shared title-derivation helpers.
//!
//! The predicate is deliberately conservative: a listing or category page
//! mistaken for a detail page pollutes a board's content, while a missed
//! detail page only costs coverage until another extractor finds it.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::ElementRef;
use url::Url;

/// Path segments that strongly indicate a non-detail page.
const BAD_PATH_SEGMENTS: &[&str] = &[
    "saved",
    "alerts",
    "recommendations",
    "dashboard",
    "signin",
    "sign-in",
    "login",
    "help",
    "support",
    "about",
    "privacy",
    "terms",
    "eeo",
    "how-we-hire",
    "legal",
    "saved-jobs",
];

lazy_static! {
    static ref UUID_RE: Regex = Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
    )
    .expect("static regex");

    /// Known ATS hosts; prefer fewer false positives.
    static ref ATS_HOST_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(?:^|\.)jobs\.lever\.co$").expect("static regex"),
        Regex::new(r"(?i)(?:^|\.)boards\.greenhouse\.io$").expect("static regex"),
        Regex::new(r"(?i)(?:^|\.)smartrecruiters\.com$").expect("static regex"),
        Regex::new(r"(?i)(?:^|\.)workable\.com$").expect("static regex"),
        Regex::new(r"(?i)(?:^|\.)jobvite\.com$").expect("static regex"),
        Regex::new(r"(?i)(?:^|\.)ashbyhq\.com$").expect("static regex"),
        // Workday: bare myworkdayjobs.com or <tenant>.wd<nn>.myworkdayjobs.com
        Regex::new(r"(?i)(?:^|\.)(?:[a-z0-9-]+\.wd\d+\.)?myworkdayjobs\.com$")
            .expect("static regex"),
    ];

    /// URL path shapes of actual job detail pages.
    static ref JOB_DETAIL_PATTERNS: Vec<Regex> = vec![
        // Apple-style details/apply with a long numeric id
        Regex::new(r"(?i)(^|/)(?:[a-z]{2}-[a-z]{2}/)?details/\d{6,}(?:-\d+)?(/|$)")
            .expect("static regex"),
        Regex::new(r"(?i)(^|/)(?:app/)?[a-z]{2}-[a-z]{2}/apply/\d{6,}(?:-\d+)?(/|$)")
            .expect("static regex"),
        // Generic numeric ids under common sections
        Regex::new(r"(?i)(^|/)jobs?/results?/\d").expect("static regex"),
        Regex::new(r"(?i)(^|/)careers?/.*/\d").expect("static regex"),
        Regex::new(r"(?i)(^|/)positions?/\d").expect("static regex"),
        Regex::new(r"(?i)(^|/)vacanc(?:y|ies)/\d").expect("static regex"),
        // Req-id slug at the end of the path
        Regex::new(r"(?i)(^|/)job/[^/]+/[^/]+_(?:JR|R|REQ)[-_]?\d{4,}(?:-\d+)?(/|$)")
            .expect("static regex"),
        // Oracle Cloud Recruiting detail pages
        Regex::new(r"(?i)(^|/)(?:[a-z]{2}(?:-[a-z]{2})?/)?sites?/jobsearch/job/\d{4,}(/|$|\?)")
            .expect("static regex"),
        // Workday cxs/wday canonical detail URL
        Regex::new(
            r"(?i)(^|/)wday/(?:jobs|cxs)/[^/]+/[^/]+/job/[^/]+_(?:JR|R|REQ)[-_]?\d{4,}(?:-\d+)?(/|$)"
        )
        .expect("static regex"),
    ];

    static ref JOB_SLUG_RE: Regex = Regex::new(r"/job[s]?/[\w-]{6,}(/|$)").expect("static regex");
    static ref WS_RE: Regex = Regex::new(r"\s+").expect("static regex");
    static ref ARIA_TITLE_RE: Regex =
        Regex::new(r"(?i)^(?:learn more about|view details for)\s+(.+)").expect("static regex");
    static ref CTA_TEXT_RE: Regex =
        Regex::new(r"(?i)^(learn more|help|sign in|bookmark|share|apply)$").expect("static regex");
}

fn host_matches_ats(host: &str) -> bool {
    ATS_HOST_PATTERNS.iter().any(|p| p.is_match(host))
}

/// Heuristic: does this absolute URL look like a job *detail* page?
pub fn looks_like_job_detail_url(raw: &str) -> bool {
    let Ok(parsed) = Url::parse(raw) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };

    let mut path = parsed.path().to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    if JOB_DETAIL_PATTERNS.iter().any(|p| p.is_match(&path)) {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // ATS hosts commonly use /<org>/<uuid> or a numeric id as the leaf.
    if host_matches_ats(host) {
        if segments.len() >= 2
            && let Some(last) = segments.last()
            && (UUID_RE.is_match(last) || last.chars().all(|c| c.is_ascii_digit()))
        {
            return true;
        }
        if segments
            .iter()
            .any(|s| matches!(*s, "job" | "jobs" | "openings"))
        {
            return true;
        }
    }

    // Narrow "job" fallback: a reasonable slug after /job(s)/, excluding
    // known non-detail sections and obvious pagination.
    if path.contains("job") && !raw.to_ascii_lowercase().contains("page=") {
        let bad = segments.iter().any(|s| BAD_PATH_SEGMENTS.contains(s));
        if !bad && JOB_SLUG_RE.is_match(&path) {
            return true;
        }
    }

    false
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_ws(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<Vec<_>>().join(" "))
}

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

fn headings(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.descendants().filter_map(ElementRef::wrap).filter(|d| {
        HEADING_TAGS.contains(&d.value().name())
    })
}

/// Longest heading text inside the element, or empty.
pub fn max_heading_text(el: ElementRef<'_>) -> String {
    headings(el)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .max_by_key(String::len)
        .unwrap_or_default()
}

/// First non-empty heading text by rank (h1 before h2, …), or empty.
pub fn first_heading_by_rank(el: ElementRef<'_>) -> String {
    for tag in HEADING_TAGS {
        for d in el.descendants().filter_map(ElementRef::wrap) {
            if d.value().name() == *tag {
                let t = element_text(d);
                if !t.is_empty() {
                    return t;
                }
            }
        }
    }
    String::new()
}

/// Derive a title from an anchor's aria-label, stripping the common
/// "Learn more about …" / "View details for …" prefixes.
pub fn title_from_aria(el: ElementRef<'_>) -> String {
    let aria = el.value().attr("aria-label").unwrap_or("").trim();
    match ARIA_TITLE_RE.captures(aria) {
        Some(caps) => caps[1].trim().to_string(),
        None => String::new(),
    }
}

/// Anchor text (or title attribute) cleaned of CTA noise.
pub fn clean_anchor_text(el: ElementRef<'_>) -> String {
    let mut text = element_text(el);
    if text.is_empty() {
        text = collapse_ws(el.value().attr("title").unwrap_or(""));
    }
    if CTA_TEXT_RE.is_match(&text) {
        return String::new();
    }
    text
}

/// Title from aria-label or title attributes, with prefix stripping.
pub fn title_from_attrs(el: ElementRef<'_>) -> String {
    for attr in ["aria-label", "title"] {
        let v = el.value().attr(attr).unwrap_or("").trim();
        if !v.is_empty() {
            return match ARIA_TITLE_RE.captures(v) {
                Some(caps) => caps[1].trim().to_string(),
                None => v.to_string(),
            };
        }
    }
    String::new()
}

const GENERIC_CLASS_TOKENS: &[&str] = &[
    "row", "rows", "col", "cols", "container", "grid", "section", "wrapper", "content",
];

/// Sorted, space-joined class list used to group repeated sibling blocks.
pub fn class_key(el: ElementRef<'_>) -> String {
    let mut classes: Vec<&str> = el.value().classes().collect();
    classes.sort_unstable();
    classes.join(" ")
}

pub fn is_generic_class_key(key: &str) -> bool {
    if key.is_empty() {
        return true;
    }
    key.split_whitespace()
        .any(|tok| GENERIC_CLASS_TOKENS.contains(&tok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_urls_match_known_shapes() {
        for url in [
            "https://jobs.apple.com/en-us/details/200554321/senior-engineer",
            "https://example.com/jobs/results/123456",
            "https://example.com/careers/platform/8812",
            "https://example.com/positions/42",
            "https://example.com/vacancy/9001",
            "https://acme.wd5.myworkdayjobs.com/wday/cxs/acme/External/job/Zurich/Engineer_JR-102030",
            "https://careers.oracle.com/sites/jobsearch/job/260123",
        ] {
            assert!(looks_like_job_detail_url(url), "expected detail: {url}");
        }
    }

    #[test]
    fn ats_hosts_accept_uuid_and_numeric_leaves() {
        assert!(looks_like_job_detail_url(
            "https://jobs.ashbyhq.com/acme/1b9f0675-1a2b-4c3d-9e8f-001122334455"
        ));
        assert!(looks_like_job_detail_url(
            "https://boards.greenhouse.io/acme/jobs/8071417002"
        ));
    }

    #[test]
    fn non_detail_pages_are_rejected() {
        for url in [
            "https://example.com/jobs/saved",
            "https://example.com/careers/login",
            "https://example.com/jobs?page=2",
            "https://example.com/about",
            "mailto:talent@example.com",
        ] {
            assert!(!looks_like_job_detail_url(url), "expected non-detail: {url}");
        }
    }
}
