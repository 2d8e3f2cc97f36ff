//! URL canonicalisation.
//!
//! Two idempotent operations: [`canonical_job_url`] strips volatile query
//! parameters from job detail URLs so the canonical link can serve as a
//! stable primary key, and [`normalize_listing_identity`] collapses
//! equivalent listing-page URLs for visited-set dedup within one scrape
//! session.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36";

lazy_static! {
    static ref REPEATED_RESULTS_RE: Regex =
        Regex::new(r"(/jobs/results)(?:/jobs/results)+").expect("static regex");
}

/// Query parameters that must not affect job identity.
const JOB_IGNORE_PARAMS: &[&str] = &[
    // pagination
    "page", "start", "offset",
    // referrals
    "ref", "referral", "src", "source",
    // Greenhouse
    "gh_src", "gh_jid",
    // Google Analytics
    "_gl", "_ga", "_gac",
    // coarse location facets
    "locations", "location", "locationhierarchy1", "locationhierarchy2",
    "locationcity", "locationstate", "lat", "lng",
];

fn is_volatile_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || JOB_IGNORE_PARAMS.contains(&key.as_str())
}

/// Canonicalize a job detail URL:
///   - collapse accidental repeated `/jobs/results/` segments
///   - drop volatile params (utm, referral, pagination, location facets)
///   - sort the remaining params by key, preserving multi-value order
///
/// Unparseable input is returned unchanged.
pub fn canonical_job_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let collapsed = REPEATED_RESULTS_RE.replace_all(url.path(), "$1");
    if collapsed != url.path() {
        let collapsed = collapsed.into_owned();
        url.set_path(&collapsed);
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| !is_volatile_param(k))
        .collect();
    // Stable sort by key keeps repeated values in their original order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        drop(serializer);
    }

    url.to_string()
}

const PAGE_ONE_KEYS: &[&str] = &["page", "pg", "p", "pageNumber"];
const ZERO_OFFSET_KEYS: &[&str] = &["start", "offset", "from", "startrow"];

/// Normalize a listing-page URL for session dedup: drop `page=1`-style and
/// `start=0`-style parameters, sort keys, and encode spaces as `%20`.
pub fn normalize_listing_identity(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    // Group values by key, preserving per-key value order.
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        grouped.entry(k.into_owned()).or_default().push(v.into_owned());
    }

    for key in PAGE_ONE_KEYS {
        if grouped.get(*key).and_then(|vs| vs.last()).map(String::as_str) == Some("1") {
            grouped.remove(*key);
        }
    }
    for key in ZERO_OFFSET_KEYS {
        if grouped.get(*key).and_then(|vs| vs.last()).map(String::as_str) == Some("0") {
            grouped.remove(*key);
        }
    }

    if grouped.is_empty() {
        url.set_query(None);
        return url.to_string();
    }

    // BTreeMap iteration gives the sorted key order; %20 (not '+') for spaces.
    let query = grouped
        .iter()
        .flat_map(|(k, vs)| {
            vs.iter().map(move |v| {
                format!(
                    "{}={}",
                    urlencoding::encode(k),
                    urlencoding::encode(v)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
    url.to_string()
}

/// Resolve a possibly-relative href against a base URL.
pub fn absolutize(href: &str, base: &Url) -> Option<Url> {
    base.join(href).ok()
}

/// Filter out non-HTTP link schemes before they reach the extractors.
pub fn is_http_url(href: &str) -> bool {
    if href.is_empty()
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return false;
    }
    match Url::parse(href) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        // Relative paths are fine; they resolve against the page URL.
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_drops_volatile_params_and_sorts() {
        let url = "https://example.com/jobs/results/123?utm_source=x&b=2&a=1&gh_src=abc";
        assert_eq!(
            canonical_job_url(url),
            "https://example.com/jobs/results/123?a=1&b=2"
        );
    }

    #[test]
    fn canonical_collapses_repeated_results_segments() {
        let url = "https://example.com/jobs/results/jobs/results/123";
        assert_eq!(
            canonical_job_url(url),
            "https://example.com/jobs/results/123"
        );
    }

    #[test]
    fn canonical_is_idempotent() {
        let urls = [
            "https://example.com/jobs/results/123?utm_source=x&b=2&a=1",
            "https://example.com/careers/456?location=Zurich&ref=li",
            "https://example.com/path?q=rust%20engineer&q=zig",
            "https://example.com/openings#team",
        ];
        for u in urls {
            let once = canonical_job_url(u);
            assert_eq!(canonical_job_url(&once), once, "not idempotent for {u}");
        }
    }

    #[test]
    fn listing_identity_drops_first_page_markers() {
        assert_eq!(
            normalize_listing_identity("https://example.com/jobs?page=1&q=rust"),
            "https://example.com/jobs?q=rust"
        );
        assert_eq!(
            normalize_listing_identity("https://example.com/jobs?start=0"),
            "https://example.com/jobs"
        );
        // page=2 is meaningful and must survive
        assert_eq!(
            normalize_listing_identity("https://example.com/jobs?page=2"),
            "https://example.com/jobs?page=2"
        );
    }

    #[test]
    fn listing_identity_encodes_spaces_as_percent20() {
        let normalized =
            normalize_listing_identity("https://example.com/jobs?q=rust engineer");
        assert_eq!(normalized, "https://example.com/jobs?q=rust%20engineer");
        assert_eq!(normalize_listing_identity(&normalized), normalized);
    }

    #[test]
    fn listing_identity_is_idempotent_with_multi_values() {
        let u = "https://example.com/jobs?tag=b&tag=a&page=1";
        let once = normalize_listing_identity(u);
        assert_eq!(normalize_listing_identity(&once), once);
        assert_eq!(once, "https://example.com/jobs?tag=b&tag=a");
    }
}
