//! Lever adapter: vendor JSON API with facet pass-through and regional
//! host fallback (US ↔ EU).

use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::http::JsonBody;

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref LEVER_HOST_RE: Regex =
        Regex::new(r"(?i)^(?:www\.)?jobs(?:\.eu)?\.lever\.co(?::\d+)?$").expect("static regex");
}

/// UI filters Lever's API accepts verbatim; repeated values are ORed.
const ALLOWED_FILTERS: &[&str] = &["location", "department", "team", "commitment", "level"];

const PAGE_LIMIT: usize = 50;

fn api_host_for(netloc: &str) -> &'static str {
    if netloc.to_ascii_lowercase().ends_with("jobs.eu.lever.co") {
        "api.eu.lever.co"
    } else {
        "api.lever.co"
    }
}

fn alt_host(base: &str) -> &'static str {
    if base.starts_with("api.eu.") {
        "api.lever.co"
    } else {
        "api.eu.lever.co"
    }
}

/// UI filters from the board URL, in whitelist-accepted form.
pub(crate) fn collect_filter_params(board_url: &Url) -> Vec<(String, String)> {
    board_url
        .query_pairs()
        .filter(|(k, v)| ALLOWED_FILTERS.contains(&k.as_ref()) && !v.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn posting_link(posting: &Value, site: &str) -> Option<String> {
    let direct = posting
        .get("hostedUrl")
        .or_else(|| posting.get("applyUrl"))
        .and_then(Value::as_str);
    if let Some(link) = direct {
        return Some(link.to_string());
    }
    posting
        .get("id")
        .and_then(Value::as_str)
        .map(|id| format!("https://jobs.lever.co/{site}/{id}"))
}

fn collect_postings(data: &Value, site: &str, out: &mut Vec<Posting>) {
    let postings = match data {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    for p in postings {
        let title = p.get("text").and_then(Value::as_str).unwrap_or("").trim();
        let Some(link) = posting_link(p, site) else {
            continue;
        };
        if !title.is_empty() {
            out.push(Posting::new(title, link));
        }
    }
}

fn postings_len(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0),
        _ => 0,
    }
}

pub struct LeverAdapter;

impl LeverAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        _timeout: Duration,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let netloc = parsed.host_str().unwrap_or("");
        let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
        let Some(site) = segments.first() else {
            return Ok(Vec::new());
        };
        let posting_id = segments.get(1);

        let base_host = api_host_for(netloc);
        let hosts = [base_host, alt_host(base_host)];

        let mut jobs = Vec::new();

        // A detail URL fetches just that posting, trying both regions.
        if let Some(id) = posting_id {
            for host in hosts {
                let api_url = format!("https://{host}/v0/postings/{site}/{id}");
                match cx.http.fetch_json(&api_url, JsonBody::Get).await {
                    Ok(data) => {
                        let title = data.get("text").and_then(Value::as_str).unwrap_or("").trim();
                        let link = data.get("hostedUrl").and_then(Value::as_str);
                        if let Some(link) = link
                            && !title.is_empty()
                        {
                            jobs.push(Posting::new(title, link));
                        }
                        return Ok(jobs);
                    }
                    Err(e) => {
                        debug!(host, error = %e, "lever posting lookup failed");
                        continue;
                    }
                }
            }
            return Ok(jobs);
        }

        // Listing: page with skip/limit, passing UI filters through.
        let filters = collect_filter_params(&parsed);

        let mut skip = 0usize;
        let mut pages_fetched = 0usize;
        let mut host_idx = 0usize;

        while pages_fetched < max_pages {
            let mut api_url = Url::parse(&format!(
                "https://{}/v0/postings/{site}",
                hosts[host_idx]
            ))
            .map_err(|e| ScrapeError::Ats(e.to_string()))?;
            {
                let mut qp = api_url.query_pairs_mut();
                qp.append_pair("mode", "json");
                for (k, v) in &filters {
                    qp.append_pair(k, v);
                }
                qp.append_pair("skip", &skip.to_string());
                qp.append_pair("limit", &PAGE_LIMIT.to_string());
            }

            match cx.http.fetch_json(api_url.as_str(), JsonBody::Get).await {
                Ok(data) => {
                    let page_len = postings_len(&data);
                    if page_len == 0 {
                        break;
                    }
                    collect_postings(&data, site, &mut jobs);
                    pages_fetched += 1;
                    if page_len < PAGE_LIMIT {
                        break;
                    }
                    skip += PAGE_LIMIT;
                }
                Err(ScrapeError::HttpStatus(404)) if host_idx == 0 => {
                    // Wrong region: flip once and continue there.
                    host_idx = 1;
                }
                Err(e) => {
                    if host_idx == 0 {
                        debug!(error = %e, "lever page failed; flipping region");
                        host_idx = 1;
                        continue;
                    }
                    break;
                }
            }
        }

        Ok(jobs)
    }
}

impl AtsAdapter for LeverAdapter {
    fn pattern(&self) -> &Regex {
        &LEVER_HOST_RE
    }

    fn name(&self) -> &'static str {
        "lever"
    }

    fn renders(&self) -> bool {
        false
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
    fn matches_lever_hosts_only() {
        let adapter = LeverAdapter;
        assert!(adapter.matches("https://jobs.lever.co/acme?location=Zurich"));
        assert!(adapter.matches("https://jobs.eu.lever.co/acme"));
        assert!(!adapter.matches("https://careers.example.com/jobs"));
    }

    #[test]
    fn regional_host_mapping() {
        assert_eq!(api_host_for("jobs.eu.lever.co"), "api.eu.lever.co");
        assert_eq!(api_host_for("jobs.lever.co"), "api.lever.co");
        assert_eq!(alt_host("api.eu.lever.co"), "api.lever.co");
        assert_eq!(alt_host("api.lever.co"), "api.eu.lever.co");
    }

    #[test]
    fn ui_filters_pass_through_whitelist() {
        let url =
            Url::parse("https://jobs.lever.co/acme?location=Zurich&team=Core&evil=x&level=")
                .unwrap();
        let filters = collect_filter_params(&url);
        assert!(filters.contains(&("location".to_string(), "Zurich".to_string())));
        assert!(filters.contains(&("team".to_string(), "Core".to_string())));
        assert_eq!(filters.len(), 2);
    }
}
