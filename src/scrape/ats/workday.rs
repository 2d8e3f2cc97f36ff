//! Workday adapter: the cxs JSON endpoint behind `myworkdayjobs.com` boards.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use url::Url;

use crate::model::Posting;
use crate::scrape::error::ScrapeError;
use crate::scrape::http::JsonBody;
use crate::scrape::url::{absolutize, canonical_job_url};

use super::{AdapterContext, AtsAdapter};

lazy_static! {
    static ref WORKDAY_HOST_RE: Regex =
        Regex::new(r"(?i)(^|\.)(?:wd\d+\.)?myworkdayjobs\.com$").expect("static regex");
    static ref TENANT_SUBDOMAIN_RE: Regex =
        Regex::new(r"(?i)^([^.]+)\.wd\d+\.myworkdayjobs\.com$").expect("static regex");
    static ref LOCALE_RE: Regex = Regex::new(r"^[a-z]{2}-[A-Z]{2}$").expect("static regex");
}

/// Facet keys forwarded from the board URL to the cxs endpoint.
const FACET_WHITELIST: &[&str] = &[
    "locations",
    "location",
    "locationhierarchy1",
    "locationhierarchy2",
    "locationcity",
    "locationstate",
    "timetype",
    "workersubtype",
    "jobfamilygroup",
    "jobfamily",
    "category",
];

const PAGE_LIMIT: u64 = 20;

/// Recover `(host, tenant, career_site)` from the board URL. Handles
/// `<tenant>.wd<n>.myworkdayjobs.com/[locale/]<site>` subdomain forms and
/// bare `myworkdayjobs.com/[locale/]<tenant>/<site>` path forms.
fn site_parts(url: &Url) -> Option<(String, String, String)> {
    let host = url.host_str()?;
    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();

    let tenant_from_host = TENANT_SUBDOMAIN_RE
        .captures(host)
        .map(|caps| caps[1].to_string());

    let mut i = 0;
    if segments.get(i).is_some_and(|s| LOCALE_RE.is_match(s)) {
        i += 1;
    }

    let (tenant, career_site) = match tenant_from_host {
        Some(tenant) => (tenant, segments.get(i)?.to_string()),
        None => (
            segments.get(i)?.to_string(),
            segments.get(i + 1)?.to_string(),
        ),
    };

    Some((host.to_string(), tenant, career_site))
}

fn applied_facets(url: &Url) -> Map<String, Value> {
    let mut facets: Map<String, Value> = Map::new();
    for (k, v) in url.query_pairs() {
        let key = k.to_ascii_lowercase();
        if v.is_empty() || !FACET_WHITELIST.contains(&key.as_str()) {
            continue;
        }
        facets
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("facet entries are arrays")
            .push(Value::String(v.into_owned()));
    }
    facets
}

pub struct WorkdayAdapter;

impl WorkdayAdapter {
    async fn scrape_impl(
        cx: &AdapterContext,
        url: &str,
        _timeout: Duration,
        max_pages: usize,
    ) -> Result<Vec<Posting>, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let Some((host, tenant, career_site)) = site_parts(&parsed) else {
            return Ok(Vec::new());
        };

        let endpoint = format!("https://{host}/wday/cxs/{tenant}/{career_site}/jobs");
        let base = Url::parse(&format!("https://{host}"))
            .map_err(|e| ScrapeError::Ats(e.to_string()))?;
        let facets = applied_facets(&parsed);

        let mut jobs: Vec<Posting> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut offset: u64 = 0;

        for _ in 0..max_pages {
            let payload = json!({
                "appliedFacets": facets,
                "limit": PAGE_LIMIT,
                "offset": offset,
                "searchText": "",
            });
            let data = cx.http.fetch_json(&endpoint, JsonBody::Post(&payload)).await?;

            let postings = data
                .get("jobPostings")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if postings.is_empty() {
                break;
            }

            for p in &postings {
                let title = p
                    .get("title")
                    .or_else(|| p.get("titleSimple"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                let path = p
                    .get("externalPath")
                    .or_else(|| p.get("canonicalPositionUrl"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                if title.is_empty() || path.is_empty() {
                    continue;
                }
                let Some(abs) = absolutize(path, &base) else {
                    continue;
                };
                let link = canonical_job_url(abs.as_str());
                if seen.insert(link.clone()) {
                    jobs.push(Posting::new(title, link));
                }
            }

            offset += PAGE_LIMIT;
            let total = data
                .get("total")
                .or_else(|| data.get("totalFound"))
                .and_then(Value::as_u64);
            if let Some(total) = total
                && offset >= total
            {
                break;
            }
        }

        Ok(jobs)
    }
}

impl AtsAdapter for WorkdayAdapter {
    fn pattern(&self) -> &Regex {
        &WORKDAY_HOST_RE
    }

    fn name(&self) -> &'static str {
        "workday"
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
    fn recovers_tenant_from_subdomain() {
        let url = Url::parse("https://nvidia.wd5.myworkdayjobs.com/NVIDIAExternalCareerSite").unwrap();
        let (host, tenant, site) = site_parts(&url).unwrap();
        assert_eq!(host, "nvidia.wd5.myworkdayjobs.com");
        assert_eq!(tenant, "nvidia");
        assert_eq!(site, "NVIDIAExternalCareerSite");
    }

    #[test]
    fn recovers_tenant_from_path_with_locale() {
        let url = Url::parse("https://myworkdayjobs.com/en-US/acme/External").unwrap();
        let (_, tenant, site) = site_parts(&url).unwrap();
        assert_eq!(tenant, "acme");
        assert_eq!(site, "External");
    }

    #[test]
    fn facet_whitelist_filters_and_repeats() {
        let url =
            Url::parse("https://acme.wd1.myworkdayjobs.com/Ext?locations=a&locations=b&bogus=x")
                .unwrap();
        let facets = applied_facets(&url);
        assert_eq!(facets.len(), 1);
        assert_eq!(
            facets["locations"],
            serde_json::json!(["a", "b"])
        );
    }
}
