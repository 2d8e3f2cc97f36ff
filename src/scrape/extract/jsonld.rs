//! Structured-metadata extractor: inline JSON-LD `JobPosting` nodes.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::model::Posting;
use crate::scrape::detail::looks_like_job_detail_url;
use crate::scrape::url::{absolutize, canonical_job_url};

static LDJSON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type=\"application/ld+json\"]").expect("static selector"));

/// Flatten an LD+JSON payload into its dict nodes, following `@graph`,
/// `mainEntity`, and `item` wrappers.
fn collect_nodes<'a>(value: &'a Value, out: &mut Vec<&'a serde_json::Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            out.push(map);
            if let Some(Value::Array(graph)) = map.get("@graph") {
                for node in graph {
                    collect_nodes(node, out);
                }
            }
            if let Some(entity @ Value::Object(_)) = map.get("mainEntity") {
                collect_nodes(entity, out);
            }
            if let Some(item @ Value::Object(_)) = map.get("item") {
                collect_nodes(item, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, out);
            }
        }
        _ => {}
    }
}

fn is_job_posting(node: &serde_json::Map<String, Value>) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn string_field<'a>(node: &'a serde_json::Map<String, Value>, keys: &[&str]) -> &'a str {
    for key in keys {
        if let Some(Value::String(s)) = node.get(*key) {
            let s = s.trim();
            if !s.is_empty() {
                return s;
            }
        }
    }
    ""
}

pub fn extract_jsonld_jobs(doc: &Html, base_url: &Url) -> Vec<Posting> {
    let mut jobs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for tag in doc.select(&LDJSON_SELECTOR) {
        let raw = tag.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        // Minified-but-malformed LD+JSON is common; skip quietly and let the
        // later extractors catch the jobs.
        let Ok(data) = serde_json::from_str::<Value>(raw) else {
            continue;
        };

        let mut nodes = Vec::new();
        collect_nodes(&data, &mut nodes);

        for node in nodes {
            if !is_job_posting(node) {
                continue;
            }
            let title = string_field(node, &["title", "name"]);
            let raw_url = string_field(node, &["url", "applicationUrl"]);
            if title.is_empty() || raw_url.is_empty() {
                continue;
            }
            let Some(abs) = absolutize(raw_url, base_url) else {
                continue;
            };
            if !looks_like_job_detail_url(abs.as_str()) {
                continue;
            }
            let link = canonical_job_url(abs.as_str());
            if seen.insert(link.clone()) {
                jobs.push(Posting::new(title, link));
            }
        }
    }

    jobs
}
