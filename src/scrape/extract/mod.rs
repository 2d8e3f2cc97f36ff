//! Generic extractor pipeline.
//!
//! Four strategies ordered by signal quality; the first one to produce any
//! postings wins. Each strategy is pure: parsed HTML plus the page URL in,
//! `(title, canonical link)` pairs out, deduplicated by canonical link.

mod anchor;
mod jsonld;
mod listitem;
mod repeated;

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::model::Posting;

pub use anchor::extract_anchor_jobs_strict;
pub use jsonld::extract_jsonld_jobs;
pub use listitem::extract_listitem_jobs;
pub use repeated::extract_repeated_block_jobs;

type Extractor = fn(&Html, &Url) -> Vec<Posting>;

const PIPELINE: &[(&str, Extractor)] = &[
    ("jsonld", extract_jsonld_jobs),
    ("listitem", extract_listitem_jobs),
    ("repeated_blocks", extract_repeated_block_jobs),
    ("anchor_strict", extract_anchor_jobs_strict),
];

/// Run the pipeline and return the first non-empty result.
pub fn extract_all(doc: &Html, base_url: &Url) -> Vec<Posting> {
    for (name, extract) in PIPELINE {
        let postings = extract(doc, base_url);
        if !postings.is_empty() {
            debug!(extractor = name, count = postings.len(), "extractor matched");
            return postings;
        }
    }
    Vec::new()
}
