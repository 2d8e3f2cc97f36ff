//! Extractor pipeline behaviour against representative HTML shapes.

use boardwatch::scrape::extract::{
    extract_all, extract_anchor_jobs_strict, extract_jsonld_jobs, extract_listitem_jobs,
    extract_repeated_block_jobs,
};
use scraper::Html;
use url::Url;

fn base() -> Url {
    Url::parse("https://acme.test/careers").unwrap()
}

#[test]
fn jsonld_job_postings_are_extracted() {
    let html = r##"<html><head>
    <script type="application/ld+json">
    {
      "@context": "https://schema.org",
      "@graph": [
        {"@type": "JobPosting", "title": "Rust Engineer",
         "url": "/jobs/results/123456"},
        {"@type": "Organization", "name": "Acme"}
      ]
    }
    </script>
    <script type="application/ld+json">not even json</script>
    </head><body></body></html>"##;

    let jobs = extract_jsonld_jobs(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "Rust Engineer");
    assert_eq!(jobs[0].link, "https://acme.test/jobs/results/123456");
}

#[test]
fn jsonld_accepts_type_arrays_and_main_entity() {
    let html = r##"<script type="application/ld+json">
    {"mainEntity": {"@type": ["JobPosting", "Thing"], "name": "Zig Engineer",
     "applicationUrl": "https://acme.test/jobs/results/777777"}}
    </script>"##;
    let jobs = extract_jsonld_jobs(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "Zig Engineer");
}

#[test]
fn labelled_lists_yield_jobs_with_heading_titles() {
    let html = r#"<ul aria-label="Open positions">
      <li><h3>Backend Engineer</h3><a href="/careers/platform/101">view</a></li>
      <li><h3>Data Engineer</h3><a href="/careers/data/102">view</a></li>
      <li><h3>Backend Engineer</h3><a href="/careers/platform/101">view</a></li>
    </ul>"#;
    let jobs = extract_listitem_jobs(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 2, "dedup by canonical link");
    assert_eq!(jobs[0].title, "Backend Engineer");
    assert_eq!(jobs[0].link, "https://acme.test/careers/platform/101");
}

#[test]
fn workday_marker_anchors_make_a_job_list() {
    let html = r#"<ul>
      <li><a data-automation-id="jobTitle" href="/jobs/results/201">Engineer One</a></li>
      <li><a data-automation-id="jobTitle" href="/jobs/results/202">Engineer Two</a></li>
    </ul>"#;
    let jobs = extract_listitem_jobs(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].title, "Engineer Two");
}

#[test]
fn repeated_blocks_are_harvested_document_wide() {
    let html = r#"<div>
      <div class="job-card"><h4>Engineer A</h4><a href="/positions/301">go</a></div>
      <div class="job-card"><h4>Engineer B</h4><a href="/positions/302">go</a></div>
      <div class="job-card"><h4>Engineer C</h4><a href="/positions/303">go</a></div>
    </div>
    <aside><div class="job-card"><h4>Engineer D</h4><a href="/positions/304">go</a></div></aside>"#;
    let jobs = extract_repeated_block_jobs(&Html::parse_document(html), &base());
    let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
    assert!(titles.contains(&"Engineer A"));
    assert!(titles.contains(&"Engineer D"), "prototype matches outside its container");
    assert_eq!(jobs.len(), 4);
}

#[test]
fn generic_class_groups_are_not_prototypes() {
    let html = r#"<div>
      <div class="row"><a href="/positions/311"><h4>Engineer A</h4></a></div>
      <div class="row"><a href="/positions/312"><h4>Engineer B</h4></a></div>
      <div class="row"><a href="/positions/313"><h4>Engineer C</h4></a></div>
    </div>"#;
    let jobs = extract_repeated_block_jobs(&Html::parse_document(html), &base());
    assert!(jobs.is_empty());
}

#[test]
fn strict_anchors_require_markers_details_or_headings() {
    let html = r#"
      <a href="/jobs/results/401"><h2>Platform Engineer</h2></a>
      <a href="/about"><h2>Apply Now</h2></a>
      <a href="/misc">plain link</a>
      <a data-automation-id="jobTitle" href="/jobs/results/402">SRE</a>
    "#;
    let jobs = extract_anchor_jobs_strict(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].title, "Platform Engineer");
    assert_eq!(jobs[1].title, "SRE");
}

#[test]
fn pipeline_prefers_structured_metadata() {
    let html = r##"<html><head>
    <script type="application/ld+json">
    {"@type": "JobPosting", "title": "From JSON-LD", "url": "/jobs/results/501"}
    </script></head>
    <body>
      <ul aria-label="jobs">
        <li><h3>From List</h3><a href="/jobs/results/502">view</a></li>
        <li><h3>Also From List</h3><a href="/jobs/results/503">view</a></li>
      </ul>
    </body></html>"##;
    let jobs = extract_all(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "From JSON-LD");
}

#[test]
fn pipeline_falls_through_to_lower_strategies() {
    let html = r#"<body>
      <a href="/jobs/results/601"><h2>Fallback Engineer</h2></a>
    </body>"#;
    let jobs = extract_all(&Html::parse_document(html), &base());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "Fallback Engineer");
}

#[test]
fn pipeline_returns_empty_for_contentless_pages() {
    let html = "<html><body><p>Nothing to see.</p></body></html>";
    assert!(extract_all(&Html::parse_document(html), &base()).is_empty());
}
