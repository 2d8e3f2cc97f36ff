//! Scrape engine end-to-end over a mock HTTP server: pagination with
//! cross-page dedup, uniform error reduction, and partial-result handling.

use std::sync::Arc;

use boardwatch::scrape::{ScrapeEngine, ScrapeOptions};
use boardwatch::{HttpClient, Renderer};

fn engine() -> ScrapeEngine {
    ScrapeEngine::new(Arc::new(HttpClient::new().unwrap()), Arc::new(Renderer::new()))
}

/// Listing page: plenty of static markup (so the JS-shell detector stays
/// quiet), ten detail anchors, and optionally a pager link.
fn listing_page(ids: std::ops::Range<u32>, next_href: Option<&str>) -> String {
    let items: String = ids
        .map(|i| {
            format!(
                "<li><h3>Engineer {i}</h3><a href=\"/jobs/results/{i}\">view</a></li>"
            )
        })
        .collect();
    let pager = next_href
        .map(|href| format!("<a rel=\"next\" href=\"{href}\">Next</a>"))
        .unwrap_or_default();
    format!(
        "<html><body><h1>Open roles</h1>\
         <p>We are hiring across the board. Join a growing team of engineers \
         building reliable systems for our customers worldwide.</p>\
         <ul aria-label=\"Job openings\">{items}</ul>{pager}</body></html>"
    )
}

#[tokio::test]
async fn paginates_via_query_param_and_dedups_across_pages() {
    let mut server = mockito::Server::new_async().await;

    // page=1 normalises away, so the first fetch hits the bare path.
    let first = server
        .mock("GET", "/careers")
        .with_status(200)
        .with_body(listing_page(0..10, Some("/careers?page=2")))
        .create_async()
        .await;
    // Second page repeats one job (id 9) and has no pager.
    let second = server
        .mock("GET", "/careers?page=2")
        .with_status(200)
        .with_body(listing_page(9..20, None))
        .create_async()
        .await;

    let outcome = engine()
        .scrape(
            &format!("{}/careers?page=1", server.url()),
            &ScrapeOptions::default(),
        )
        .await;

    first.assert_async().await;
    second.assert_async().await;

    assert!(outcome.ok);
    assert_eq!(outcome.meta.attempted_pages, 2);
    assert_eq!(outcome.meta.rendered_pages, 0);
    assert_eq!(outcome.meta.renderer_used, Some(false));
    assert_eq!(outcome.meta.ats_adapter, None);
    assert_eq!(outcome.postings.len(), 20, "<= 20 unique links across pages");

    let unique: std::collections::HashSet<&str> =
        outcome.postings.iter().map(|p| p.link.as_str()).collect();
    assert_eq!(unique.len(), outcome.postings.len());
}

#[tokio::test]
async fn complete_failure_reduces_to_error_kind() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/careers")
        .with_status(500)
        .create_async()
        .await;

    let outcome = engine()
        .scrape(&format!("{}/careers", server.url()), &ScrapeOptions::default())
        .await;

    assert!(!outcome.ok);
    assert!(outcome.postings.is_empty());
    assert_eq!(outcome.error_kind, Some("http_status"));
}

#[tokio::test]
async fn partial_harvest_stays_ok() {
    let mut server = mockito::Server::new_async().await;
    let _first = server
        .mock("GET", "/careers")
        .with_status(200)
        .with_body(listing_page(0..10, Some("/careers?page=2")))
        .create_async()
        .await;
    let _second = server
        .mock("GET", "/careers?page=2")
        .with_status(500)
        .create_async()
        .await;

    let outcome = engine()
        .scrape(&format!("{}/careers", server.url()), &ScrapeOptions::default())
        .await;

    // The failing second page ends the loop but keeps page one's harvest.
    assert!(outcome.ok);
    assert_eq!(outcome.postings.len(), 10);
    assert_eq!(outcome.error_kind, None);
}

#[tokio::test]
async fn empty_but_successful_page_is_ok_with_zero_count() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/careers")
        .with_status(200)
        .with_body(
            "<html><body><h1>Careers</h1><p>No openings right now, check back \
             soon. We keep this page updated as roles open across teams and \
             locations, so bookmarking it is the quickest way to hear first.</p>\
             <p>Thanks for your interest in joining us.</p></body></html>",
        )
        .create_async()
        .await;

    let outcome = engine()
        .scrape(&format!("{}/careers", server.url()), &ScrapeOptions::default())
        .await;

    assert!(outcome.ok);
    assert!(outcome.postings.is_empty());
    assert_eq!(outcome.error_kind, None);
}

#[tokio::test]
async fn revisiting_a_normalized_url_ends_the_loop() {
    let mut server = mockito::Server::new_async().await;
    // The pager points back at page 1 (which normalises to the URL already
    // visited), so the loop must stop after one fetch.
    let mock = server
        .mock("GET", "/careers")
        .with_status(200)
        .with_body(listing_page(0..5, Some("/careers?page=1")))
        .expect(1)
        .create_async()
        .await;

    let outcome = engine()
        .scrape(&format!("{}/careers", server.url()), &ScrapeOptions::default())
        .await;

    mock.assert_async().await;
    assert_eq!(outcome.meta.attempted_pages, 1);
    assert_eq!(outcome.postings.len(), 5);
}
