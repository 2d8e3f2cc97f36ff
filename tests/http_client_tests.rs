//! HTTP client behaviour against a local mock server: happy path, the
//! reduced-header retry, error surfacing, and content-type-blind JSON.

use boardwatch::scrape::error::ScrapeError;
use boardwatch::scrape::http::{HttpClient, JsonBody};

#[tokio::test]
async fn fetch_text_returns_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/careers")
        .with_status(200)
        .with_body("<html>jobs</html>")
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let body = client
        .fetch_text(&format!("{}/careers", server.url()))
        .await
        .unwrap();
    assert_eq!(body, "<html>jobs</html>");
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_request_retries_once_with_reduced_headers() {
    let mut server = mockito::Server::new_async().await;
    // First request (with the default Accept) is rejected; the retry with
    // the reduced header set succeeds.
    let reject = server
        .mock("GET", "/careers")
        .match_header(
            "accept",
            "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
        )
        .with_status(403)
        .create_async()
        .await;
    let accept = server
        .mock("GET", "/careers")
        .match_header("accept", "text/html,application/xhtml+xml,*/*;q=0.8")
        .match_header("cache-control", "no-cache")
        .with_status(200)
        .with_body("ok now")
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let body = client
        .fetch_text(&format!("{}/careers", server.url()))
        .await
        .unwrap();
    assert_eq!(body, "ok now");
    reject.assert_async().await;
    accept.assert_async().await;
}

#[tokio::test]
async fn non_retryable_status_surfaces_as_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/careers")
        .with_status(500)
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .fetch_text(&format!("{}/careers", server.url()))
        .await
        .unwrap_err();
    match err {
        ScrapeError::HttpStatus(500) => {}
        other => panic!("expected HttpStatus(500), got {other:?}"),
    }
    assert_eq!(err.kind(), "http_status");
}

#[tokio::test]
async fn retry_failure_keeps_the_second_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/careers")
        .with_status(403)
        .expect(2)
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .fetch_text(&format!("{}/careers", server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::HttpStatus(403)));
}

#[tokio::test]
async fn fetch_json_ignores_content_type() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/data")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(r#"{"jobs": [{"title": "Engineer"}]}"#)
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let value = client
        .fetch_json(&format!("{}/data", server.url()), JsonBody::Get)
        .await
        .unwrap();
    assert_eq!(value["jobs"][0]["title"], "Engineer");
}

#[tokio::test]
async fn fetch_json_posts_bodies() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/jobs")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"limit": 20}"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"total": 0, "jobPostings": []}"#)
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let payload = serde_json::json!({"limit": 20, "offset": 0});
    let value = client
        .fetch_json(&format!("{}/jobs", server.url()), JsonBody::Post(&payload))
        .await
        .unwrap();
    assert_eq!(value["total"], 0);
}

#[tokio::test]
async fn malformed_json_is_an_ats_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/data")
        .with_status(200)
        .with_body("<html>definitely not json</html>")
        .create_async()
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .fetch_json(&format!("{}/data", server.url()), JsonBody::Get)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ats_error");
}
