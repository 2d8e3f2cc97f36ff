//! Shared HTTP client.
//!
//! One connection-pooled [`reqwest::Client`] per process, with browser-like
//! default headers, automatic gzip/brotli decompression, and a per-host
//! retry rule for origins that reject richly decorated requests.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::error::ScrapeError;
use super::url::USER_AGENT;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8";
const PICKY_ACCEPT: &str = "text/html,application/xhtml+xml,*/*;q=0.8";
const TOTAL_TIMEOUT: Duration = Duration::from_secs(45);

/// Hosts that are picky about request decoration: no brotli, a plausible
/// Referer, and a single retry with a reduced header set on rejection.
fn host_is_picky(host: &str) -> bool {
    host.ends_with("metacareers.com") || host.ends_with("facebookcareers.com")
}

fn retryable_status(code: u16) -> bool {
    matches!(code, 400 | 403 | 406 | 451)
}

pub enum JsonBody<'a> {
    Get,
    Post(&'a Value),
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, ScrapeError> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TOTAL_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        Ok(Self { inner })
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            "Upgrade-Insecure-Requests",
            HeaderValue::from_static("1"),
        );
        headers
    }

    /// Fetch a page body as text.
    ///
    /// Picky hosts get a conservative first attempt (no brotli, explicit
    /// Referer). A status in the retryable set triggers exactly one retry
    /// with a reduced header set; every other non-2xx surfaces as
    /// [`ScrapeError::HttpStatus`].
    pub async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Network(e.to_string()))?;
        let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
        let origin = format!("{}://{}/", parsed.scheme(), host);

        let mut headers = self.default_headers();
        if host_is_picky(&host) {
            headers.insert(ACCEPT, HeaderValue::from_static(PICKY_ACCEPT));
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
            if let Ok(referer) = HeaderValue::from_str(&origin) {
                headers.insert(REFERER, referer);
            }
        }

        let response = self
            .inner
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| ScrapeError::Network(e.to_string()));
        }

        if !retryable_status(status.as_u16()) {
            return Err(ScrapeError::HttpStatus(status.as_u16()));
        }

        debug!(url, status = status.as_u16(), "retrying with reduced headers");
        let mut retry_headers = HeaderMap::new();
        retry_headers.insert(ACCEPT, HeaderValue::from_static(PICKY_ACCEPT));
        retry_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        retry_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        retry_headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        retry_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        retry_headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        if let Ok(referer) = HeaderValue::from_str(&origin) {
            retry_headers.insert(REFERER, referer);
        }

        let retry = self
            .inner
            .get(url)
            .headers(retry_headers)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        if !retry.status().is_success() {
            return Err(ScrapeError::HttpStatus(retry.status().as_u16()));
        }
        retry
            .text()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))
    }

    /// Fetch and decode a JSON body via GET or POST, ignoring whatever
    /// content type the server claims.
    pub async fn fetch_json(&self, url: &str, body: JsonBody<'_>) -> Result<Value, ScrapeError> {
        let request = match body {
            JsonBody::Get => self.inner.get(url),
            JsonBody::Post(payload) => self.inner.post(url).json(payload),
        };
        let response = request
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ScrapeError::Ats(format!("invalid JSON response: {e}")))
    }
}
