//! Headless renderer.
//!
//! One Chrome instance per process, launched lazily behind a mutex and
//! relaunched when it goes away. Every render (and every adapter session)
//! runs in a freshly created browser context with no persistent storage,
//! disposed when the render finishes — success or not.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::ScrapeError;
use super::url::USER_AGENT;

/// Wait selector used by the generic flow: broad job-card markers.
pub const GENERIC_WAIT_SELECTOR: &str = "#job-search-app [role=\"listitem\"], \
     [data-automationid=\"jobCard\"], [data-automation-id=\"job-card\"]";

/// URL patterns for heavyweight assets a scrape never needs.
const BLOCKED_ASSET_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico",
    "*.woff", "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3", "*.ogg",
];

/// Consent buttons worth one click before waiting on content.
const CONSENT_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "button[aria-label=\"Accept\"]",
    "#mscc-accept-all",
    "[data-cookiebanner] button",
];

/// Texts matched (case-insensitively) against buttons when no known consent
/// selector is present.
const CONSENT_TEXT_CLICK_JS: &str = r#"
(() => {
  const wanted = ["allow all", "accept all", "accept", "i agree"];
  for (const btn of document.querySelectorAll("button, [role='button']")) {
    const label = (btn.innerText || "").trim().toLowerCase();
    if (wanted.includes(label)) { btn.click(); return true; }
  }
  return false;
})()
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Selector that marks the page as usable.
    pub wait_for: String,
    /// Deadline for the whole render, navigation included.
    pub timeout: Duration,
    /// How long to wait for in-flight XHRs to settle.
    pub settle: Duration,
}

impl RenderOptions {
    pub fn new(wait_for: impl Into<String>, timeout: Duration) -> Self {
        Self {
            wait_for: wait_for.into(),
            timeout,
            settle: Duration::from_secs(6),
        }
    }

    pub fn generic(timeout: Duration) -> Self {
        Self::new(GENERIC_WAIT_SELECTOR, timeout)
    }
}

struct BrowserHandle {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// Process-wide renderer handle. Cheap to share behind an [`Arc`].
pub struct Renderer {
    handle: Mutex<Option<BrowserHandle>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Get the shared browser, launching or relaunching it as needed.
    async fn browser(&self) -> Result<Arc<Browser>, ScrapeError> {
        let mut guard = self.handle.lock().await;

        if let Some(handle) = guard.as_ref() {
            if handle.browser.version().await.is_ok() {
                return Ok(Arc::clone(&handle.browser));
            }
            warn!("headless browser disconnected; relaunching");
            if let Some(stale) = guard.take() {
                stale.handler.abort();
            }
        }

        let handle = launch().await?;
        let browser = Arc::clone(&handle.browser);
        *guard = Some(handle);
        Ok(browser)
    }

    /// Open a fresh ephemeral browsing context for a multi-page session.
    pub async fn session(&self) -> Result<RenderSession, ScrapeError> {
        let browser = self.browser().await?;
        let created = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScrapeError::RenderError(format!("create context: {e}")))?;
        Ok(RenderSession {
            browser,
            context_id: created.result.browser_context_id.clone(),
        })
    }

    /// Navigate to `url`, wait for the page to become usable, and return the
    /// final HTML. Any failure disposes the context and propagates; an
    /// elapsed `wait_for` deadline alone does not fail the render.
    pub async fn fetch_rendered_html(
        &self,
        url: &str,
        opts: &RenderOptions,
    ) -> Result<String, ScrapeError> {
        let session = self.session().await?;
        let result = tokio::time::timeout(opts.timeout, render_in(&session, url, opts)).await;
        session.close().await;
        match result {
            Ok(inner) => inner,
            Err(_) => Err(ScrapeError::RenderTimeout(format!(
                "render of {url} exceeded {:?}",
                opts.timeout
            ))),
        }
    }

    /// Close the browser. Skipped gracefully when sessions are still out.
    pub async fn shutdown(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(mut handle) = guard.take() {
            handle.handler.abort();
            match Arc::get_mut(&mut handle.browser) {
                Some(browser) => {
                    if let Err(e) = browser.close().await {
                        warn!(error = %e, "failed to close browser");
                    }
                    let _ = browser.wait().await;
                }
                None => warn!("browser has outstanding sessions; skipping graceful close"),
            }
        }
    }
}

async fn launch() -> Result<BrowserHandle, ScrapeError> {
    info!("launching headless browser");
    let config = BrowserConfig::builder()
        .window_size(1366, 900)
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--mute-audio")
        .arg("--hide-scrollbars")
        .build()
        .map_err(ScrapeError::RenderError)?;

    let (browser, mut events) = Browser::launch(config)
        .await
        .map_err(|e| ScrapeError::RenderError(format!("launch: {e}")))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = event {
                debug!(error = ?e, "browser event handler error");
            }
        }
        debug!("browser event handler finished");
    });

    Ok(BrowserHandle {
        browser: Arc::new(browser),
        handler,
    })
}

/// An ephemeral browsing context. Pages opened through it share cookies with
/// each other and nothing else; [`RenderSession::close`] disposes everything.
pub struct RenderSession {
    browser: Arc<Browser>,
    context_id: chromiumoxide::cdp::browser_protocol::browser::BrowserContextId,
}

impl RenderSession {
    /// Open a blank page inside this context with the desktop viewport,
    /// locale headers, and asset blocking applied.
    pub async fn new_page(&self) -> Result<Page, ScrapeError> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(ScrapeError::RenderError)?;
        let page = self
            .browser
            .new_page(params)
            .await
            .map_err(|e| ScrapeError::RenderError(format!("new page: {e}")))?;

        page.execute(SetUserAgentOverrideParams {
            user_agent: USER_AGENT.to_string(),
            accept_language: Some("en-US,en;q=0.9".to_string()),
            platform: None,
            user_agent_metadata: None,
        })
        .await
        .map_err(|e| ScrapeError::RenderError(format!("set user agent: {e}")))?;

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(1366)
                .height(900)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(ScrapeError::RenderError)?,
        )
        .await
        .map_err(|e| ScrapeError::RenderError(format!("set viewport: {e}")))?;

        let blocked = BLOCKED_ASSET_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        if let Err(e) = page.execute(SetBlockedUrLsParams::new(blocked)).await {
            debug!(error = %e, "could not install asset blocklist");
        }

        Ok(page)
    }

    pub async fn close(self) {
        let dispose = DisposeBrowserContextParams::new(self.context_id);
        if let Err(e) = self.browser.execute(dispose).await {
            debug!(error = %e, "failed to dispose browser context");
        }
    }
}

async fn render_in(
    session: &RenderSession,
    url: &str,
    opts: &RenderOptions,
) -> Result<String, ScrapeError> {
    let page = session.new_page().await?;

    page.goto(url)
        .await
        .map_err(|e| ScrapeError::RenderError(format!("goto {url}: {e}")))?;
    let _ = page.wait_for_navigation().await;

    dismiss_consent(&page).await;
    settle(&page, opts.settle).await;

    if !wait_for_selector(&page, &opts.wait_for, opts.settle.max(Duration::from_secs(5))).await {
        // The app sometimes renders late; one more settle, then take what exists.
        settle(&page, opts.settle).await;
    }

    page.content()
        .await
        .map_err(|e| ScrapeError::RenderError(format!("content: {e}")))
}

/// Click through common cookie/consent dialogs; at most one click.
pub async fn dismiss_consent(page: &Page) {
    for sel in CONSENT_SELECTORS {
        if let Ok(el) = page.find_element(*sel).await
            && el.click().await.is_ok()
        {
            debug!(selector = *sel, "dismissed consent dialog");
            return;
        }
    }
    if let Ok(result) = page.evaluate(CONSENT_TEXT_CLICK_JS).await
        && result.into_value::<bool>().unwrap_or(false)
    {
        debug!("dismissed consent dialog via text match");
    }
}

/// Approximate a network-idle wait: poll until the DOM stops growing for two
/// consecutive intervals or the budget runs out.
pub async fn settle(page: &Page, budget: Duration) {
    let deadline = tokio::time::Instant::now() + budget;
    let mut last_len = 0usize;
    let mut stable = 0u8;
    while tokio::time::Instant::now() < deadline {
        let len = match page.content().await {
            Ok(html) => html.len(),
            Err(_) => return,
        };
        if len == last_len && len > 0 {
            stable += 1;
            if stable >= 2 {
                return;
            }
        } else {
            stable = 0;
            last_len = len;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll for a selector until it appears or the budget runs out.
pub async fn wait_for_selector(page: &Page, selector: &str, budget: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + budget;
    while tokio::time::Instant::now() < deadline {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}
