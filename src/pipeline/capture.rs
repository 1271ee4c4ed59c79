//! Capture driver: render the document in a headless browser and rasterise
//! every page.
//!
//! The worker talks to a [`CaptureDriver`] trait object, never to a browser
//! directly. Any engine that can render a URL, answer a small structural
//! probe, and screenshot a viewport satisfies the contract; tests script the
//! trait in memory, production uses [`BrowserDriver`] over chromiumoxide.
//!
//! The browser session is scoped to one conversion. The worker calls
//! [`CaptureDriver::close`] at the end of the run regardless of outcome, so a
//! cancelled or failed run never leaks a Chromium process.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cancel::CancelFlag;
use crate::error::ConvertError;
use crate::pipeline::gate::{classify, GateState, PageProbe};
use crate::pipeline::url::DocumentUrl;

/// One rasterised document page. `index` is 1-based document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    pub index: usize,
    pub png: Vec<u8>,
}

/// The full capture of an open document.
///
/// Invariant: `page_count == pages.len()` and `pages[i].index == i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub pages: Vec<CapturedPage>,
    pub page_count: usize,
}

/// Per-page progress callback: `(current_1_based, total)`. The reported total
/// never decreases across calls within one capture.
pub type PageProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// The rendering-engine seam.
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    /// Navigate to the document and classify its gate state.
    async fn open(&self, url: &DocumentUrl) -> Result<GateState, ConvertError>;

    /// Submit an email into the gate form; returns the new state (which may
    /// still be [`GateState::NeedsPasscode`] when the document wants both).
    async fn submit_email(&self, email: &str) -> Result<GateState, ConvertError>;

    /// Submit email and passcode; returns [`GateState::Open`] or
    /// [`GateState::InvalidCredentials`].
    async fn submit_passcode(&self, email: &str, passcode: &str)
        -> Result<GateState, ConvertError>;

    /// Capture every page of an open document in document order.
    ///
    /// Checks `cancel` between pages and returns [`ConvertError::Cancelled`]
    /// without partial results. `on_progress` fires after each captured page.
    async fn capture_pages(
        &self,
        on_progress: PageProgress<'_>,
        cancel: &CancelFlag,
    ) -> Result<ScrapeResult, ConvertError>;

    /// Tear the session down. Idempotent, best-effort.
    async fn close(&self);
}

// ── chromiumoxide implementation ─────────────────────────────────────────

/// Structural DOM snapshot returned by [`PROBE_JS`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeSnapshot {
    has_email_field: bool,
    has_passcode_field: bool,
    auth_rejected: bool,
    viewer_page_count: Option<usize>,
    path: String,
}

/// One query answering everything the classifier needs. Field presence and
/// the form's validity marker are read, never error text.
const PROBE_JS: &str = r#"
(() => {
  const email = document.querySelector(
    "input[name='link_auth_form[email]'], form input[type='email']");
  const passcode = document.querySelector(
    "input[name='link_auth_form[passcode]'], form input[type='password']");
  const rejected = !!document.querySelector(
    "form .field_with_errors, form [aria-invalid='true']");
  const pages = document.querySelectorAll(
    ".preso-view .page-view, #preso-pages .page").length;
  const indicator = document.querySelector(
    ".toolbar-page-indicator, .page-label");
  let total = pages;
  if (indicator) {
    const m = indicator.textContent.match(/(\d+)\s*$/);
    if (m) total = Math.max(total, parseInt(m[1], 10));
  }
  return {
    hasEmailField: !!email,
    hasPasscodeField: !!passcode,
    authRejected: rejected,
    viewerPageCount: total > 0 ? total : null,
    path: location.pathname,
  };
})()
"#;

const EMAIL_SELECTOR: &str = "input[name='link_auth_form[email]'], form input[type='email']";
const PASSCODE_SELECTOR: &str =
    "input[name='link_auth_form[passcode]'], form input[type='password']";
const SUBMIT_SELECTOR: &str = "form button[type='submit'], form input[type='submit']";

struct Session {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

/// Headless-Chromium capture driver.
pub struct BrowserDriver {
    session: Mutex<Option<Session>>,
    nav_timeout: Duration,
    settle: Duration,
}

impl BrowserDriver {
    /// Launch a sandboxed headless browser sized to `viewport`.
    pub async fn launch(
        viewport: (u32, u32),
        nav_timeout: Duration,
        settle: Duration,
    ) -> Result<Self, ConvertError> {
        let (width, height) = viewport;
        let config = BrowserConfig::builder()
            .window_size(width, height)
            .build()
            .map_err(|detail| ConvertError::Browser { detail })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ConvertError::Browser {
                detail: e.to_string(),
            })?;

        // The CDP event stream must be drained for the connection to stay
        // alive; park it on its own task for the life of the session.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("cdp handler event error: {e}");
                }
            }
        });

        Ok(Self {
            session: Mutex::new(Some(Session {
                browser,
                page: None,
                handler_task,
            })),
            nav_timeout,
            settle,
        })
    }

    async fn with_page<T, F, Fut>(&self, f: F) -> Result<T, ConvertError>
    where
        F: FnOnce(Page) -> Fut,
        Fut: std::future::Future<Output = Result<T, ConvertError>>,
    {
        let page = {
            let guard = self.session.lock().await;
            let session = guard.as_ref().ok_or_else(|| ConvertError::Browser {
                detail: "session already closed".into(),
            })?;
            session.page.clone().ok_or_else(|| ConvertError::Browser {
                detail: "no document open".into(),
            })?
        };
        f(page).await
    }

    async fn bounded<T, Fut>(&self, during: &str, fut: Fut) -> Result<T, ConvertError>
    where
        Fut: std::future::Future<Output = Result<T, ConvertError>>,
    {
        tokio::time::timeout(self.nav_timeout, fut)
            .await
            .map_err(|_| ConvertError::Timeout {
                secs: self.nav_timeout.as_secs(),
                during: during.to_string(),
            })?
    }

    async fn probe(&self, page: &Page) -> Result<PageProbe, ConvertError> {
        let snapshot: ProbeSnapshot = page
            .evaluate(PROBE_JS)
            .await
            .map_err(|e| ConvertError::PageLoad {
                detail: format!("probe failed: {e}"),
            })?
            .into_value()
            .map_err(|e| ConvertError::PageLoad {
                detail: format!("probe result malformed: {e}"),
            })?;

        Ok(PageProbe {
            has_email_field: snapshot.has_email_field,
            has_passcode_field: snapshot.has_passcode_field,
            auth_rejected: snapshot.auth_rejected,
            viewer_page_count: snapshot.viewer_page_count,
            redirected_off_document: !snapshot.path.starts_with("/view/"),
        })
    }

    /// Fill `selector` with `value` if the field exists.
    async fn fill(&self, page: &Page, selector: &str, value: &str) -> Result<bool, ConvertError> {
        match page.find_element(selector).await {
            Ok(element) => {
                element
                    .click()
                    .await
                    .and(element.type_str(value).await)
                    .map_err(|e| ConvertError::PageLoad {
                        detail: format!("could not fill gate field: {e}"),
                    })?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Submit the gate form and wait for the page to settle, then reclassify.
    async fn submit_and_classify(&self, page: &Page) -> Result<GateState, ConvertError> {
        if let Ok(button) = page.find_element(SUBMIT_SELECTOR).await {
            button.click().await.map_err(|e| ConvertError::PageLoad {
                detail: format!("could not submit gate form: {e}"),
            })?;
        }
        // The gate may respond with a full navigation or an in-place
        // re-render; wait for whichever happens, then let the DOM settle.
        let _ = tokio::time::timeout(self.nav_timeout, page.wait_for_navigation()).await;
        tokio::time::sleep(self.settle).await;

        let probe = self.probe(page).await?;
        Ok(classify(&probe))
    }
}

#[async_trait]
impl CaptureDriver for BrowserDriver {
    async fn open(&self, url: &DocumentUrl) -> Result<GateState, ConvertError> {
        let page = {
            let guard = self.session.lock().await;
            let session = guard.as_ref().ok_or_else(|| ConvertError::Browser {
                detail: "session already closed".into(),
            })?;
            session
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| ConvertError::Browser {
                    detail: e.to_string(),
                })?
        };

        self.bounded("loading the document", async {
            page.goto(url.as_str())
                .await
                .map_err(|e| ConvertError::Unreachable {
                    detail: e.to_string(),
                })?;
            page.wait_for_navigation()
                .await
                .map_err(|e| ConvertError::Unreachable {
                    detail: e.to_string(),
                })?;
            Ok(())
        })
        .await?;
        tokio::time::sleep(self.settle).await;

        let probe = self.probe(&page).await?;
        let state = classify(&probe);
        debug!(?state, "document opened");

        if let Some(session) = self.session.lock().await.as_mut() {
            session.page = Some(page);
        }
        Ok(state)
    }

    async fn submit_email(&self, email: &str) -> Result<GateState, ConvertError> {
        let email = email.to_string();
        self.with_page(|page| async move {
            if !self.fill(&page, EMAIL_SELECTOR, &email).await? {
                return Err(ConvertError::PageLoad {
                    detail: "email gate form not present".into(),
                });
            }
            self.bounded("submitting email", self.submit_and_classify(&page))
                .await
        })
        .await
    }

    async fn submit_passcode(
        &self,
        email: &str,
        passcode: &str,
    ) -> Result<GateState, ConvertError> {
        let email = email.to_string();
        let passcode = passcode.to_string();
        self.with_page(|page| async move {
            // The passcode form usually repeats the email field; refill it
            // when present so a fresh render still carries the address.
            self.fill(&page, EMAIL_SELECTOR, &email).await?;
            if !self.fill(&page, PASSCODE_SELECTOR, &passcode).await? {
                return Err(ConvertError::PageLoad {
                    detail: "passcode gate form not present".into(),
                });
            }
            self.bounded("submitting passcode", self.submit_and_classify(&page))
                .await
        })
        .await
    }

    async fn capture_pages(
        &self,
        on_progress: PageProgress<'_>,
        cancel: &CancelFlag,
    ) -> Result<ScrapeResult, ConvertError> {
        let settle = self.settle;
        self.with_page(|page| async move {
            let probe = self.probe(&page).await?;
            let mut total = match classify(&probe) {
                GateState::Open { page_count } => page_count,
                other => {
                    return Err(ConvertError::PageLoad {
                        detail: format!("viewer not open, gate state {other:?}"),
                    })
                }
            };

            let mut pages = Vec::with_capacity(total);
            let mut index = 1usize;
            while index <= total {
                if cancel.requested() {
                    return Err(ConvertError::Cancelled);
                }

                let png = self
                    .bounded("capturing a page", async {
                        page.screenshot(
                            ScreenshotParams::builder()
                                .format(CaptureScreenshotFormat::Png)
                                .full_page(false)
                                .build(),
                        )
                        .await
                        .map_err(|e| ConvertError::PageLoad {
                            detail: format!("screenshot of page {index} failed: {e}"),
                        })
                    })
                    .await?;
                pages.push(CapturedPage { index, png });
                on_progress(index, total);

                if index < total {
                    self.advance(&page).await?;
                    tokio::time::sleep(settle).await;
                    // Decks can lazily reveal more pages than the indicator
                    // first advertised; the total may grow, never shrink.
                    if let Ok(p) = self.probe(&page).await {
                        if let Some(count) = p.viewer_page_count {
                            if count > total {
                                debug!(old = total, new = count, "page count grew mid-capture");
                                total = count;
                            }
                        }
                    }
                }
                index += 1;
            }

            Ok(ScrapeResult {
                page_count: pages.len(),
                pages,
            })
        })
        .await
    }

    async fn close(&self) {
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            if let Err(e) = session.browser.close().await {
                warn!("browser close failed: {e}");
            }
            if let Err(e) = session.browser.wait().await {
                warn!("browser did not exit cleanly: {e}");
            }
            session.handler_task.abort();
        }
    }
}

impl BrowserDriver {
    /// Move the viewer to the next page.
    async fn advance(&self, page: &Page) -> Result<(), ConvertError> {
        let body = page
            .find_element("body")
            .await
            .map_err(|e| ConvertError::PageLoad {
                detail: format!("viewer lost: {e}"),
            })?;
        body.press_key("ArrowRight")
            .await
            .map_err(|e| ConvertError::PageLoad {
                detail: format!("could not advance to the next page: {e}"),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_snapshot_deserialises_from_probe_js_shape() {
        let json = r#"{
            "hasEmailField": true,
            "hasPasscodeField": false,
            "authRejected": false,
            "viewerPageCount": null,
            "path": "/view/abc123"
        }"#;
        let snap: ProbeSnapshot = serde_json::from_str(json).unwrap();
        assert!(snap.has_email_field);
        assert!(!snap.has_passcode_field);
        assert_eq!(snap.viewer_page_count, None);
        assert_eq!(snap.path, "/view/abc123");
    }

    #[test]
    fn off_document_path_marks_probe_redirected() {
        // Mirrors the mapping in `probe`.
        let path = "/no_access";
        assert!(!path.starts_with("/view/"));
    }
}
