use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use gstmap_core::BrowserSettings;
use std::time::{Duration, Instant};

/// Poll interval for selector waits.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser automation engine.
///
/// Owns one chromium process and one page. All page operations are bounded
/// by the configured timeout.
pub struct BrowserEngine {
    browser: Browser,
    page: Page,
    op_timeout: Duration,
}

impl BrowserEngine {
    /// Launch a browser according to the given settings.
    pub async fn launch(settings: &BrowserSettings, page_timeout_ms: u64) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Drive the CDP event loop until the browser goes away
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        Ok(Self {
            browser,
            page,
            op_timeout: Duration::from_millis(page_timeout_ms),
        })
    }

    /// Navigate the page and wait for the load to settle.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.bounded(url, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Reload the current page (fetches a fresh captcha challenge).
    pub async fn reload(&self) -> Result<()> {
        self.bounded("reload", async {
            self.page
                .reload()
                .await
                .map_err(|e| BrowserError::NavigationError(format!("reload: {e}")))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationError(format!("reload: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Wait until a selector is present, polling up to `timeout_ms`.
    pub async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "waiting for {selector}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Clear a form field and type a value into it.
    pub async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        self.bounded(selector, async {
            // Clear any previous value first; type_str only appends
            let clear = format!(r#"document.querySelector("{selector}").value = """#);
            self.page
                .evaluate(clear)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
            element
                .type_str(value)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Click an element.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.bounded(selector, async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Read an attribute of an element.
    pub async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        self.bounded(selector, async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .attribute(name)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))
        })
        .await
    }

    /// Screenshot a single element as PNG bytes (captcha capture).
    pub async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        self.bounded(selector, async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .screenshot(CaptureScreenshotFormat::Png)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))
        })
        .await
    }

    /// Current page HTML.
    pub async fn page_content(&self) -> Result<String> {
        self.bounded("content", async {
            self.page
                .content()
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))
        })
        .await
    }

    /// Close the browser process. Best effort; the child is also killed
    /// when the engine is dropped.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
    }

    async fn bounded<T>(
        &self,
        context: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| BrowserError::Timeout(context.to_string()))?
    }
}
