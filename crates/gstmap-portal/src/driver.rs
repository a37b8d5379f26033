//! Chromium-backed portal driver.
//!
//! One driver owns one browser session. A lookup navigates to the search
//! page, fills the form, and works through the captcha until the portal
//! yields a results page or the attempt budget is spent.

use crate::error::{PortalError, Result};
use crate::parser::{self, ResultsPage};
use crate::session::{
    DetailFetcher, DetailOutcome, LookupOutcome, PortalSession, SessionProvider,
};
use async_trait::async_trait;
use gstmap_browser::{BrowserEngine, BrowserError};
use gstmap_captcha::CaptchaSolver;
use gstmap_core::{AppConfig, Gstin, Pan};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Search input on both the PAN and GSTIN search pages.
const SEARCH_FIELD: &str = "#for_gstin";
/// Captcha challenge image.
const CAPTCHA_IMAGE: &str = "#imgCaptcha";
/// Captcha solution input.
const CAPTCHA_FIELD: &str = "#fo-captcha";
/// Form submit button.
const SEARCH_BUTTON: &str = "#lotsearch";

/// Class the portal toggles on the captcha image while a fresh challenge
/// is loading.
const CAPTCHA_LOADING_CLASS: &str = "captcha-loading";

/// Poll interval while waiting for the result page to render.
const RENDER_POLL: Duration = Duration::from_millis(500);

impl From<BrowserError> for PortalError {
    fn from(e: BrowserError) -> Self {
        // Mid-session browser failures clear up on retry; only launch
        // failures are fatal, and the provider maps those itself.
        PortalError::Transient(e.to_string())
    }
}

/// A live browser session against the GST portal.
pub struct GstPortalDriver {
    engine: BrowserEngine,
    solver: Arc<dyn CaptchaSolver>,
    config: AppConfig,
}

impl GstPortalDriver {
    /// Wrap a launched engine.
    pub fn new(engine: BrowserEngine, solver: Arc<dyn CaptchaSolver>, config: AppConfig) -> Self {
        Self {
            engine,
            solver,
            config,
        }
    }

    /// Wait until the captcha image has finished loading a challenge.
    async fn wait_for_captcha_ready(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.portal.page_timeout_ms);
        loop {
            let class = self
                .engine
                .attribute(CAPTCHA_IMAGE, "class")
                .await?
                .unwrap_or_default();
            if !class.contains(CAPTCHA_LOADING_CLASS) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PortalError::Transient(
                    "captcha image never finished loading".to_string(),
                ));
            }
            tokio::time::sleep(RENDER_POLL).await;
        }
    }

    /// Solve the on-page captcha and submit the form.
    ///
    /// Returns the page HTML after submission. The caller classifies it;
    /// a rejected solution lands back on the captcha form.
    async fn submit_with_captcha(&self, field_value: &str) -> Result<String> {
        self.engine.fill_field(SEARCH_FIELD, field_value).await?;
        self.wait_for_captcha_ready().await?;

        let image = self.engine.screenshot_element(CAPTCHA_IMAGE).await?;
        let solution = self
            .solver
            .solve(&image)
            .await
            .map_err(|e| PortalError::Transient(format!("captcha solve: {e}")))?;

        self.engine.fill_field(CAPTCHA_FIELD, &solution).await?;
        self.engine.click(SEARCH_BUTTON).await?;

        // The portal swaps the page content in place; give it a beat and
        // then poll until something recognizable renders.
        let deadline = Instant::now() + Duration::from_millis(self.config.portal.page_timeout_ms);
        loop {
            tokio::time::sleep(RENDER_POLL).await;
            let html = self.engine.page_content().await?;
            if parser::classify_lookup_page(&html) != ResultsPage::Unrecognized {
                return Ok(html);
            }
            if Instant::now() >= deadline {
                return Ok(html);
            }
        }
    }

    /// Fetch a fresh captcha challenge after a rejected solution.
    async fn refresh_challenge(&self) -> Result<()> {
        self.engine.reload().await?;
        self.engine
            .wait_for_selector(SEARCH_FIELD, self.config.portal.page_timeout_ms)
            .await?;
        Ok(())
    }

    /// Drive the search form until the portal leaves the captcha page.
    async fn search(&self, url: &str, field_value: &str) -> Result<String> {
        self.engine.goto(url).await?;
        self.engine
            .wait_for_selector(SEARCH_FIELD, self.config.portal.page_timeout_ms)
            .await?;

        let budget = self.config.processing.max_captcha_attempts;
        for attempt in 1..=budget {
            match self.submit_with_captcha(field_value).await {
                Ok(html) => {
                    if parser::classify_lookup_page(&html) != ResultsPage::CaptchaPending
                        && !parser::has_captcha_form(&html)
                    {
                        return Ok(html);
                    }
                    tracing::debug!(attempt, budget, "captcha solution rejected");
                }
                Err(PortalError::Transient(reason)) => {
                    tracing::debug!(attempt, budget, %reason, "captcha attempt failed");
                }
                Err(e) => return Err(e),
            }
            if attempt < budget {
                self.refresh_challenge().await?;
            }
        }
        Err(PortalError::CaptchaExhausted(format!(
            "{budget} attempts spent on {url}"
        )))
    }

    /// Tear down the browser process.
    pub async fn shutdown(mut self) {
        self.engine.shutdown().await;
    }
}

#[async_trait]
impl PortalSession for GstPortalDriver {
    async fn lookup(&self, pan: &Pan) -> Result<LookupOutcome> {
        let html = self
            .search(&self.config.portal.search_by_pan_url, pan.as_str())
            .await?;
        match parser::classify_lookup_page(&html) {
            ResultsPage::Results(summaries) => {
                tracing::info!(pan = %pan, count = summaries.len(), "registrations found");
                Ok(LookupOutcome::Found(summaries))
            }
            ResultsPage::NoRecords => {
                tracing::info!(pan = %pan, "no registrations");
                Ok(LookupOutcome::NoRecords)
            }
            ResultsPage::CaptchaPending | ResultsPage::Unrecognized => Err(
                PortalError::Transient("result page did not render".to_string()),
            ),
        }
    }

    async fn close(self: Box<Self>) {
        self.shutdown().await;
    }
}

#[async_trait]
impl DetailFetcher for GstPortalDriver {
    async fn fetch(&self, gstin: &Gstin) -> Result<DetailOutcome> {
        let html = self
            .search(&self.config.portal.search_by_gstin_url, gstin.as_str())
            .await?;
        match parser::parse_detail_page(&html) {
            Some(details) => {
                tracing::info!(gstin = %gstin, "details extracted");
                Ok(DetailOutcome::Found(details))
            }
            None => {
                tracing::info!(gstin = %gstin, "no record for identifier");
                Ok(DetailOutcome::NotFound)
            }
        }
    }

    async fn close(self: Box<Self>) {
        self.shutdown().await;
    }
}

/// Opens one fresh browser-backed driver per worker.
pub struct DriverProvider {
    config: AppConfig,
    solver: Arc<dyn CaptchaSolver>,
}

impl DriverProvider {
    /// Create a provider for the given configuration and solver.
    pub fn new(config: AppConfig, solver: Arc<dyn CaptchaSolver>) -> Self {
        Self { config, solver }
    }

    async fn open_driver(&self, headless: bool) -> Result<GstPortalDriver> {
        let mut settings = self.config.browser.clone();
        settings.headless = headless;
        let engine = BrowserEngine::launch(&settings, self.config.portal.page_timeout_ms)
            .await
            .map_err(|e| PortalError::Fatal(format!("browser launch: {e}")))?;
        Ok(GstPortalDriver::new(
            engine,
            Arc::clone(&self.solver),
            self.config.clone(),
        ))
    }
}

#[async_trait]
impl SessionProvider for DriverProvider {
    async fn open_session(&self, headless: bool) -> Result<Box<dyn PortalSession>> {
        Ok(Box::new(self.open_driver(headless).await?))
    }

    async fn open_fetcher(&self, headless: bool) -> Result<Box<dyn DetailFetcher>> {
        Ok(Box::new(self.open_driver(headless).await?))
    }
}
