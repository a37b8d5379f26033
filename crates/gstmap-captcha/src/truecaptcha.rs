//! TrueCaptcha API client.
//!
//! Submits the challenge image as base64 JSON and expects a numeric
//! solution. Several accounts can be configured; when one reports its usage
//! limit the next is tried without burning a retry.

use crate::error::{CaptchaError, Result};
use crate::solver::CaptchaSolver;
use async_trait::async_trait;
use base64::Engine as _;
use gstmap_core::{CaptchaAccount, CaptchaConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum API attempts per account for server/network errors.
const MAX_API_RETRIES: u32 = 3;

/// Challenge images smaller than this are screenshots of a still-loading
/// placeholder, not a captcha.
const MIN_IMAGE_BYTES: usize = 1000;

/// TrueCaptcha-backed solver.
pub struct TrueCaptchaSolver {
    client: Client,
    api_url: String,
    accounts: Vec<CaptchaAccount>,
    solution_length: usize,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    userid: &'a str,
    apikey: &'a str,
    data: String,
    numeric: u8,
    len_min: usize,
    len_max: usize,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    result: Option<String>,
    error_message: Option<String>,
}

impl TrueCaptchaSolver {
    /// Create a solver from the captcha section of the app config.
    ///
    /// # Errors
    /// Returns `CaptchaError::Service` if the HTTP client cannot be built
    /// or `SolveFailure` if no accounts are configured.
    pub fn new(config: &CaptchaConfig) -> Result<Self> {
        if config.accounts.is_empty() {
            return Err(CaptchaError::SolveFailure(
                "no captcha accounts configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CaptchaError::Service(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            accounts: config.accounts.clone(),
            solution_length: config.solution_length,
        })
    }

    /// Strip non-digits from a raw API result and enforce the expected
    /// length. The service occasionally pads solutions with spaces or
    /// letters it misread from the image border.
    fn normalize_solution(raw: &str, expected_len: usize) -> Option<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == expected_len {
            Some(digits)
        } else {
            None
        }
    }

    /// Reject payloads that cannot be a rendered challenge.
    fn validate_image(image: &[u8]) -> Result<()> {
        if image.is_empty() {
            return Err(CaptchaError::InvalidImage("empty image".to_string()));
        }
        if image.len() < MIN_IMAGE_BYTES {
            return Err(CaptchaError::InvalidImage(format!(
                "image too small ({} bytes), challenge likely still loading",
                image.len()
            )));
        }
        Ok(())
    }

    async fn solve_with_account(
        &self,
        account: &CaptchaAccount,
        encoded: &str,
    ) -> Result<AccountOutcome> {
        for retry in 0..MAX_API_RETRIES {
            if retry > 0 {
                let backoff = Duration::from_secs(1u64 << retry);
                tracing::info!(
                    "Captcha API retry {}/{}, waiting {:?}",
                    retry,
                    MAX_API_RETRIES - 1,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }

            let request = ApiRequest {
                userid: &account.userid,
                apikey: &account.apikey,
                data: encoded.to_string(),
                numeric: 1,
                len_min: self.solution_length,
                len_max: self.solution_length,
            };

            let response = match self.client.post(&self.api_url).json(&request).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Captcha API request failed: {}", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                tracing::warn!("Captcha API server error: {}", status);
                continue;
            }
            if !status.is_success() {
                return Err(CaptchaError::Service(format!(
                    "captcha API returned status {status}"
                )));
            }

            let body: ApiResponse = response
                .json()
                .await
                .map_err(|e| CaptchaError::Service(format!("invalid API response: {e}")))?;

            if let Some(message) = &body.error_message {
                if message.contains("above free usage limit") {
                    tracing::warn!("Captcha account {} has reached its usage limit", account.userid);
                    return Ok(AccountOutcome::UsageLimit);
                }
            }

            if let Some(raw) = &body.result {
                if let Some(solution) = Self::normalize_solution(raw, self.solution_length) {
                    return Ok(AccountOutcome::Solved(solution));
                }
                tracing::warn!(
                    "Captcha solution '{}' is not {} digits",
                    raw,
                    self.solution_length
                );
            }
        }

        Ok(AccountOutcome::Failed)
    }
}

enum AccountOutcome {
    Solved(String),
    UsageLimit,
    Failed,
}

#[async_trait]
impl CaptchaSolver for TrueCaptchaSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        Self::validate_image(image)?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        for account in &self.accounts {
            tracing::info!("Submitting captcha via account {}", account.userid);
            match self.solve_with_account(account, &encoded).await? {
                AccountOutcome::Solved(solution) => {
                    tracing::info!("Captcha solved");
                    return Ok(solution);
                }
                AccountOutcome::UsageLimit | AccountOutcome::Failed => continue,
            }
        }

        Err(CaptchaError::SolveFailure(
            "no account produced a valid solution".to_string(),
        ))
    }
}
