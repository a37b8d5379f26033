use thiserror::Error;

pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors at the portal seam, split along the retry taxonomy: transient
/// failures are retried by the engines, captcha exhaustion is treated the
/// same way, and fatal errors abort the run.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Expected to succeed on retry (timeout, portal busy, navigation churn).
    #[error("transient portal error: {0}")]
    Transient(String),

    /// Every captcha attempt for this lookup was spent without reaching a
    /// results page.
    #[error("captcha attempts exhausted: {0}")]
    CaptchaExhausted(String),

    /// Cannot be resolved by retrying within this run (browser cannot
    /// start, portal session unusable).
    #[error("fatal portal error: {0}")]
    Fatal(String),
}

impl PortalError {
    /// Whether the engines should retry this error within the same record.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::CaptchaExhausted(_))
    }
}
