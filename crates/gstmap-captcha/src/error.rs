use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptchaError>;

#[derive(Debug, Error)]
pub enum CaptchaError {
    /// The service responded but no usable solution came back.
    #[error("captcha solve failed: {0}")]
    SolveFailure(String),

    /// The service could not be reached or returned a server error.
    #[error("captcha service error: {0}")]
    Service(String),

    /// The challenge image was rejected before submission.
    #[error("invalid captcha image: {0}")]
    InvalidImage(String),
}
