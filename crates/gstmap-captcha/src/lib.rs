//! Captcha solving for the gstmap portal flow.
//!
//! The portal gates every search behind a six-digit image captcha. This
//! crate defines the solver seam the portal driver calls and a TrueCaptcha
//! HTTP implementation with account rotation.

pub mod error;
pub mod solver;
pub mod truecaptcha;

pub use error::{CaptchaError, Result};
pub use solver::CaptchaSolver;
pub use truecaptcha::TrueCaptchaSolver;
