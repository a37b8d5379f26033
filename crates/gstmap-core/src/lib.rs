//! gstmap Core - Foundation crate for the gstmap extraction pipeline.
//!
//! This crate provides the shared types, error handling, and configuration
//! management that all other gstmap crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Validated newtypes and record types (`Pan`, `Gstin`, `JobId`)
//!
//! # Example
//!
//! ```rust
//! use gstmap_core::{AppConfig, Pan};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let pan = Pan::parse(" aaaca1234f ")?;
//! assert_eq!(pan.as_str(), "AAACA1234F");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserSettings, CaptchaAccount, CaptchaConfig, GeneralConfig, PortalConfig,
    ProcessingConfig,
};
pub use error::{ConfigError, ConfigResult, GstmapError, Result};
pub use types::{Gstin, GstinDetails, GstinSummary, JobId, Pan};
