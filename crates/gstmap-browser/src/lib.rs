//! Browser automation engine for the JavaScript-heavy GST portal.
//!
//! Provides headless browser control with per-operation timeouts. One
//! engine instance drives one browser process with one page; the portal
//! session that owns it is never shared across jobs.

pub mod engine;
pub mod error;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
