//! GST portal session driver.
//!
//! Defines the collaborator seams the extraction and enrichment engines
//! consume ([`PortalSession`], [`DetailFetcher`], [`SessionProvider`]) and
//! the concrete chromium-backed driver that searches the portal, solves its
//! captcha, and parses the result pages.

pub mod driver;
pub mod error;
pub mod parser;
pub mod session;

pub use driver::{DriverProvider, GstPortalDriver};
pub use error::{PortalError, Result};
pub use session::{DetailFetcher, DetailOutcome, LookupOutcome, PortalSession, SessionProvider};
