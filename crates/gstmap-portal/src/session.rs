//! The collaborator seams consumed by the engines.

use crate::error::Result;
use async_trait::async_trait;
use gstmap_core::{Gstin, GstinDetails, GstinSummary, Pan};

/// Outcome of a PAN lookup against the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// One or more registrations exist for the PAN.
    Found(Vec<GstinSummary>),
    /// The portal reported no registrations.
    NoRecords,
}

/// Outcome of a GSTIN detail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    /// The detail page rendered for this GSTIN.
    Found(GstinDetails),
    /// The portal reported no record for this GSTIN.
    NotFound,
}

/// One automated portal session, owned by exactly one worker.
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// Look up all GSTINs registered against a PAN.
    async fn lookup(&self, pan: &Pan) -> Result<LookupOutcome>;

    /// Tear the session down once the worker is done with it.
    async fn close(self: Box<Self>) {}
}

/// Detail lookups against the secondary search page.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Fetch trade name, registration date and HSN codes for a GSTIN.
    async fn fetch(&self, gstin: &Gstin) -> Result<DetailOutcome>;

    /// Tear the fetcher down once the worker is done with it.
    async fn close(self: Box<Self>) {}
}

/// Factory for portal sessions.
///
/// The job manager opens one session per worker after the worker claims its
/// slot, so browser startup cost is paid inside the job and sessions are
/// never shared.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a session for an extraction worker.
    async fn open_session(&self, headless: bool) -> Result<Box<dyn PortalSession>>;

    /// Open a detail fetcher for an enrichment worker.
    async fn open_fetcher(&self, headless: bool) -> Result<Box<dyn DetailFetcher>>;
}
