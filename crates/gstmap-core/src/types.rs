//! Shared types used across the gstmap pipeline.
//!
//! This module defines validated newtypes for the two identifier formats the
//! portal works with, plus the record types that flow between the portal
//! driver, the engines, and the tabular store.

use crate::error::GstmapError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for PAN identifiers with validation.
///
/// A PAN is a 10-character identifier: five letters, four digits, one
/// letter. Input is trimmed and uppercased before validation, since the
/// source rows are typically hand-entered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pan(String);

impl Pan {
    /// Parse a PAN from a raw string, normalizing case and whitespace.
    ///
    /// # Errors
    /// Returns a validation error if the normalized value does not match the
    /// PAN format.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, GstmapError> {
        let normalized = raw.as_ref().trim().to_uppercase();
        Self::validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), GstmapError> {
        static PAN_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = PAN_REGEX
            .get_or_init(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("valid regex"));

        if regex.is_match(value) {
            Ok(())
        } else {
            Err(GstmapError::Validation(format!(
                "invalid PAN: expected 5 letters, 4 digits, 1 letter, got '{value}'"
            )))
        }
    }
}

impl fmt::Display for Pan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for GSTIN identifiers with validation.
///
/// A GSTIN is 15 characters: a 2-digit state code, the holder's PAN, an
/// entity digit, the letter Z and a check character. Validation covers the
/// state code and embedded PAN; the trailing three characters are accepted
/// as any alphanumerics since the portal has issued non-standard suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gstin(String);

impl Gstin {
    /// Parse a GSTIN from a raw string, normalizing case and whitespace.
    ///
    /// # Errors
    /// Returns a validation error if the normalized value does not match the
    /// GSTIN format.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, GstmapError> {
        let normalized = raw.as_ref().trim().to_uppercase();
        Self::validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The PAN embedded in characters 3..13 of the GSTIN.
    #[must_use]
    pub fn pan(&self) -> Pan {
        // Validation guarantees the slice is itself a valid PAN.
        Pan(self.0[2..12].to_string())
    }

    fn validate(value: &str) -> Result<(), GstmapError> {
        static GSTIN_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = GSTIN_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z]{3}$").expect("valid regex")
        });

        if regex.is_match(value) {
            Ok(())
        } else {
            Err(GstmapError::Validation(format!(
                "invalid GSTIN: expected 15 characters (state code + PAN + suffix), got '{value}'"
            )))
        }
    }
}

impl fmt::Display for Gstin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for job identifiers.
///
/// Job IDs are opaque UUID v4 tokens generated at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new random `JobId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the portal's PAN search results.
///
/// The portal returns registration status and state alongside each GSTIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstinSummary {
    /// The registered GSTIN
    pub gstin: Gstin,
    /// Registration status as shown by the portal (e.g. "Active")
    pub status: String,
    /// State of registration
    pub state: String,
}

/// Detail attributes fetched for a single GSTIN from the secondary lookup.
///
/// All fields are optional: the detail page renders them independently and
/// any subset may be missing for a given registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstinDetails {
    /// Trade name of the registered business
    pub trade_name: Option<String>,
    /// Date of registration as rendered by the portal
    pub registration_date: Option<String>,
    /// HSN codes listed for the registration
    pub hsn_codes: Vec<String>,
}
