//! Incremental result store.
//!
//! A dataset is one `SQLite` file holding two tables: the row-ordered
//! lookup results (`pan_results`) and the merged per-registration details
//! (`gstin_details`). Every row outcome is written durably before the next
//! row is attempted, so a crash loses at most the row in flight and the
//! checkpoint recovered on reopen resumes exactly there.
//!
//! # Design
//!
//! - One pooled connection and `synchronous = FULL`; committed means on disk
//! - Migrations are embedded and applied automatically on open
//! - Result writes are idempotent; conflicting overwrites are refused

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod gstin_details;
pub mod migrations;
pub mod pan_results;

pub use connection::TabularStore;
pub use error::{Result, StoreError};
pub use gstin_details::{DetailsRow, DetailsUpsert};
pub use pan_results::{PanResult, PanRow};
