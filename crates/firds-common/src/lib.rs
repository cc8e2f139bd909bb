//! FIRDS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the FIRDS reference-data workspace.
//!
//! - **Error Handling**: [`FirdsError`] and the crate [`Result`] alias
//! - **Checksums**: SHA-256 digests of published tables
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use firds_common::checksum::compute_file_checksum;
//!
//! fn report(path: &str) -> firds_common::Result<()> {
//!     let digest = compute_file_checksum(path)?;
//!     tracing::info!(%digest, "table checksum");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{FirdsError, Result};
