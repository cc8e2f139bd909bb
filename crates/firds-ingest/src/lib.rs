//! FIRDS Ingest Library
//!
//! Turns ESMA FIRDS instrument reports into flat CSV tables.
//!
//! # Stages
//!
//! - **Discovery**: fetch the register's file listing and pick the download
//!   link of the wanted file type ([`discovery`])
//! - **Download and unpack**: stream the archive to disk and unzip it
//!   ([`fetch`], [`archive`])
//! - **Extraction**: stream each XML payload into a CSV table in bounded
//!   batches ([`parser`], [`writer`])
//! - **Publishing**: upload the tables to S3 ([`storage`])
//!
//! [`pipeline::Pipeline`] runs them in order.
//!
//! # Example
//!
//! ```no_run
//! use firds_ingest::parser::{extract_to_csv, ExtractOptions};
//! use std::path::Path;
//!
//! fn main() -> firds_ingest::Result<()> {
//!     let summary = extract_to_csv(
//!         Path::new("DLTINS_20210117_01of01.xml"),
//!         Path::new("DLTINS_20210117_01of01.csv"),
//!         &ExtractOptions::default(),
//!     )?;
//!     println!("{} records", summary.records);
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod writer;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use models::{InstrumentRecord, COLUMNS};
pub use pipeline::{Pipeline, PipelineReport};
