//! Pipeline configuration
//!
//! Values come from, in increasing priority: built-in defaults, `FIRDS_*`
//! environment variables, then whatever the caller sets on the builder (the
//! CLI maps its flags onto it).

use crate::discovery::DEFAULT_FILE_TYPE;
use crate::error::{IngestError, Result};
use crate::parser::{ExtractOptions, DEFAULT_BATCH_SIZE, DEFAULT_NAMESPACE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Defaults
// ============================================================================

/// Solr endpoint of the ESMA FIRDS file register.
pub const ESMA_REGISTER_URL: &str =
    "https://registers.esma.europa.eu/solr/esma_registers_firds_files/select";

/// Rows requested from the register per query.
pub const DEFAULT_DISCOVERY_ROWS: u32 = 100;

pub const DEFAULT_WORK_DIR: &str = "firds-work";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout; archives run to hundreds of megabytes.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn default_from_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 17).unwrap_or_default()
}

fn default_to_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 19).unwrap_or_default()
}

// ============================================================================
// IngestConfig
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Explicit discovery document URL. When unset the URL is built from the
    /// publication-date window.
    pub discovery_url: Option<String>,

    /// First publication date of the window (inclusive)
    pub from_date: NaiveDate,

    /// Last publication date of the window (inclusive)
    pub to_date: NaiveDate,

    /// File type whose download link is followed (e.g. "DLTINS")
    pub file_type: String,

    /// Discovery entry value holding the file type
    pub type_field: String,

    /// Discovery entry value holding the download link
    pub link_field: String,

    /// Scratch directory for the discovery document, archive and tables
    pub work_dir: PathBuf,

    /// Namespace URI of the record elements
    pub namespace: String,

    /// Records held in memory before a flush
    pub batch_size: usize,

    /// Write the column header as the first row of each table
    pub include_header: bool,

    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// Draw a progress bar while downloading
    pub show_progress: bool,

    /// Keep the tables local instead of publishing them
    pub skip_upload: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            discovery_url: None,
            from_date: default_from_date(),
            to_date: default_to_date(),
            file_type: DEFAULT_FILE_TYPE.to_string(),
            type_field: "file_type".to_string(),
            link_field: "download_link".to_string(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            include_header: true,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            show_progress: false,
            skip_upload: false,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Defaults overridden by `FIRDS_*` environment variables.
    ///
    /// A variable that is set but cannot be parsed is a configuration error
    /// rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();

        Ok(Self {
            discovery_url: env_string("FIRDS_DISCOVERY_URL").or(default.discovery_url),
            from_date: env_date("FIRDS_FROM_DATE")?.unwrap_or(default.from_date),
            to_date: env_date("FIRDS_TO_DATE")?.unwrap_or(default.to_date),
            file_type: env_string("FIRDS_FILE_TYPE").unwrap_or(default.file_type),
            type_field: env_string("FIRDS_TYPE_FIELD").unwrap_or(default.type_field),
            link_field: env_string("FIRDS_LINK_FIELD").unwrap_or(default.link_field),
            work_dir: env_string("FIRDS_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.work_dir),
            namespace: env_string("FIRDS_NAMESPACE").unwrap_or(default.namespace),
            batch_size: env_parse("FIRDS_BATCH_SIZE")?.unwrap_or(default.batch_size),
            include_header: env_parse("FIRDS_INCLUDE_HEADER")?.unwrap_or(default.include_header),
            connect_timeout_secs: env_parse("FIRDS_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(default.connect_timeout_secs),
            request_timeout_secs: env_parse("FIRDS_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(default.request_timeout_secs),
            show_progress: env_parse("FIRDS_SHOW_PROGRESS")?.unwrap_or(default.show_progress),
            skip_upload: env_parse("FIRDS_SKIP_UPLOAD")?.unwrap_or(default.skip_upload),
        })
    }

    /// The explicit URL, or the register query for the date window.
    pub fn discovery_url(&self) -> String {
        match &self.discovery_url {
            Some(url) => url.clone(),
            None => register_query_url(self.from_date, self.to_date),
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            namespace: self.namespace.clone(),
            batch_size: self.batch_size,
            include_header: self.include_header,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be at least 1".to_string());
        }

        if self.from_date > self.to_date {
            return Err(format!(
                "Publication window is empty: {} is after {}",
                self.from_date, self.to_date
            ));
        }

        if self.file_type.trim().is_empty() {
            return Err("File type cannot be empty".to_string());
        }

        if self.type_field.is_empty() || self.link_field.is_empty() {
            return Err("Discovery field names cannot be empty".to_string());
        }

        if self.namespace.trim().is_empty() {
            return Err("Record namespace cannot be empty".to_string());
        }

        if self.work_dir.as_os_str().is_empty() {
            return Err("Work directory cannot be empty".to_string());
        }

        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }

        if let Some(url) = &self.discovery_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Discovery URL must be http(s): {}", url));
            }
        }

        Ok(())
    }
}

/// Register query listing the files published between `from` and `to`.
pub fn register_query_url(from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "{}?q=*&fq=publication_date:%5B{}T00:00:00Z+TO+{}T23:59:59Z%5D&wt=xml&indent=true&start=0&rows={}",
        ESMA_REGISTER_URL,
        from.format(DATE_FORMAT),
        to.format(DATE_FORMAT),
        DEFAULT_DISCOVERY_ROWS
    )
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| IngestError::Config(format!("invalid date '{}': {}", value, e)))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| IngestError::Config(format!("invalid {}='{}': {}", name, value, e))),
        None => Ok(None),
    }
}

fn env_date(name: &str) -> Result<Option<NaiveDate>> {
    env_string(name).map(|v| parse_date(&v)).transpose()
}

// ============================================================================
// Builder
// ============================================================================

/// Builder over [`IngestConfig`]; unset values keep the base config's.
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    base: Option<IngestConfig>,
    discovery_url: Option<String>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    file_type: Option<String>,
    work_dir: Option<PathBuf>,
    namespace: Option<String>,
    batch_size: Option<usize>,
    include_header: Option<bool>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    show_progress: Option<bool>,
    skip_upload: Option<bool>,
}

impl IngestConfigBuilder {
    /// Starts from `config` instead of the defaults.
    pub fn base(mut self, config: IngestConfig) -> Self {
        self.base = Some(config);
        self
    }

    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn to_date(mut self, date: NaiveDate) -> Self {
        self.to_date = Some(date);
        self
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn include_header(mut self, include: bool) -> Self {
        self.include_header = Some(include);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = Some(show);
        self
    }

    pub fn skip_upload(mut self, skip: bool) -> Self {
        self.skip_upload = Some(skip);
        self
    }

    pub fn build(self) -> IngestConfig {
        let base = self.base.unwrap_or_default();

        IngestConfig {
            discovery_url: self.discovery_url.or(base.discovery_url),
            from_date: self.from_date.unwrap_or(base.from_date),
            to_date: self.to_date.unwrap_or(base.to_date),
            file_type: self.file_type.unwrap_or(base.file_type),
            type_field: base.type_field,
            link_field: base.link_field,
            work_dir: self.work_dir.unwrap_or(base.work_dir),
            namespace: self.namespace.unwrap_or(base.namespace),
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            include_header: self.include_header.unwrap_or(base.include_header),
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(base.connect_timeout_secs),
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(base.request_timeout_secs),
            show_progress: self.show_progress.unwrap_or(base.show_progress),
            skip_upload: self.skip_upload.unwrap_or(base.skip_upload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.file_type, "DLTINS");
        assert_eq!(config.batch_size, 10_000);
        assert!(config.include_header);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_default_discovery_url() {
        let config = IngestConfig::default();
        assert_eq!(
            config.discovery_url(),
            "https://registers.esma.europa.eu/solr/esma_registers_firds_files/select?q=*&fq=publication_date:%5B2021-01-17T00:00:00Z+TO+2021-01-19T23:59:59Z%5D&wt=xml&indent=true&start=0&rows=100"
        );
    }

    #[test]
    fn test_explicit_discovery_url_wins() {
        let config = IngestConfig::builder()
            .discovery_url("http://localhost:8080/select")
            .build();
        assert_eq!(config.discovery_url(), "http://localhost:8080/select");
    }

    #[test]
    fn test_builder_overrides_base() {
        let base = IngestConfig::builder().batch_size(5).skip_upload(true).build();
        let config = IngestConfig::builder()
            .base(base)
            .batch_size(7)
            .file_type("FULINS_E")
            .build();

        assert_eq!(config.batch_size, 7);
        assert_eq!(config.file_type, "FULINS_E");
        assert!(config.skip_upload);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(IngestConfig::builder().batch_size(0).build().validate().is_err());
        assert!(IngestConfig::builder().file_type(" ").build().validate().is_err());
        assert!(IngestConfig::builder().request_timeout_secs(0).build().validate().is_err());
        assert!(IngestConfig::builder()
            .discovery_url("ftp://example.test/select")
            .build()
            .validate()
            .is_err());

        let inverted = IngestConfig::builder()
            .from_date(parse_date("2021-02-01").unwrap())
            .to_date(parse_date("2021-01-01").unwrap())
            .build();
        let err = inverted.validate().unwrap_err();
        assert!(err.contains("2021-02-01"));
    }

    #[test]
    fn test_extract_options() {
        let options = IngestConfig::builder()
            .batch_size(3)
            .include_header(false)
            .namespace("urn:example")
            .build()
            .extract_options();

        assert_eq!(options.batch_size, 3);
        assert!(!options.include_header);
        assert_eq!(options.namespace, "urn:example");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(" 2021-01-17 ").unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 17).unwrap()
        );
        assert!(matches!(parse_date("17/01/2021"), Err(IngestError::Config(_))));
    }
}
