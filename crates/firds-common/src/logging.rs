//! Logging configuration and initialization
//!
//! Every binary in the workspace sets up `tracing` through [`init_logging`].
//! Output can go to the console, to daily rolling files, or both, as
//! human-readable text or JSON. Console lines go to stderr; stdout is left to
//! command output.
//!
//! Use the `tracing` macros with structured fields instead of `println!`:
//!
//! ```rust
//! use tracing::{info, warn};
//!
//! let records = 25_000;
//! info!(records, source = "DLTINS_20210117_01of01.xml", "extraction finished");
//! warn!(file_type = "DLTINS", "no matching download link");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use firds_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> firds_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     // Keep the guard alive so buffered file output is flushed on exit.
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("started");
//!     Ok(())
//! }
//! ```

use crate::error::{FirdsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Looks `value` up in a table of accepted spellings, ignoring case.
fn parse_named<T: Copy>(kind: &str, value: &str, names: &[(&str, T)]) -> Result<T> {
    names
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value.trim()))
        .map(|(_, variant)| *variant)
        .ok_or_else(|| FirdsError::Logging(format!("unknown log {} '{}'", kind, value)))
}

/// Minimum level of emitted events
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = FirdsError;

    fn from_str(s: &str) -> Result<Self> {
        parse_named(
            "level",
            s,
            &[
                ("trace", Self::Trace),
                ("debug", Self::Debug),
                ("info", Self::Info),
                ("warn", Self::Warn),
                ("warning", Self::Warn),
                ("error", Self::Error),
            ],
        )
    }
}

/// Where log lines are written
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn to_console(self) -> bool {
        self != LogOutput::File
    }

    fn to_file(self) -> bool {
        self != LogOutput::Console
    }
}

impl std::str::FromStr for LogOutput {
    type Err = FirdsError;

    fn from_str(s: &str) -> Result<Self> {
        parse_named(
            "output",
            s,
            &[
                ("console", Self::Console),
                ("stderr", Self::Console),
                ("file", Self::File),
                ("both", Self::Both),
                ("all", Self::Both),
            ],
        )
    }
}

/// Line format
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = FirdsError;

    fn from_str(s: &str) -> Result<Self> {
        parse_named("format", s, &[("text", Self::Text), ("pretty", Self::Text), ("json", Self::Json)])
    }
}

/// How and where the process logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,

    /// Directory for rolling log files
    pub log_dir: PathBuf,

    /// File name prefix, e.g. "firds-ingest" -> "firds-ingest.2021-01-18"
    pub log_file_prefix: String,

    /// Extra comma-separated filter directives, e.g. "aws_smithy_runtime=warn"
    pub filter_directives: Option<String>,

    /// Source file and line on every event
    pub include_location: bool,
    /// Module path on every event
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            output: LogOutput::default(),
            format: LogFormat::default(),
            log_dir: PathBuf::from("logs"),
            log_file_prefix: String::from("firds"),
            filter_directives: None,
            include_location: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder {
            config: LogConfig::default(),
        }
    }

    /// Defaults overridden by `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`,
    /// `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`, `LOG_INCLUDE_LOCATION`
    /// and `LOG_INCLUDE_TARGETS`.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Overrides fields of `self` with any logging variables that are set.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`merge_env`](Self::merge_env) over an arbitrary variable source.
    pub fn merge_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LOG_LEVEL") {
            self.level = value.parse()?;
        }
        if let Some(value) = lookup("LOG_OUTPUT") {
            self.output = value.parse()?;
        }
        if let Some(value) = lookup("LOG_FORMAT") {
            self.format = value.parse()?;
        }
        self.log_dir = lookup("LOG_DIR").map(PathBuf::from).unwrap_or(self.log_dir);
        self.log_file_prefix = lookup("LOG_FILE_PREFIX").unwrap_or(self.log_file_prefix);
        self.filter_directives = lookup("LOG_FILTER").or(self.filter_directives);
        self.include_location = flag(lookup("LOG_INCLUDE_LOCATION"), self.include_location);
        self.include_targets = flag(lookup("LOG_INCLUDE_TARGETS"), self.include_targets);
        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let base = tracing::Level::from(self.level);
        let extra = self.filter_directives.as_deref().unwrap_or_default();

        extra
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .try_fold(EnvFilter::from_default_env().add_directive(base.into()), |filter, d| {
                d.parse()
                    .map(|directive| filter.add_directive(directive))
                    .map_err(|e| FirdsError::Logging(format!("bad filter directive '{}': {}", d, e)))
            })
    }
}

/// Boolean env values; anything unparsable keeps the current setting.
fn flag(value: Option<String>, current: bool) -> bool {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(current)
}

/// Fluent construction of a [`LogConfig`] starting from its defaults.
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    pub fn include_location(mut self, enabled: bool) -> Self {
        self.config.include_location = enabled;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// When file output is enabled the returned guard owns the background
/// writer; dropping it flushes and stops file logging.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let mut guard = None;

    if config.output.to_console() {
        layers.push(fmt_layer(config, std::io::stderr, true));
    }

    if config.output.to_file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let (writer, file_guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
            &config.log_dir,
            &config.log_file_prefix,
        ));
        layers.push(fmt_layer(config, writer, false));
        guard = Some(file_guard);
    }

    Registry::default()
        .with(layers)
        .with(config.env_filter()?)
        .try_init()
        .map_err(|e| FirdsError::Logging(e.to_string()))?;

    Ok(guard)
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(config.include_targets)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.format == LogFormat::Json {
        base.json().boxed()
    } else {
        base.boxed()
    }
}
