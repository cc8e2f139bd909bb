//! Error taxonomy for the ingestion pipeline
//!
//! Each stage reports its own error type with the identifier of the input it
//! was working on. [`IngestError`] wraps them so the orchestrator and the CLI
//! can tell "no link found" apart from a crash.

use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

// ============================================================================
// Stage Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to fetch {url}: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Other {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn other(url: &str, message: impl std::fmt::Display) -> Self {
        FetchError::Other {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// Malformed XML, an unexpected end of document, or a read failure while
/// streaming records.
#[derive(Debug, Error)]
#[error("failed to parse {source_id} near byte {position}: {message}")]
pub struct ParseError {
    pub source_id: String,
    pub position: u64,
    pub message: String,
}

impl ParseError {
    pub fn new(source_id: &str, position: u64, message: impl std::fmt::Display) -> Self {
        Self {
            source_id: source_id.to_string(),
            position,
            message: message.to_string(),
        }
    }
}

/// A failed table append. Rows written earlier in the same call may remain.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV row to {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to extract {entry} from {path}: {source}")]
    Io {
        path: String,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {entry} would be written outside the extraction directory")]
    UnsafeEntry { entry: String },

    #[error("archive {path} contains no .{extension} file")]
    MissingEntry { path: String, extension: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("storage configuration error: {0}")]
    Config(String),

    #[error("failed to read {path} for upload: {message}")]
    Read { path: String, message: String },

    #[error("failed to upload s3://{bucket}/{key}: {message}")]
    Put {
        bucket: String,
        key: String,
        message: String,
    },
}

// ============================================================================
// Pipeline Error
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no '{file_type}' download link found in {source_id}")]
    LinkNotFound {
        file_type: String,
        source_id: String,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Short stage name used as a structured logging field.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Fetch(_) => "fetch",
            IngestError::LinkNotFound { .. } => "locate",
            IngestError::Extract(_) => "unzip",
            IngestError::Parse(_) => "parse",
            IngestError::Write(_) => "write",
            IngestError::Upload(_) => "upload",
            IngestError::Config(_) => "config",
            IngestError::Io(_) => "io",
        }
    }
}
