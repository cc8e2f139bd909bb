//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, FirdsError>;

#[derive(Error, Debug)]
pub enum FirdsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid logging configuration: {0}")]
    Logging(String),
}
