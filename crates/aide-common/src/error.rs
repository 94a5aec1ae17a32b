//! Error types for AIDE

use thiserror::Error;

/// Result type alias for AIDE operations
pub type Result<T> = std::result::Result<T, AideError>;

/// Main error type shared across AIDE crates
#[derive(Error, Debug)]
pub enum AideError {
    #[error("Invalid file extension: '{0}'")]
    InvalidExtension(String),

    #[error("Invalid MIME type: '{0}'")]
    InvalidMimeType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
