//! Error types for Earcue

use thiserror::Error;

/// Main error type for Earcue operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unauthorized ({0})")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Audio conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using Earcue's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an unauthorized error naming the role that failed the check
    pub fn unauthorized(role: impl Into<String>) -> Self {
        Error::Unauthorized(role.into())
    }

    /// Create a not-found error naming the missing resource
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
