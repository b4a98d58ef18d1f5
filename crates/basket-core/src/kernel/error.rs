//! # Basket Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] enum and the [`Result`] alias.
//!
//! Subsystem errors (currently only [`ServiceSystemError`]) are wrapped via
//! `#[from]` so callers can use `?` across module boundaries, while
//! configuration loading failures carry the offending path.
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::service_system::error::ServiceSystemError;
use thiserror::Error as ThisError;

/// Top-level error type for the Basket core library
#[derive(Debug, ThisError)]
pub enum Error {
    /// Typed scheduler / registration error
    #[error("Service system error: {0}")]
    ServiceSystem(#[from] ServiceSystemError),

    /// Configuration could not be parsed or has an unsupported format
    #[error("Configuration error for '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// I/O failure while reading configuration
    #[error("I/O error during '{operation}' on '{}': {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        operation: String,
        path: PathBuf,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Build an I/O error with the operation and path that failed
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::Io {
            source,
            operation: operation.into(),
            path,
        }
    }

    /// Build a configuration error for `path`
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Borrow the wrapped scheduler error, if this is one
    pub fn as_service_error(&self) -> Option<&ServiceSystemError> {
        match self {
            Error::ServiceSystem(e) => Some(e),
            _ => None,
        }
    }
}
