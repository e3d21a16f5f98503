//! Common error types for lectary

use thiserror::Error;

/// Common result type for lectary operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across lectary services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with current state (duplicate job, terminal-state cancel)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object storage operation error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Completion service call failed or returned unusable output
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors the caller can correct (bad input, missing resource,
    /// state conflict); false for server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidInput(_) | Error::Conflict(_)
        )
    }
}
