//! Common error types for the unconference poll

use thiserror::Error;

/// Common result type for poll operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across poll crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or received record is not valid JSON for its shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vote references a session id outside the catalog
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Category name outside the fixed category set
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Remote store missing or misconfigured
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote write rejected or not delivered
    #[error("Remote write failed: {0}")]
    RemoteWriteFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
