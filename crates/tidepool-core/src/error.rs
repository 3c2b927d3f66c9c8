//! Error types for tidepool

use thiserror::Error;

/// Core error type for tidepool operations
#[derive(Error, Debug)]
pub enum TidepoolError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The pool cannot service the request at all: the database index is out
    /// of range or the SQL subsystem is unavailable.
    #[error("No pooled connection")]
    NoPooledConnection,

    /// The driver refused to open a connection. Transient; the slot has been
    /// returned to the pool and the caller may retry later.
    #[error("Connection open failed: {0}")]
    OpenFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tidepool operations
pub type Result<T> = std::result::Result<T, TidepoolError>;
