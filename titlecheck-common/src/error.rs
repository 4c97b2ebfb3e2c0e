//! Common error types for titlecheck

use thiserror::Error;

/// Common result type for titlecheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the verification pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound HTTP error (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mailbox provider error (list/mark/move/folder operations)
    #[error("Mailbox error: {0}")]
    Mailbox(String),

    /// Case-record store error (query or bulk update)
    #[error("Case store error: {0}")]
    Store(String),

    /// Object storage error (transient or archive blobs)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Response spreadsheet could not be read (encrypted or corrupt container)
    #[error("Spreadsheet unreadable: {0}")]
    SpreadsheetUnreadable(String),

    /// Title deed archive could not be read
    #[error("Archive unreadable: {0}")]
    ArchiveUnreadable(String),

    /// Title document bytes could not be parsed for text extraction
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A bounded operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
