// src/error.rs

use std::fmt;
use thiserror::Error;

/// Why a blob upload was rejected, classified from the network's response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailure {
    BadFormat,
    Auth,
    Permission,
    NotFound,
    Conflict,
    RateLimited,
    LegalUnavailable,
    Connection,
    Timeout,
    Aborted,
    Internal,
}

impl UploadFailure {
    /// Classify an HTTP status code returned by the publisher
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 413 | 415 | 422 => UploadFailure::BadFormat,
            401 => UploadFailure::Auth,
            403 => UploadFailure::Permission,
            404 => UploadFailure::NotFound,
            409 => UploadFailure::Conflict,
            429 => UploadFailure::RateLimited,
            451 => UploadFailure::LegalUnavailable,
            408 | 504 => UploadFailure::Timeout,
            499 => UploadFailure::Aborted,
            _ => UploadFailure::Internal,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UploadFailure::BadFormat => "bad_format",
            UploadFailure::Auth => "auth",
            UploadFailure::Permission => "permission",
            UploadFailure::NotFound => "not_found",
            UploadFailure::Conflict => "conflict",
            UploadFailure::RateLimited => "rate_limited",
            UploadFailure::LegalUnavailable => "legal_unavailable",
            UploadFailure::Connection => "connection",
            UploadFailure::Timeout => "timeout",
            UploadFailure::Aborted => "aborted",
            UploadFailure::Internal => "internal",
        }
    }

    /// HTTP status the API reports for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            UploadFailure::BadFormat => 400,
            UploadFailure::Auth => 401,
            UploadFailure::Permission => 403,
            UploadFailure::NotFound => 404,
            UploadFailure::Conflict => 409,
            UploadFailure::RateLimited => 429,
            UploadFailure::LegalUnavailable => 451,
            UploadFailure::Connection => 502,
            UploadFailure::Timeout => 504,
            UploadFailure::Aborted => 499,
            UploadFailure::Internal => 500,
        }
    }
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an update could not complete
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("package '{0}' is not installed")]
    NotInstalled(String),

    #[error(
        "'{removed}' was already removed but installing '{target}' failed: {reason}. \
         Reinstall manually with `beacon install {target}`"
    )]
    ReinstallFailed {
        removed: String,
        target: String,
        reason: String,
    },

    #[error("failed to remove '{package}': {reason}")]
    RemoveFailed { package: String, reason: String },
}

/// Core error types for Beacon
#[derive(Error, Debug)]
pub enum Error {
    /// Search, package, record or blob absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Nonzero exit from an external tool
    #[error("`{command}` failed: {stderr}")]
    ExternalTool { command: String, stderr: String },

    /// External tool exceeded its time limit
    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Package installation failed
    #[error("Failed to install {package}: {stderr}")]
    Install { package: String, stderr: String },

    #[error("Update failed: {0}")]
    Update(#[from] UpdateError),

    /// External output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Unique index violation (e.g. a blobId recorded twice)
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Blob upload failed ({reason}): {message}")]
    BlobUploadFailed {
        reason: UploadFailure,
        message: String,
    },

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Blob download failed: {0}")]
    BlobDownloadFailed(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Missing or malformed request field
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("You need to login first. Use 'beacon login <userAddress>'")]
    LoginRequired,

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Setup errors end the CLI process with a nonzero exit code
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Error::LoginRequired | Error::Config(_))
    }
}

/// Result type alias using Beacon's Error type
pub type Result<T> = std::result::Result<T, Error>;
