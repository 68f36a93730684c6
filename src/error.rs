//! Error types for sftp-walker
//!
//! This module defines the error hierarchy that covers:
//! - Remote session errors (connection, authentication, listing, transfer)
//! - Configuration and validation errors
//! - Worker thread errors
//!
//! Permission failures are the only remote errors whose handling depends on
//! the configured [`ErrorPolicy`](crate::walker::ErrorPolicy); everything
//! else is either always fatal or, for vanished subdirectories, skipped.

use thiserror::Error;

/// Top-level error type for sftp-walker
#[derive(Error, Debug)]
pub enum WalkError {
    /// Remote session errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration and validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Local I/O errors (download targets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalkError {
    /// Returns the underlying remote error, if any
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            WalkError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Remote session and SFTP errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// TCP/SSH connection could not be established
    #[error("Failed to connect to '{host}': {reason}")]
    ConnectionFailed { host: String, reason: String },

    /// Server rejected the credentials
    #[error("Authentication failed for user '{user}' on '{host}'")]
    Authentication { host: String, user: String },

    /// Connection attempt exceeded the configured timeout
    #[error("Connection to '{host}' timed out after {secs}s")]
    Timeout { host: String, secs: u64 },

    /// Private key could not be decoded
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Opening an SFTP channel failed
    #[error("Failed to open SFTP channel: {0}")]
    ChannelFailed(String),

    /// Path does not exist
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Generic I/O failure during a transfer
    #[error("I/O failure on '{path}': {reason}")]
    Io { path: String, reason: String },

    /// Any other SFTP status or protocol failure
    #[error("SFTP error on '{path}': {message}")]
    Protocol { path: String, message: String },
}

impl RemoteError {
    /// Check if this error is a permission failure (policy-driven)
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied { .. })
    }

    /// Check if this error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// Check if a connection attempt may be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionFailed { .. } | RemoteError::Timeout { .. }
        )
    }
}

/// Configuration and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Max matches below -1
    #[error("Invalid max matches {0}: must be -1 (unlimited) or greater")]
    InvalidMaxMatches(i64),

    /// Missing or malformed connection target
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Credentials missing for the selected authentication method
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Unknown error handling policy
    #[error("Invalid error handling '{0}': expected ignore, warning or error")]
    InvalidErrorPolicy(String),

    /// Unknown authentication method
    #[error("Invalid authentication method '{0}': expected password, key or key-with-password")]
    InvalidAuthMethod(String),

    /// Download directory unusable
    #[error("Invalid download directory '{path}': {reason}")]
    InvalidDownloadDir { path: String, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Result type alias for WalkError
pub type Result<T> = std::result::Result<T, WalkError>;

/// Result type alias for RemoteError
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
