//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// TLS walkthrough error type
#[derive(Error, Debug)]
pub enum WalkthroughError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL library error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// External `openssl` command failed
    #[error("Command `{command}` failed: {stderr}")]
    Command {
        /// The command line that was executed
        command: String,
        /// Captured standard error of the command
        stderr: String,
    },

    /// A walkthrough step was attempted out of order
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A file or item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation did not finish in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed HTTP exchange
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `WalkthroughError`.
pub type Result<T> = std::result::Result<T, WalkthroughError>;
