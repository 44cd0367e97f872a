//! Error types for fernetfs.

use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for fernetfs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fernetfs operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Master record, directory, or listing entry already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Master record, listing entry, or backing file is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A multi-segment or otherwise malformed name where a single segment is required.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Wrong secret or tampered container. The two cases cannot be told apart.
    #[error("Authentication failed: wrong secret or corrupted data")]
    Authentication,

    /// Malformed container or listing payload.
    #[error("Format error: {0}")]
    Format(String),

    /// Rejected tunable parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Key derivation error.
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Change-notification facility failure.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The external edit command exited unsuccessfully.
    #[error("Command `{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    /// RAM edit session used out of order.
    #[error("Edit session error: {0}")]
    Session(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Format(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Format(e.to_string())
    }
}

impl Error {
    /// Whether this error means "the thing is not there", either from a
    /// listing lookup or from the OS.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
