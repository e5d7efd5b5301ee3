//! Error types for dockhand-core
//!
//! Every failure surfaced by the filesystem bridge carries a distinct kind;
//! the API layer maps each kind to its own status code. Nothing in the
//! bridge retries internally.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Requested path is not absolute
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Container does not exist (or could not be resolved by id/name)
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Path exists neither as a mount-backed host path nor inside the container
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Residual relative path contained a `..` segment
    #[error("path traversal detected")]
    TraversalDetected,

    /// Listing was requested on something that is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// File content was requested on a directory
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Text view requested over a file larger than the cap
    #[error("file too large to view (max {max} bytes)")]
    TooLarge {
        /// Maximum viewable size in bytes
        max: u64,
    },

    /// Content cannot be interpreted as UTF-8 text
    #[error("binary file not supported")]
    BinaryNotSupported,

    /// Write target's parent directory is absent (host or container side)
    #[error("parent directory not found: {0}")]
    ParentDirectoryMissing(String),

    /// A `docker run` command string could not be parsed
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Archive upload rejected by the runtime
    #[error("archive upload failed: {0}")]
    UploadFailed(String),

    /// Runtime client failure, message passed through
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Host filesystem I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Key store / database failure
    #[error("store error: {0}")]
    Store(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(err: bollard::errors::Error) -> Self {
        Error::Runtime(err.to_string())
    }
}
