//! Error types shared by the tracelens crates.

use thiserror::Error;

/// Boxed source error raised by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Tracelens error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The session storage collaborator failed.
    #[error("Session storage error: {0}")]
    Storage(#[source] BoxError),

    /// The results authorization policy failed.
    #[error("Authorization error: {0}")]
    Authorization(#[source] BoxError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(uuid::Uuid),

    /// Stored data does not describe a valid session, e.g. a timing record
    /// whose depth has no parent.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Wrap a storage backend failure.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Wrap an authorization policy failure.
    pub fn authorization(err: impl Into<BoxError>) -> Self {
        Self::Authorization(err.into())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
