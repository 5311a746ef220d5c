//! Error types for reel-core

use thiserror::Error;

/// Result type alias using reel-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reel-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Requested log/document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A single or batched write to the remote store did not complete
    #[error("Transaction failed: {0}")]
    FailedTransaction(String),

    /// Generic transport/service failure
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local to remote migration aborted; local logs were left in place
    #[error("Log migration failed after {created} remote creation(s): {source}")]
    Migration {
        created: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether this error means "nothing to show" rather than "something went wrong".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Re-tag a store failure that happened while writing.
    ///
    /// `NotFound` and already-tagged write failures pass through unchanged.
    #[must_use]
    pub fn into_write_failure(self) -> Self {
        match self {
            Self::NotFound(_) | Self::FailedTransaction(_) | Self::InvalidInput(_) => self,
            other => Self::FailedTransaction(other.to_string()),
        }
    }

    /// Re-tag a store failure that happened while reading.
    #[must_use]
    pub fn into_read_failure(self) -> Self {
        match self {
            Self::NotFound(_) | Self::RequestFailed(_) | Self::InvalidInput(_) => self,
            other => Self::RequestFailed(other.to_string()),
        }
    }
}
