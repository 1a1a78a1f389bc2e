//! Error types for the mail index.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MailIndexError>;

/// Errors raised by the index, its storage backends and the query engine.
///
/// Free-text queries never fail to parse: a query that yields no usable term
/// simply matches nothing, so there is no parse variant here.
#[derive(Error, Debug)]
pub enum MailIndexError {
    /// A caller passed an argument the index cannot accept (e.g. an empty doc id).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The persisted store could not be opened: inaccessible path, corrupt
    /// files, or the store lock is held by another instance.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persisting a commit failed. Staged changes remain pending and the last
    /// published snapshot remains valid.
    #[error("Commit failed: {0}")]
    CommitFailure(String),

    /// Low-level storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// On-disk data failed validation (bad magic, version or checksum).
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MailIndexError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        MailIndexError::InvalidArgument(msg.into())
    }

    pub fn store_unavailable<S: Into<String>>(msg: S) -> Self {
        MailIndexError::StoreUnavailable(msg.into())
    }

    pub fn commit_failure<S: Into<String>>(msg: S) -> Self {
        MailIndexError::CommitFailure(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        MailIndexError::Storage(msg.into())
    }

    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        MailIndexError::Corrupt(msg.into())
    }

    /// Re-classify an error raised while opening the store.
    ///
    /// Argument errors pass through unchanged; everything else becomes
    /// [`MailIndexError::StoreUnavailable`].
    pub(crate) fn into_store_unavailable(self) -> Self {
        match self {
            e @ (MailIndexError::StoreUnavailable(_) | MailIndexError::InvalidArgument(_)) => e,
            other => MailIndexError::StoreUnavailable(other.to_string()),
        }
    }

    /// Re-classify an error raised while persisting a commit.
    pub(crate) fn into_commit_failure(self) -> Self {
        match self {
            e @ MailIndexError::CommitFailure(_) => e,
            other => MailIndexError::CommitFailure(other.to_string()),
        }
    }
}
