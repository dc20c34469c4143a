//! Error types for archive operations.

use thiserror::Error;

/// Errors raised by a directory capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// IO error from the backing storage.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The named file does not exist and creation was not requested.
    #[error("file not found: {0}")]
    NotFound(String),
    /// The host refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// File names must be a single path component.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    /// The descriptor belongs to a capability kind this resolver cannot open.
    #[error("unsupported capability kind: {0}")]
    Unsupported(String),
}

/// Errors raised by handle persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored descriptor could not be turned back into a capability.
    #[error("failed to resolve stored capability: {0}")]
    Resolve(#[from] CapabilityError),
}

/// Errors returned by the archive engine.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Capability IO failure.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),
    /// Handle persistence failure.
    #[error("handle store error: {0}")]
    Store(#[from] StoreError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Timestamp outside the representable calendar range.
    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(i64),
    /// Writing a date group failed; the whole batch was re-queued.
    #[error("flush failed for {date} ({requeued} messages re-queued): {source}")]
    Flush {
        date: String,
        requeued: usize,
        #[source]
        source: Box<ArchiveError>,
    },
}
