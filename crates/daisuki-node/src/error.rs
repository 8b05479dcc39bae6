//! Error types for the Daisuki node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No user id on a request that needs one
    #[error("Sign-in required")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Write conflicts with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Text failed the Japanese-only gate
    #[error(transparent)]
    Rejected(#[from] daisuki_gate::Rejection),

    /// Slot allocation error
    #[error(transparent)]
    Slot(#[from] daisuki_slots::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<daisuki_slots::StoreError> for Error {
    fn from(e: daisuki_slots::StoreError) -> Self {
        Error::Slot(e.into())
    }
}

/// Storage failures seen through the slot allocator's seam.
impl From<Error> for daisuki_slots::StoreError {
    fn from(e: Error) -> Self {
        match e {
            Error::Serialization(e) => daisuki_slots::StoreError::Corrupt(e.to_string()),
            Error::Conflict(msg) => daisuki_slots::StoreError::Conflict(msg),
            Error::Slot(daisuki_slots::Error::Store(inner)) => inner,
            other => daisuki_slots::StoreError::Unavailable(other.to_string()),
        }
    }
}
