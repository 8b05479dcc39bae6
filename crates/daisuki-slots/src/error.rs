//! Error types for slot allocation.

use crate::KanjiId;
use thiserror::Error;

/// Result type for allocator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for storage collaborator calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of the storage collaborator, independent of business rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or the write did not go through.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The write would alter a finalized claim.
    #[error("conflicts with a finalized claim: {0}")]
    Conflict(String),
}

/// Errors surfaced by the [`SlotAllocator`](crate::SlotAllocator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Every slot of the kanji is taken. The flow is back in `Browsing`.
    #[error("kanji {glyph} (#{kanji_id}) already has {limit} holders")]
    CapacityExceeded {
        kanji_id: KanjiId,
        glyph: char,
        limit: u32,
    },

    /// The kanji does not exist.
    #[error("unknown kanji #{0}")]
    UnknownKanji(KanjiId),

    /// No claimant record for this user.
    #[error("unknown claimant {0}")]
    UnknownClaimant(String),

    /// The claimant already holds a finalized kanji and may not choose again.
    #[error("claimant {0} already holds a finalized kanji")]
    AlreadyFinalized(String),

    /// The operation is not legal in the flow's current state.
    #[error("invalid selection state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Stored data contradicts an allocator invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether the user can reasonably try again (another kanji, or the same
    /// call once storage is back).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CapacityExceeded { .. } | Error::Store(StoreError::Unavailable(_))
        )
    }

    /// Whether the error sent the flow back to `Browsing`.
    pub fn resets_flow(&self) -> bool {
        matches!(self, Error::CapacityExceeded { .. } | Error::UnknownKanji(_))
    }
}
