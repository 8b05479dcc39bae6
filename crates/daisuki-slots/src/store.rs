//! Storage collaborator seam.
//!
//! All calls may fail for reasons unrelated to the business rules
//! ([`StoreError`]); domain outcomes such as a full kanji come back as values.

use crate::claimant::{Claimant, NewAttempt, SelectionAttempt};
use crate::error::StoreResult;
use crate::kanji::Kanji;
use crate::{AttemptId, KanjiId};
use serde::{Deserialize, Serialize};

/// Result of a conditional capacity increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Usage was below the limit and is now `capacity_used`.
    Admitted { capacity_used: u32 },
    /// Usage was already at or above the limit; nothing changed.
    Exceeded { capacity_used: u32 },
    /// No such kanji.
    Missing,
}

/// Everything the commit step needs to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCommit {
    pub user_id: String,
    pub kanji_id: KanjiId,
    pub attempt_id: AttemptId,
    pub limit: u32,
    pub committed_at: u64,
}

/// A successfully committed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub user_id: String,
    pub kanji_id: KanjiId,
    pub attempt_id: AttemptId,
    /// Kanji usage after this claim
    pub capacity_used: u32,
    pub finalized_at: u64,
}

/// Which record a commit could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRecord {
    Kanji,
    Claimant,
    Attempt,
}

impl std::fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kanji => write!(f, "kanji"),
            Self::Claimant => write!(f, "claimant"),
            Self::Attempt => write!(f, "selection attempt"),
        }
    }
}

/// Result of [`SlotStore::commit_claim`]. Anything but `Committed` means no
/// write happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Claim),
    CapacityExceeded { capacity_used: u32 },
    AlreadyFinalized,
    Missing(MissingRecord),
}

/// Persistent store for kanji, claimants and selection attempts.
///
/// Implementations must make [`try_increment_capacity`](Self::try_increment_capacity)
/// and [`commit_claim`](Self::commit_claim) atomic with respect to every other
/// caller: the check against `limit` and the increment happen in one step.
/// A finalized claimant binding may only change through
/// [`release_claim`](Self::release_claim); `upsert_claimant` rejects such
/// writes with [`StoreError::Conflict`](crate::StoreError::Conflict).
pub trait SlotStore: Send + Sync {
    /// Fetch one kanji.
    fn get_kanji(&self, id: KanjiId) -> StoreResult<Option<Kanji>>;

    /// Every kanji, ordered by id.
    fn list_kanjis(&self) -> StoreResult<Vec<Kanji>>;

    /// Increment usage by one only if it is below `limit`.
    fn try_increment_capacity(&self, id: KanjiId, limit: u32) -> StoreResult<IncrementOutcome>;

    /// Fetch a claimant.
    fn get_claimant(&self, user_id: &str) -> StoreResult<Option<Claimant>>;

    /// Create or overwrite the claimant's selection fields.
    fn upsert_claimant(&self, claimant: &Claimant) -> StoreResult<()>;

    /// Persist a new unfinalized attempt.
    fn insert_attempt(&self, attempt: NewAttempt) -> StoreResult<SelectionAttempt>;

    /// A user's attempts, oldest first.
    fn list_attempts(&self, user_id: &str) -> StoreResult<Vec<SelectionAttempt>>;

    /// Mark one attempt finalized. Returns false if it does not exist.
    fn finalize_attempt(&self, id: AttemptId) -> StoreResult<bool>;

    /// The finalize step as one transaction: conditional increment, claimant
    /// update and attempt finalization all apply, or none do.
    fn commit_claim(&self, commit: &ClaimCommit) -> StoreResult<CommitOutcome>;

    /// Return a finalized claimant's slot to the pool and clear its binding,
    /// in one transaction. Returns the released kanji, if one was held.
    fn release_claim(&self, user_id: &str) -> StoreResult<Option<KanjiId>>;
}
