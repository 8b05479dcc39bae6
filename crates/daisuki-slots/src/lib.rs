//! Daisuki Slot Allocation
//!
//! Every kanji is a shared, scarce emblem: at most [`CAPACITY_LIMIT`] users may
//! ever hold it. A user picks one through a multi-step flow and the final step
//! consumes a slot.
//!
//! # Selection Flow
//!
//! ```text
//! Browsing ──select──▶ Tentative ──confirm──▶ Confirmed ──reason──▶ Annotated ──finalize──▶ Finalized
//!     ▲                    │                                           │
//!     └──── capacity exceeded (confirm is advisory, finalize is authoritative)
//! ```
//!
//! - **select**: pick a kanji. Nothing is written.
//! - **confirm**: re-read the kanji's current usage and bail out early if it
//!   filled up since it was displayed. Advisory only.
//! - **reason**: persist an unfinalized [`SelectionAttempt`] and bind the
//!   claimant's `selected_kanji_id`.
//! - **finalize**: one storage transaction that increments usage only if it
//!   is below the limit, marks the claimant finalized and finalizes the
//!   attempt. This conditional increment is the single point of admission.
//!
//! # Storage Seam
//!
//! [`SlotStore`] is the only synchronization point between claimants. The
//! in-crate [`MemorySlotStore`] implements it under a mutex; the node crate
//! implements it over RocksDB transactions.

mod allocator;
mod claimant;
mod error;
mod flow;
mod kanji;
mod memory;
mod store;

pub use allocator::SlotAllocator;
pub use claimant::{Claimant, NewAttempt, SelectionAttempt};
pub use error::{Error, Result, StoreError, StoreResult};
pub use flow::{SelectionFlow, SelectionState};
pub use kanji::{Kanji, KanjiFilter};
pub use memory::MemorySlotStore;
pub use store::{Claim, ClaimCommit, CommitOutcome, IncrementOutcome, MissingRecord, SlotStore};

/// Identifier of a kanji in the catalog.
pub type KanjiId = u32;

/// Identifier of a selection attempt.
pub type AttemptId = u64;

/// Maximum number of holders per kanji.
pub const CAPACITY_LIMIT: u32 = 10;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
