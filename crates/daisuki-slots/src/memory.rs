//! In-memory [`SlotStore`] guarded by a single mutex.
//!
//! Holding the lock for the whole of each call gives the same atomicity a
//! transactional store provides: the capacity check and increment in
//! `commit_claim` can never interleave with another claimant's.

use crate::claimant::{Claimant, NewAttempt, SelectionAttempt};
use crate::error::{StoreError, StoreResult};
use crate::kanji::Kanji;
use crate::store::{Claim, ClaimCommit, CommitOutcome, IncrementOutcome, MissingRecord, SlotStore};
use crate::{AttemptId, KanjiId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    kanjis: BTreeMap<KanjiId, Kanji>,
    claimants: HashMap<String, Claimant>,
    attempts: BTreeMap<AttemptId, SelectionAttempt>,
    next_attempt_id: AttemptId,
}

impl Tables {
    fn increment(&mut self, id: KanjiId, limit: u32) -> IncrementOutcome {
        match self.kanjis.get_mut(&id) {
            None => IncrementOutcome::Missing,
            Some(kanji) if kanji.capacity_used >= limit => IncrementOutcome::Exceeded {
                capacity_used: kanji.capacity_used,
            },
            Some(kanji) => {
                kanji.capacity_used += 1;
                IncrementOutcome::Admitted {
                    capacity_used: kanji.capacity_used,
                }
            }
        }
    }
}

/// Mutex-backed store for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    tables: Mutex<Tables>,
}

impl MemorySlotStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a catalog.
    pub fn with_kanjis(kanjis: impl IntoIterator<Item = Kanji>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            tables.kanjis = kanjis.into_iter().map(|k| (k.id, k)).collect();
        }
        store
    }

    /// Insert or replace a kanji.
    pub fn put_kanji(&self, kanji: Kanji) -> StoreResult<()> {
        self.lock()?.kanjis.insert(kanji.id, kanji);
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl SlotStore for MemorySlotStore {
    fn get_kanji(&self, id: KanjiId) -> StoreResult<Option<Kanji>> {
        Ok(self.lock()?.kanjis.get(&id).cloned())
    }

    fn list_kanjis(&self) -> StoreResult<Vec<Kanji>> {
        Ok(self.lock()?.kanjis.values().cloned().collect())
    }

    fn try_increment_capacity(&self, id: KanjiId, limit: u32) -> StoreResult<IncrementOutcome> {
        Ok(self.lock()?.increment(id, limit))
    }

    fn get_claimant(&self, user_id: &str) -> StoreResult<Option<Claimant>> {
        Ok(self.lock()?.claimants.get(user_id).cloned())
    }

    fn upsert_claimant(&self, claimant: &Claimant) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables.claimants.get(&claimant.user_id) {
            if existing.has_finalized_claim && existing != claimant {
                return Err(StoreError::Conflict(claimant.user_id.clone()));
            }
        }
        tables
            .claimants
            .insert(claimant.user_id.clone(), claimant.clone());
        Ok(())
    }

    fn insert_attempt(&self, attempt: NewAttempt) -> StoreResult<SelectionAttempt> {
        let mut tables = self.lock()?;
        tables.next_attempt_id += 1;
        let attempt = attempt.into_attempt(tables.next_attempt_id);
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    fn list_attempts(&self, user_id: &str) -> StoreResult<Vec<SelectionAttempt>> {
        Ok(self
            .lock()?
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn finalize_attempt(&self, id: AttemptId) -> StoreResult<bool> {
        Ok(match self.lock()?.attempts.get_mut(&id) {
            Some(attempt) => {
                attempt.is_finalized = true;
                true
            }
            None => false,
        })
    }

    fn commit_claim(&self, commit: &ClaimCommit) -> StoreResult<CommitOutcome> {
        let mut tables = self.lock()?;

        // Preconditions first; nothing is written unless all hold.
        match tables.claimants.get(&commit.user_id) {
            None => return Ok(CommitOutcome::Missing(MissingRecord::Claimant)),
            Some(c) if c.has_finalized_claim => return Ok(CommitOutcome::AlreadyFinalized),
            Some(_) => {}
        }
        let attempt_ok = tables.attempts.get(&commit.attempt_id).is_some_and(|a| {
            a.user_id == commit.user_id && a.kanji_id == commit.kanji_id && !a.is_finalized
        });
        if !attempt_ok {
            return Ok(CommitOutcome::Missing(MissingRecord::Attempt));
        }

        let capacity_used = match tables.increment(commit.kanji_id, commit.limit) {
            IncrementOutcome::Admitted { capacity_used } => capacity_used,
            IncrementOutcome::Exceeded { capacity_used } => {
                return Ok(CommitOutcome::CapacityExceeded { capacity_used })
            }
            IncrementOutcome::Missing => return Ok(CommitOutcome::Missing(MissingRecord::Kanji)),
        };

        if let Some(claimant) = tables.claimants.get_mut(&commit.user_id) {
            claimant.selected_kanji_id = Some(commit.kanji_id);
            claimant.has_finalized_claim = true;
        }
        if let Some(attempt) = tables.attempts.get_mut(&commit.attempt_id) {
            attempt.is_finalized = true;
        }

        Ok(CommitOutcome::Committed(Claim {
            user_id: commit.user_id.clone(),
            kanji_id: commit.kanji_id,
            attempt_id: commit.attempt_id,
            capacity_used,
            finalized_at: commit.committed_at,
        }))
    }

    fn release_claim(&self, user_id: &str) -> StoreResult<Option<KanjiId>> {
        let mut tables = self.lock()?;
        let Some(claimant) = tables.claimants.get(user_id).cloned() else {
            return Ok(None);
        };
        let released = claimant.held_kanji();

        if let Some(kanji_id) = released {
            if let Some(kanji) = tables.kanjis.get_mut(&kanji_id) {
                kanji.capacity_used = kanji.capacity_used.saturating_sub(1);
            }
            for attempt in tables.attempts.values_mut() {
                if attempt.user_id == user_id {
                    attempt.is_finalized = false;
                }
            }
        }
        tables
            .claimants
            .insert(user_id.to_string(), Claimant::new(user_id));
        Ok(released)
    }
}
