//! Slot allocator - drives a claimant through the selection flow.
//!
//! The allocator holds no state of its own beyond the store handle; every
//! flow is an explicit [`SelectionFlow`] value owned by the caller. No step
//! retries internally.

use crate::claimant::{Claimant, NewAttempt, SelectionAttempt};
use crate::error::{Error, Result};
use crate::flow::{SelectionFlow, SelectionState};
use crate::kanji::{Kanji, KanjiFilter};
use crate::store::{Claim, ClaimCommit, CommitOutcome, MissingRecord, SlotStore};
use crate::{unix_now, KanjiId, CAPACITY_LIMIT};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mediates kanji selection and claiming over a [`SlotStore`].
#[derive(Debug)]
pub struct SlotAllocator<S> {
    store: Arc<S>,
    limit: u32,
}

impl<S> Clone for SlotAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limit: self.limit,
        }
    }
}

impl<S: SlotStore> SlotAllocator<S> {
    /// Create an allocator enforcing [`CAPACITY_LIMIT`].
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            limit: CAPACITY_LIMIT,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The catalog, filtered.
    pub fn catalog(&self, filter: &KanjiFilter) -> Result<Vec<Kanji>> {
        Ok(filter.apply(self.store.list_kanjis()?))
    }

    /// Start (or resume) the wizard for a user.
    ///
    /// Finalized claimants are turned away. A claimant that already persisted
    /// an unfinalized attempt for its bound kanji resumes at the commit step.
    pub fn begin(&self, user_id: &str) -> Result<SelectionFlow> {
        let claimant = self.claimant(user_id)?;
        if claimant.has_finalized_claim {
            return Err(Error::AlreadyFinalized(user_id.to_string()));
        }

        if let Some(kanji_id) = claimant.selected_kanji_id {
            let pending = self
                .store
                .list_attempts(user_id)?
                .into_iter()
                .rev()
                .find(|a| a.kanji_id == kanji_id && !a.is_finalized);
            if let (Some(attempt), Some(kanji)) = (pending, self.store.get_kanji(kanji_id)?) {
                debug!(user = %user_id, kanji = %kanji.glyph, "Resuming selection at commit step");
                return Ok(SelectionFlow::new(
                    user_id,
                    SelectionState::Annotated { kanji, attempt },
                ));
            }
        }

        Ok(SelectionFlow::new(user_id, SelectionState::Browsing))
    }

    /// Choose a kanji locally. Legal from any non-finalized state; selecting
    /// again simply replaces the choice. Writes nothing.
    pub fn select_tentative(&self, flow: &mut SelectionFlow, kanji_id: KanjiId) -> Result<()> {
        if flow.state().is_finalized() {
            return Err(Error::AlreadyFinalized(flow.user_id().to_string()));
        }
        if self.claimant(flow.user_id())?.has_finalized_claim {
            return Err(Error::AlreadyFinalized(flow.user_id().to_string()));
        }

        let Some(kanji) = self.store.get_kanji(kanji_id)? else {
            flow.set(SelectionState::Browsing);
            return Err(Error::UnknownKanji(kanji_id));
        };

        debug!(user = %flow.user_id(), kanji = %kanji.glyph, from = flow.state().name(), "Tentative selection");
        flow.set(SelectionState::Tentative { kanji });
        Ok(())
    }

    /// Advance past step one after re-reading the kanji's current usage.
    ///
    /// This check is advisory: it gives early feedback but admission is
    /// decided only in [`finalize`](Self::finalize).
    pub fn confirm_tentative(&self, flow: &mut SelectionFlow) -> Result<()> {
        let SelectionState::Tentative { kanji } = flow.state() else {
            return Err(invalid("tentative", flow.state()));
        };
        let kanji_id = kanji.id;

        let Some(fresh) = self.store.get_kanji(kanji_id)? else {
            flow.reset();
            return Err(Error::UnknownKanji(kanji_id));
        };

        if fresh.capacity_used >= self.limit {
            warn!(user = %flow.user_id(), kanji = %fresh.glyph, used = fresh.capacity_used, "Kanji filled up before confirmation");
            flow.reset();
            return Err(Error::CapacityExceeded {
                kanji_id,
                glyph: fresh.glyph,
                limit: self.limit,
            });
        }

        debug!(user = %flow.user_id(), kanji = %fresh.glyph, used = fresh.capacity_used, "Selection confirmed");
        flow.set(SelectionState::Confirmed { kanji: fresh });
        Ok(())
    }

    /// Persist the attempt with an optional reason and bind the claimant's
    /// selection. The reason is free text in any language.
    ///
    /// On a storage error the flow stays in `Confirmed`; a retry inserts a
    /// fresh attempt and never relies on the failed write.
    pub fn record_reason(
        &self,
        flow: &mut SelectionFlow,
        reason: Option<String>,
    ) -> Result<SelectionAttempt> {
        let SelectionState::Confirmed { kanji } = flow.state() else {
            return Err(invalid("confirmed", flow.state()));
        };
        let kanji = kanji.clone();

        let claimant = self.claimant(flow.user_id())?;
        if claimant.has_finalized_claim {
            return Err(Error::AlreadyFinalized(flow.user_id().to_string()));
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let attempt = self.store.insert_attempt(NewAttempt {
            user_id: flow.user_id().to_string(),
            kanji_id: kanji.id,
            reason,
            selected_at: unix_now(),
        })?;

        self.store.upsert_claimant(&Claimant {
            selected_kanji_id: Some(kanji.id),
            ..claimant
        })?;

        debug!(user = %flow.user_id(), kanji = %kanji.glyph, attempt = attempt.id, "Selection recorded");
        flow.set(SelectionState::Annotated {
            kanji,
            attempt: attempt.clone(),
        });
        Ok(attempt)
    }

    /// Commit the claim: consume one slot, finalize the claimant and the
    /// attempt, all in one storage transaction.
    ///
    /// If the kanji is full the flow returns to `Browsing` and the caller
    /// must pick again. Any other failure leaves the flow where it was.
    pub fn finalize(&self, flow: &mut SelectionFlow) -> Result<Claim> {
        let SelectionState::Annotated { kanji, attempt } = flow.state() else {
            return Err(invalid("annotated", flow.state()));
        };
        let (kanji, attempt_id) = (kanji.clone(), attempt.id);

        if self.claimant(flow.user_id())?.has_finalized_claim {
            return Err(Error::AlreadyFinalized(flow.user_id().to_string()));
        }

        let commit = ClaimCommit {
            user_id: flow.user_id().to_string(),
            kanji_id: kanji.id,
            attempt_id,
            limit: self.limit,
            committed_at: unix_now(),
        };

        match self.store.commit_claim(&commit)? {
            CommitOutcome::Committed(claim) => {
                if claim.capacity_used > self.limit {
                    return Err(Error::InvariantViolation(format!(
                        "kanji #{} reports {} holders after commit (limit {})",
                        claim.kanji_id, claim.capacity_used, self.limit
                    )));
                }
                info!(
                    user = %claim.user_id,
                    kanji = %kanji.glyph,
                    used = claim.capacity_used,
                    "Kanji claim finalized"
                );
                let kanji = Kanji {
                    capacity_used: claim.capacity_used,
                    ..kanji
                };
                flow.set(SelectionState::Finalized {
                    kanji,
                    claim: claim.clone(),
                });
                Ok(claim)
            }
            CommitOutcome::CapacityExceeded { capacity_used } => {
                warn!(user = %flow.user_id(), kanji = %kanji.glyph, used = capacity_used, "Kanji full at commit");
                flow.reset();
                Err(Error::CapacityExceeded {
                    kanji_id: kanji.id,
                    glyph: kanji.glyph,
                    limit: self.limit,
                })
            }
            CommitOutcome::AlreadyFinalized => {
                Err(Error::AlreadyFinalized(flow.user_id().to_string()))
            }
            CommitOutcome::Missing(MissingRecord::Kanji) => {
                flow.reset();
                Err(Error::UnknownKanji(kanji.id))
            }
            CommitOutcome::Missing(MissingRecord::Claimant) => {
                Err(Error::UnknownClaimant(flow.user_id().to_string()))
            }
            CommitOutcome::Missing(MissingRecord::Attempt) => Err(Error::InvariantViolation(
                format!("attempt #{attempt_id} no longer matches the flow"),
            )),
        }
    }

    /// Administrative release of a user's slot. Not reachable from the
    /// selection flow.
    pub fn release(&self, user_id: &str) -> Result<Option<KanjiId>> {
        let released = self.store.release_claim(user_id)?;
        if let Some(kanji_id) = released {
            info!(user = %user_id, kanji = kanji_id, "Kanji slot released");
        }
        Ok(released)
    }

    fn claimant(&self, user_id: &str) -> Result<Claimant> {
        self.store
            .get_claimant(user_id)?
            .ok_or_else(|| Error::UnknownClaimant(user_id.to_string()))
    }
}

fn invalid(expected: &'static str, actual: &SelectionState) -> Error {
    Error::InvalidState {
        expected,
        actual: actual.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::memory::MemorySlotStore;
    use crate::store::IncrementOutcome;
    use crate::AttemptId;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    fn setup(kanjis: Vec<Kanji>, users: &[&str]) -> SlotAllocator<MemorySlotStore> {
        let store = MemorySlotStore::with_kanjis(kanjis);
        for user in users {
            store.upsert_claimant(&Claimant::new(*user)).unwrap();
        }
        SlotAllocator::new(Arc::new(store))
    }

    fn annotated(alloc: &SlotAllocator<MemorySlotStore>, user: &str, kanji: KanjiId) -> SelectionFlow {
        let mut flow = alloc.begin(user).unwrap();
        alloc.select_tentative(&mut flow, kanji).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();
        alloc.record_reason(&mut flow, None).unwrap();
        flow
    }

    #[test]
    fn full_flow() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        assert_eq!(flow.state(), &SelectionState::Browsing);

        alloc.select_tentative(&mut flow, 1).unwrap();
        assert_eq!(flow.state().name(), "tentative");

        alloc.confirm_tentative(&mut flow).unwrap();
        assert_eq!(flow.state().name(), "confirmed");

        let attempt = alloc
            .record_reason(&mut flow, Some("  I love this one  ".into()))
            .unwrap();
        assert_eq!(attempt.reason.as_deref(), Some("I love this one"));
        assert_eq!(flow.state().name(), "annotated");

        let claimant = alloc.store().get_claimant("u1").unwrap().unwrap();
        assert_eq!(claimant.selected_kanji_id, Some(1));
        assert!(!claimant.has_finalized_claim);
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 0);

        let claim = alloc.finalize(&mut flow).unwrap();
        assert_eq!(claim.capacity_used, 1);
        assert!(flow.state().is_finalized());

        let claimant = alloc.store().get_claimant("u1").unwrap().unwrap();
        assert_eq!(claimant.held_kanji(), Some(1));
        let attempts = alloc.store().list_attempts("u1").unwrap();
        assert_eq!(attempts.iter().filter(|a| a.is_finalized).count(), 1);
    }

    #[test]
    fn blank_reason_is_none() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();
        let attempt = alloc.record_reason(&mut flow, Some("   ".into())).unwrap();
        assert_eq!(attempt.reason, None);
    }

    #[test]
    fn reason_in_any_language() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();
        let attempt = alloc
            .record_reason(&mut flow, Some("Because it means love".into()))
            .unwrap();
        assert_eq!(attempt.reason.as_deref(), Some("Because it means love"));
    }

    #[test]
    fn confirm_on_full_kanji_returns_to_browsing() {
        let alloc = setup(
            vec![Kanji::new(1, '愛').with_capacity_used(CAPACITY_LIMIT)],
            &["u1"],
        );
        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();

        let err = alloc.confirm_tentative(&mut flow).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { kanji_id: 1, .. }));
        assert!(err.resets_flow());
        assert_eq!(flow.state(), &SelectionState::Browsing);
    }

    #[test]
    fn confirm_rereads_capacity() {
        let alloc = setup(vec![Kanji::new(1, '愛').with_capacity_used(9)], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();

        // Someone else takes the last slot after the kanji was displayed.
        assert_eq!(
            alloc.store().try_increment_capacity(1, CAPACITY_LIMIT).unwrap(),
            IncrementOutcome::Admitted { capacity_used: 10 }
        );

        assert!(matches!(
            alloc.confirm_tentative(&mut flow),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(flow.state(), &SelectionState::Browsing);
    }

    #[test]
    fn repeated_select_writes_nothing() {
        let alloc = setup(vec![Kanji::new(1, '愛'), Kanji::new(2, '夢')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        for _ in 0..3 {
            alloc.select_tentative(&mut flow, 1).unwrap();
        }
        alloc.select_tentative(&mut flow, 2).unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();

        assert!(alloc.store().list_attempts("u1").unwrap().is_empty());
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 0);
        assert_eq!(
            alloc.store().get_claimant("u1").unwrap().unwrap(),
            Claimant::new("u1")
        );
        assert_eq!(flow.state().kanji().map(|k| k.id), Some(1));
    }

    #[test]
    fn unknown_kanji_rejected() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();
        assert_eq!(
            alloc.select_tentative(&mut flow, 42),
            Err(Error::UnknownKanji(42))
        );
        assert_eq!(flow.state(), &SelectionState::Browsing);
    }

    #[test]
    fn unknown_claimant_rejected() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &[]);
        assert!(matches!(alloc.begin("ghost"), Err(Error::UnknownClaimant(_))));
    }

    #[test]
    fn illegal_transitions_rejected() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let mut flow = alloc.begin("u1").unwrap();

        assert_eq!(
            alloc.finalize(&mut flow),
            Err(Error::InvalidState {
                expected: "annotated",
                actual: "browsing"
            })
        );
        assert!(matches!(
            alloc.confirm_tentative(&mut flow),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            alloc.record_reason(&mut flow, None),
            Err(Error::InvalidState { .. })
        ));

        alloc.select_tentative(&mut flow, 1).unwrap();
        assert!(matches!(
            alloc.record_reason(&mut flow, None),
            Err(Error::InvalidState {
                expected: "confirmed",
                actual: "tentative"
            })
        ));
        assert_eq!(flow.state().name(), "tentative");
    }

    #[test]
    fn finalized_claimant_cannot_reenter() {
        let alloc = setup(vec![Kanji::new(1, '愛'), Kanji::new(2, '夢')], &["u1"]);
        let mut flow = annotated(&alloc, "u1", 1);
        alloc.finalize(&mut flow).unwrap();

        assert_eq!(
            alloc.begin("u1"),
            Err(Error::AlreadyFinalized("u1".into()))
        );
        assert_eq!(
            alloc.select_tentative(&mut flow, 2),
            Err(Error::AlreadyFinalized("u1".into()))
        );
        assert!(matches!(
            alloc.finalize(&mut flow),
            Err(Error::InvalidState { .. })
        ));

        let claimant = alloc.store().get_claimant("u1").unwrap().unwrap();
        assert_eq!(claimant.held_kanji(), Some(1));
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 1);
        assert_eq!(alloc.store().get_kanji(2).unwrap().unwrap().capacity_used, 0);
    }

    #[test]
    fn stale_flow_from_second_session_is_rejected() {
        let alloc = setup(vec![Kanji::new(1, '愛'), Kanji::new(2, '夢')], &["u1"]);
        let mut first = annotated(&alloc, "u1", 1);
        let mut second = annotated(&alloc, "u1", 2);

        alloc.finalize(&mut first).unwrap();
        assert_eq!(
            alloc.finalize(&mut second),
            Err(Error::AlreadyFinalized("u1".into()))
        );
        assert_eq!(alloc.store().get_kanji(2).unwrap().unwrap().capacity_used, 0);
    }

    #[test]
    fn begin_resumes_pending_attempt() {
        let alloc = setup(vec![Kanji::new(1, '愛')], &["u1"]);
        let flow = annotated(&alloc, "u1", 1);
        drop(flow);

        let mut resumed = alloc.begin("u1").unwrap();
        assert_eq!(resumed.state().name(), "annotated");
        alloc.finalize(&mut resumed).unwrap();
    }

    #[test]
    fn reselect_after_annotation_keeps_history() {
        let alloc = setup(vec![Kanji::new(1, '愛'), Kanji::new(2, '夢')], &["u1"]);
        let mut flow = annotated(&alloc, "u1", 1);

        alloc.select_tentative(&mut flow, 2).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();
        alloc.record_reason(&mut flow, None).unwrap();
        alloc.finalize(&mut flow).unwrap();

        let attempts = alloc.store().list_attempts("u1").unwrap();
        assert_eq!(attempts.len(), 2);
        let finalized: Vec<_> = attempts.iter().filter(|a| a.is_finalized).collect();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].kanji_id, 2);
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 0);
    }

    #[test]
    fn finalize_on_filled_kanji_resets() {
        let alloc = setup(vec![Kanji::new(1, '愛').with_capacity_used(9)], &["u1", "u2"]);
        let mut a = annotated(&alloc, "u1", 1);
        let mut b = annotated(&alloc, "u2", 1);

        alloc.finalize(&mut a).unwrap();
        let err = alloc.finalize(&mut b).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
        assert_eq!(b.state(), &SelectionState::Browsing);

        let loser = alloc.store().get_claimant("u2").unwrap().unwrap();
        assert!(!loser.has_finalized_claim);
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 10);
    }

    #[test]
    fn concurrent_finalize_admits_exactly_one() {
        for n in [2usize, 5, 16, 32] {
            let users: Vec<String> = (0..n).map(|i| format!("user-{i}")).collect();
            let user_refs: Vec<&str> = users.iter().map(String::as_str).collect();
            let alloc = setup(vec![Kanji::new(1, '愛').with_capacity_used(9)], &user_refs);

            let flows: Vec<SelectionFlow> =
                users.iter().map(|u| annotated(&alloc, u, 1)).collect();
            let barrier = Barrier::new(n);

            let results: Vec<Result<Claim>> = std::thread::scope(|s| {
                let handles: Vec<_> = flows
                    .into_iter()
                    .map(|mut flow| {
                        let alloc = &alloc;
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            alloc.finalize(&mut flow)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let admitted = results.iter().filter(|r| r.is_ok()).count();
            let rejected = results
                .iter()
                .filter(|r| matches!(r, Err(Error::CapacityExceeded { .. })))
                .count();
            assert_eq!(admitted, 1, "n = {n}");
            assert_eq!(rejected, n - 1, "n = {n}");
            assert_eq!(
                alloc.store().get_kanji(1).unwrap().unwrap().capacity_used,
                CAPACITY_LIMIT
            );

            let holders = users
                .iter()
                .filter(|u| {
                    alloc
                        .store()
                        .get_claimant(u)
                        .unwrap()
                        .unwrap()
                        .has_finalized_claim
                })
                .count();
            assert_eq!(holders, 1);
        }
    }

    #[test]
    fn release_frees_the_slot_for_someone_else() {
        let alloc = setup(vec![Kanji::new(1, '愛').with_capacity_used(9)], &["u1", "u2"]);
        let mut a = annotated(&alloc, "u1", 1);
        alloc.finalize(&mut a).unwrap();

        assert_eq!(alloc.release("u1").unwrap(), Some(1));
        let mut b = annotated(&alloc, "u2", 1);
        assert_eq!(alloc.finalize(&mut b).unwrap().capacity_used, CAPACITY_LIMIT);
    }

    /// Wraps the memory store and fails the commit on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySlotStore,
        fail_commit: AtomicBool,
        fail_attempts: AtomicBool,
    }

    impl SlotStore for FlakyStore {
        fn get_kanji(&self, id: KanjiId) -> StoreResult<Option<Kanji>> {
            self.inner.get_kanji(id)
        }
        fn list_kanjis(&self) -> StoreResult<Vec<Kanji>> {
            self.inner.list_kanjis()
        }
        fn try_increment_capacity(&self, id: KanjiId, limit: u32) -> StoreResult<IncrementOutcome> {
            self.inner.try_increment_capacity(id, limit)
        }
        fn get_claimant(&self, user_id: &str) -> StoreResult<Option<Claimant>> {
            self.inner.get_claimant(user_id)
        }
        fn upsert_claimant(&self, claimant: &Claimant) -> StoreResult<()> {
            self.inner.upsert_claimant(claimant)
        }
        fn insert_attempt(&self, attempt: NewAttempt) -> StoreResult<SelectionAttempt> {
            if self.fail_attempts.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.insert_attempt(attempt)
        }
        fn list_attempts(&self, user_id: &str) -> StoreResult<Vec<SelectionAttempt>> {
            self.inner.list_attempts(user_id)
        }
        fn finalize_attempt(&self, id: AttemptId) -> StoreResult<bool> {
            self.inner.finalize_attempt(id)
        }
        fn commit_claim(&self, commit: &ClaimCommit) -> StoreResult<CommitOutcome> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.commit_claim(commit)
        }
        fn release_claim(&self, user_id: &str) -> StoreResult<Option<KanjiId>> {
            self.inner.release_claim(user_id)
        }
    }

    #[test]
    fn storage_failure_at_commit_leaves_no_partial_claim() {
        let store = FlakyStore::default();
        store.inner.put_kanji(Kanji::new(1, '愛')).unwrap();
        store.inner.upsert_claimant(&Claimant::new("u1")).unwrap();
        let alloc = SlotAllocator::new(Arc::new(store));

        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();
        alloc.record_reason(&mut flow, None).unwrap();

        alloc.store().fail_commit.store(true, Ordering::SeqCst);
        let err = alloc.finalize(&mut flow).unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.resets_flow());
        assert_eq!(flow.state().name(), "annotated");
        assert!(!alloc.store().get_claimant("u1").unwrap().unwrap().has_finalized_claim);
        assert_eq!(alloc.store().get_kanji(1).unwrap().unwrap().capacity_used, 0);

        // Caller-initiated retry once storage recovers.
        alloc.store().fail_commit.store(false, Ordering::SeqCst);
        assert_eq!(alloc.finalize(&mut flow).unwrap().capacity_used, 1);
    }

    #[test]
    fn storage_failure_while_recording_keeps_step_two() {
        let store = FlakyStore::default();
        store.inner.put_kanji(Kanji::new(1, '愛')).unwrap();
        store.inner.upsert_claimant(&Claimant::new("u1")).unwrap();
        store.fail_attempts.store(true, Ordering::SeqCst);
        let alloc = SlotAllocator::new(Arc::new(store));

        let mut flow = alloc.begin("u1").unwrap();
        alloc.select_tentative(&mut flow, 1).unwrap();
        alloc.confirm_tentative(&mut flow).unwrap();

        assert!(matches!(
            alloc.record_reason(&mut flow, None),
            Err(Error::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(flow.state().name(), "confirmed");
        assert_eq!(
            alloc.store().get_claimant("u1").unwrap().unwrap().selected_kanji_id,
            None
        );
    }

    #[test]
    fn catalog_filters() {
        let alloc = setup(
            vec![
                Kanji::new(1, '愛'),
                Kanji::new(2, '夢').with_capacity_used(CAPACITY_LIMIT),
            ],
            &[],
        );
        let open = alloc
            .catalog(&KanjiFilter {
                available_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].glyph, '愛');
    }
}
