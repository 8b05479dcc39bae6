//! Shared fixtures for cross-crate tests.

use daisuki_node::{NodeConfig, NodeState, Storage};
use daisuki_slots::{Claim, Kanji, KanjiId, SlotAllocator};
use std::sync::Arc;
use tempfile::TempDir;

/// A node state over a throwaway RocksDB directory.
pub struct TestNode {
    pub state: NodeState,
    _dir: TempDir,
}

impl TestNode {
    /// Open fresh storage holding `kanjis`.
    pub fn with_kanjis(kanjis: impl IntoIterator<Item = Kanji>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Arc::new(Storage::open(dir.path().join("db")).expect("open storage"));
        for kanji in kanjis {
            storage.put_kanji(&kanji).expect("put kanji");
        }
        let state = NodeState::new(storage, NodeConfig::with_data_dir(dir.path()));
        Self { state, _dir: dir }
    }

    pub fn allocator(&self) -> &SlotAllocator<Storage> {
        &self.state.allocator
    }

    /// Create a profile named after the user id.
    pub fn signup(&self, user_id: &str) {
        self.state
            .storage
            .create_profile(user_id, user_id)
            .expect("create profile");
    }

    /// Walk a user through the whole wizard up to, not including, finalize.
    pub fn prepare(&self, user_id: &str, kanji_id: KanjiId) -> daisuki_slots::SelectionFlow {
        let allocator = self.allocator();
        let mut flow = allocator.begin(user_id).expect("begin");
        allocator
            .select_tentative(&mut flow, kanji_id)
            .expect("select");
        allocator.confirm_tentative(&mut flow).expect("confirm");
        allocator
            .record_reason(&mut flow, Some("いい字だから".into()))
            .expect("reason");
        flow
    }

    /// Sign up and claim in one go.
    pub fn claim(&self, user_id: &str, kanji_id: KanjiId) -> daisuki_slots::Result<Claim> {
        self.signup(user_id);
        let mut flow = self.prepare(user_id, kanji_id);
        self.allocator().finalize(&mut flow)
    }
}
