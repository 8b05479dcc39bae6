//! Claimant and selection attempt records.

use crate::{AttemptId, KanjiId};
use serde::{Deserialize, Serialize};

/// A user in the context of kanji selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    /// Opaque user id supplied by the auth collaborator
    pub user_id: String,

    /// Kanji currently bound to the user, finalized or not
    pub selected_kanji_id: Option<KanjiId>,

    /// The binding is permanent and the user may post
    pub has_finalized_claim: bool,
}

impl Claimant {
    /// A claimant with no selection.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            selected_kanji_id: None,
            has_finalized_claim: false,
        }
    }

    /// The kanji this claimant permanently holds, if any.
    pub fn held_kanji(&self) -> Option<KanjiId> {
        if self.has_finalized_claim {
            self.selected_kanji_id
        } else {
            None
        }
    }
}

/// A persisted pick of a kanji, with the user's optional reason.
///
/// A user may leave several unfinalized attempts behind; at most one is ever
/// finalized and it matches the claimant's `selected_kanji_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionAttempt {
    pub id: AttemptId,
    pub user_id: String,
    pub kanji_id: KanjiId,
    /// Free text in any language; not gated.
    pub reason: Option<String>,
    /// Unix seconds
    pub selected_at: u64,
    pub is_finalized: bool,
}

/// Fields of an attempt before storage assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    pub user_id: String,
    pub kanji_id: KanjiId,
    pub reason: Option<String>,
    pub selected_at: u64,
}

impl NewAttempt {
    /// Materialize with the id chosen by storage.
    pub fn into_attempt(self, id: AttemptId) -> SelectionAttempt {
        SelectionAttempt {
            id,
            user_id: self.user_id,
            kanji_id: self.kanji_id,
            reason: self.reason,
            selected_at: self.selected_at,
            is_finalized: false,
        }
    }
}
