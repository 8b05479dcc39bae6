//! Explicit selection flow state.

use crate::claimant::SelectionAttempt;
use crate::kanji::Kanji;
use crate::store::Claim;
use serde::{Deserialize, Serialize};

/// Where a claimant is in the selection wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    /// Nothing chosen.
    Browsing,
    /// A kanji is chosen locally; nothing persisted.
    Tentative { kanji: Kanji },
    /// Capacity re-checked; waiting for the reason.
    Confirmed { kanji: Kanji },
    /// Attempt persisted and bound to the claimant; not finalized.
    Annotated {
        kanji: Kanji,
        attempt: SelectionAttempt,
    },
    /// Terminal. The slot is consumed.
    Finalized { kanji: Kanji, claim: Claim },
}

impl SelectionState {
    /// Short name used in errors and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Tentative { .. } => "tentative",
            Self::Confirmed { .. } => "confirmed",
            Self::Annotated { .. } => "annotated",
            Self::Finalized { .. } => "finalized",
        }
    }

    /// Wizard step shown to the user (1 = pick, 2 = reason, 3 = commit).
    pub const fn step(&self) -> u8 {
        match self {
            Self::Browsing | Self::Tentative { .. } => 1,
            Self::Confirmed { .. } => 2,
            Self::Annotated { .. } | Self::Finalized { .. } => 3,
        }
    }

    /// The kanji under consideration, if any.
    pub fn kanji(&self) -> Option<&Kanji> {
        match self {
            Self::Browsing => None,
            Self::Tentative { kanji }
            | Self::Confirmed { kanji }
            | Self::Annotated { kanji, .. }
            | Self::Finalized { kanji, .. } => Some(kanji),
        }
    }

    pub const fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }
}

impl std::fmt::Display for SelectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kanji() {
            Some(kanji) => write!(f, "{}({})", self.name(), kanji.glyph),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// One claimant's pass through the wizard.
///
/// Created by [`SlotAllocator::begin`](crate::SlotAllocator::begin) and
/// advanced only through the allocator, which owns every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFlow {
    user_id: String,
    state: SelectionState,
}

impl SelectionFlow {
    pub(crate) fn new(user_id: impl Into<String>, state: SelectionState) -> Self {
        Self {
            user_id: user_id.into(),
            state,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub(crate) fn set(&mut self, state: SelectionState) {
        self.state = state;
    }

    /// Drop any stale kanji reference and go back to browsing.
    pub(crate) fn reset(&mut self) {
        self.state = SelectionState::Browsing;
    }
}
