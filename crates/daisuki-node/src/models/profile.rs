//! Profile model.

use crate::error::{Error, Result};
use daisuki_slots::{Claimant, KanjiId};
use serde::{Deserialize, Serialize};

/// Maximum bio length in characters.
pub const MAX_BIO_CHARS: usize = 200;

const USERNAME_CHARS: std::ops::RangeInclusive<usize> = 3..=20;

/// A user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Opaque id from the auth provider
    pub id: String,

    /// Unique handle
    pub username: String,

    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub age_group: Option<String>,

    #[serde(default)]
    pub is_admin: bool,

    /// Bound kanji, finalized or not
    pub selected_kanji_id: Option<KanjiId>,

    /// Claim is permanent; posting unlocked
    #[serde(default)]
    pub has_finalized_claim: bool,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Profile {
    /// A fresh profile with no kanji.
    pub fn new(id: String, username: String, now: u64) -> Self {
        Self {
            id,
            display_name: Some(username.clone()),
            username,
            avatar_url: None,
            bio: None,
            country: None,
            age_group: None,
            is_admin: false,
            selected_kanji_id: None,
            has_finalized_claim: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The selection-relevant view of this profile.
    pub fn claimant(&self) -> Claimant {
        Claimant {
            user_id: self.id.clone(),
            selected_kanji_id: self.selected_kanji_id,
            has_finalized_claim: self.has_finalized_claim,
        }
    }

    /// Copy claimant fields back onto the profile.
    pub fn apply_claimant(&mut self, claimant: &Claimant, now: u64) {
        self.selected_kanji_id = claimant.selected_kanji_id;
        self.has_finalized_claim = claimant.has_finalized_claim;
        self.updated_at = now;
    }

    /// Only holders of a finalized kanji may post.
    pub fn can_post(&self) -> bool {
        self.has_finalized_claim && self.selected_kanji_id.is_some()
    }
}

/// Check a username: 3-20 characters of ASCII letters, digits and `_`.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len < *USERNAME_CHARS.start() {
        return Err(Error::InvalidInput(
            "Username must be at least 3 characters".into(),
        ));
    }
    if len > *USERNAME_CHARS.end() {
        return Err(Error::InvalidInput(
            "Username must be 20 characters or less".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::InvalidInput(
            "Username can only contain letters, numbers, and underscores".into(),
        ));
    }
    Ok(())
}

/// Settings form. Blank strings clear the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub age_group: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(bio) = &self.bio {
            if bio.trim().chars().count() > MAX_BIO_CHARS {
                return Err(Error::InvalidInput(format!(
                    "Bio must be under {MAX_BIO_CHARS} characters"
                )));
            }
        }
        Ok(())
    }

    /// Apply onto a profile. Claimant and admin fields are untouched.
    pub fn apply(self, profile: &mut Profile, now: u64) {
        fn clean(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }
        profile.display_name = clean(self.display_name);
        profile.bio = clean(self.bio);
        profile.avatar_url = clean(self.avatar_url);
        profile.country = clean(self.country);
        profile.age_group = clean(self.age_group);
        profile.updated_at = now;
    }
}
