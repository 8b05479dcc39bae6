//! Post and like models.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum post length in characters.
pub const MAX_POST_CHARS: usize = 500;

/// A Japanese-only post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub user_id: String,
    pub content: String,
    /// Public URL issued by the external image store
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Post {
    pub fn new(id: u64, user_id: String, content: String, now: u64) -> Self {
        Self {
            id,
            user_id,
            content,
            image_url: None,
            likes_count: 0,
            comments_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One user's like of one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user_id: String,
    pub post_id: u64,
    pub created_at: u64,
}

/// Trim and check post content: non-empty, Japanese only, at most
/// [`MAX_POST_CHARS`] characters. Returns the trimmed content.
pub fn validate_post_content(content: &str) -> Result<String> {
    let content = content.trim_matches(daisuki_gate::is_space);
    if content.is_empty() {
        return Err(Error::InvalidInput("Please enter your post content".into()));
    }
    daisuki_gate::require_japanese(content)?;
    if content.chars().count() > MAX_POST_CHARS {
        return Err(Error::InvalidInput(format!(
            "Post must be under {MAX_POST_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}
