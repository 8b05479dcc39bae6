//! Comment model.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum comment length in characters.
pub const MAX_COMMENT_CHARS: usize = 300;

/// A reply to a post. Comments are not Japanese-gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub post_id: u64,
    pub user_id: String,
    pub content: String,
    pub created_at: u64,
}

/// Trim and require non-empty content of at most [`MAX_COMMENT_CHARS`]
/// characters.
pub fn validate_comment(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::InvalidInput("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(Error::InvalidInput(format!(
            "Comment must be under {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}
