//! Social models for the node.
//!
//! The kanji and claimant types live in `daisuki-slots`; this module adds
//! what the posting surface needs on top of them.
//!
//! - [`Profile`] - a user, including their claimant fields
//! - [`Post`] / [`Like`] - Japanese-only posts and likes
//! - [`Comment`] - replies to posts (not gated)
//! - [`default_catalog`] - the kanji seeded on first start

mod catalog;
mod comment;
mod post;
mod profile;

pub use catalog::default_catalog;
pub use comment::{validate_comment, Comment, MAX_COMMENT_CHARS};
pub use post::{validate_post_content, Like, Post, MAX_POST_CHARS};
pub use profile::{validate_username, Profile, ProfileUpdate, MAX_BIO_CHARS};
