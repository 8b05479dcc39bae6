//! Daisuki Node - Japanese-only posting with kanji identities
//!
//! Every user claims one kanji as a personal emblem, and each kanji admits
//! at most ten holders. Once the claim is final the user may post, as long
//! as every post is written in Japanese script.
//!
//! # Architecture
//!
//! - **Models**: Profiles, posts, likes, comments and the seed catalog
//! - **Storage**: RocksDB transactions; implements [`daisuki_slots::SlotStore`]
//! - **API**: HTTP endpoints for the catalog, the selection wizard and posts
//! - **Admin Socket**: Unix socket for local admin commands (daisuki-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use daisuki_node::{DaisukiNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = DaisukiNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod error;
pub mod models;
pub mod node;
pub mod storage;

pub use error::{Error, Result};
pub use models::{Comment, Like, Post, Profile, ProfileUpdate};
pub use node::{DaisukiNode, NodeConfig, NodeState};
pub use storage::{LikeToggle, Storage, UserRemoval};
