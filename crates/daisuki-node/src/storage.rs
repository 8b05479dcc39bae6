//! Persistent storage using RocksDB.
//!
//! Every read-modify-write runs inside a pessimistic transaction. Records
//! touched by a write are locked with `get_for_update` in a fixed order
//! (profile, attempt, kanji; post, like, comment) so concurrent writers
//! queue instead of deadlocking.

use crate::error::{Error, Result};
use crate::models::{Comment, Like, Post, Profile, ProfileUpdate};
use daisuki_slots::{
    unix_now, AttemptId, Claim, ClaimCommit, Claimant, CommitOutcome, IncrementOutcome, Kanji,
    KanjiId, MissingRecord, NewAttempt, SelectionAttempt, SlotStore, StoreResult,
};
use rocksdb::{Options, Transaction, TransactionDB, TransactionDBOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// How long a transaction waits on a row lock before giving up.
const LOCK_TIMEOUT_MS: i64 = 5_000;

type Txn<'a> = Transaction<'a, TransactionDB>;

fn kanji_key(id: KanjiId) -> String {
    format!("kanji:{id:010}")
}

fn profile_key(user_id: &str) -> String {
    format!("profile:{user_id}")
}

fn username_key(username: &str) -> String {
    format!("username:{username}")
}

fn attempt_key(id: AttemptId) -> String {
    format!("attempt:{id:020}")
}

fn user_attempt_prefix(user_id: &str) -> String {
    format!("user-attempt:{user_id}:")
}

fn post_key(id: u64) -> String {
    format!("post:{id:020}")
}

fn like_prefix(post_id: u64) -> String {
    format!("like:{post_id:020}:")
}

fn comment_prefix(post_id: u64) -> String {
    format!("comment:{post_id:020}:")
}

fn decode<T: DeserializeOwned>(data: Option<Vec<u8>>) -> Result<Option<T>> {
    match data {
        Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
        None => Ok(None),
    }
}

fn lock<T: DeserializeOwned>(txn: &Txn<'_>, key: &str) -> Result<Option<T>> {
    decode(txn.get_for_update(key.as_bytes(), true)?)
}

fn write<T: Serialize>(txn: &Txn<'_>, key: &str, value: &T) -> Result<()> {
    txn.put(key.as_bytes(), serde_json::to_vec(value)?)?;
    Ok(())
}

/// Bump and return the named sequence.
fn next_id(txn: &Txn<'_>, name: &str) -> Result<u64> {
    let key = format!("seq:{name}");
    let current = match txn.get_for_update(key.as_bytes(), true)? {
        Some(data) => {
            let bytes: [u8; 8] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::Storage(format!("Invalid sequence {name}")))?;
            u64::from_be_bytes(bytes)
        }
        None => 0,
    };
    let next = current + 1;
    txn.put(key.as_bytes(), next.to_be_bytes())?;
    Ok(next)
}

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: u64,
}

/// What an account removal took with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct UserRemoval {
    pub released_kanji: Option<KanjiId>,
    pub posts: usize,
    pub comments: usize,
    pub likes: usize,
}

/// Storage backend for the node.
pub struct Storage {
    db: TransactionDB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);
        let db = TransactionDB::open(&opts, &txn_opts, path)?;
        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        decode(self.db.get(key.as_bytes())?)
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix_bytes = prefix.as_bytes();
        let mut keys = Vec::new();

        let iter = self.db.prefix_iterator(prefix_bytes);
        for item in iter {
            let (key, _) = item?;
            if key.starts_with(prefix_bytes) {
                keys.push(String::from_utf8_lossy(&key).into_owned());
            } else {
                break;
            }
        }

        Ok(keys)
    }

    // --- Kanji ---

    /// Store a kanji.
    pub fn put_kanji(&self, kanji: &Kanji) -> Result<()> {
        let value = serde_json::to_vec(kanji)?;
        self.db.put(kanji_key(kanji.id).as_bytes(), value)?;
        Ok(())
    }

    /// Get a kanji by ID.
    pub fn kanji(&self, id: KanjiId) -> Result<Option<Kanji>> {
        self.get(&kanji_key(id))
    }

    /// All kanji, ordered by ID.
    pub fn kanjis(&self) -> Result<Vec<Kanji>> {
        self.scan("kanji:")
    }

    /// Insert catalog entries that are not present yet. Existing rows,
    /// including their usage, are left alone. Returns how many were added.
    pub fn seed_catalog(&self, catalog: impl IntoIterator<Item = Kanji>) -> Result<usize> {
        let now = unix_now();
        let mut added = 0;
        for kanji in catalog {
            let txn = self.db.transaction();
            let key = kanji_key(kanji.id);
            if lock::<Kanji>(&txn, &key)?.is_none() {
                write(&txn, &key, &Kanji { created_at: now, ..kanji })?;
                added += 1;
            }
            txn.commit()?;
        }
        Ok(added)
    }

    // --- Profiles ---

    /// Create the profile for a new user. Fails if the user already has one
    /// or the username is taken.
    pub fn create_profile(&self, user_id: &str, username: &str) -> Result<Profile> {
        let txn = self.db.transaction();
        let key = profile_key(user_id);
        if lock::<Profile>(&txn, &key)?.is_some() {
            return Err(Error::Conflict("Profile already exists".into()));
        }
        let name_key = username_key(username);
        if txn.get_for_update(name_key.as_bytes(), true)?.is_some() {
            return Err(Error::Conflict("Username is already taken".into()));
        }

        let profile = Profile::new(user_id.to_string(), username.to_string(), unix_now());
        write(&txn, &key, &profile)?;
        txn.put(name_key.as_bytes(), user_id.as_bytes())?;
        txn.commit()?;
        Ok(profile)
    }

    /// Get a profile by user ID.
    pub fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.get(&profile_key(user_id))
    }

    /// Get a profile by username.
    pub fn profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        match self.db.get(username_key(username).as_bytes())? {
            Some(user_id) => self.profile(&String::from_utf8_lossy(&user_id)),
            None => Ok(None),
        }
    }

    /// Apply a settings update.
    pub fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<Profile> {
        update.validate()?;
        let txn = self.db.transaction();
        let key = profile_key(user_id);
        let mut profile: Profile =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("profile {user_id}")))?;
        update.apply(&mut profile, unix_now());
        write(&txn, &key, &profile)?;
        txn.commit()?;
        Ok(profile)
    }

    /// All profiles.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.scan("profile:")
    }

    /// Check if a user is an admin.
    pub fn is_admin(&self, user_id: &str) -> Result<bool> {
        Ok(self.profile(user_id)?.is_some_and(|p| p.is_admin))
    }

    /// Grant or revoke admin rights.
    pub fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<()> {
        let txn = self.db.transaction();
        let key = profile_key(user_id);
        let mut profile: Profile =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("profile {user_id}")))?;
        profile.is_admin = is_admin;
        profile.updated_at = unix_now();
        write(&txn, &key, &profile)?;
        txn.commit()?;
        Ok(())
    }

    /// List admin user IDs.
    pub fn list_admins(&self) -> Result<Vec<String>> {
        Ok(self
            .list_profiles()?
            .into_iter()
            .filter(|p| p.is_admin)
            .map(|p| p.id)
            .collect())
    }

    /// Remove a user and everything they wrote.
    ///
    /// The profile, its attempts and any held slot go in one transaction
    /// before the content cleanup, so a claim racing the removal finds no
    /// claimant.
    pub fn delete_user(&self, user_id: &str) -> Result<UserRemoval> {
        let mut removal = UserRemoval {
            released_kanji: self.remove_account(user_id)?,
            ..Default::default()
        };

        for post in self.posts_by_user(user_id)? {
            self.delete_post(post.id)?;
            removal.posts += 1;
        }

        for key in self.scan_keys("like:")? {
            if let Some(post_id) = parse_like_key(&key, user_id) {
                if self.remove_like(post_id, user_id)? {
                    removal.likes += 1;
                }
            }
        }

        let comments: Vec<Comment> = self.scan("comment:")?;
        for comment in comments.into_iter().filter(|c| c.user_id == user_id) {
            self.delete_comment(&comment)?;
            removal.comments += 1;
        }

        Ok(removal)
    }

    fn remove_account(&self, user_id: &str) -> Result<Option<KanjiId>> {
        let txn = self.db.transaction();

        let key = profile_key(user_id);
        let profile: Profile =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("profile {user_id}")))?;
        let released = profile.claimant().held_kanji();

        for index in self.scan_keys(&user_attempt_prefix(user_id))? {
            if let Some(id) = index.rsplit(':').next().and_then(|id| id.parse().ok()) {
                let attempt_key = attempt_key(id);
                lock::<SelectionAttempt>(&txn, &attempt_key)?;
                txn.delete(attempt_key.as_bytes())?;
            }
            txn.delete(index.as_bytes())?;
        }

        if let Some(kanji_id) = released {
            let kanji_key = kanji_key(kanji_id);
            if let Some(mut kanji) = lock::<Kanji>(&txn, &kanji_key)? {
                kanji.capacity_used = kanji.capacity_used.saturating_sub(1);
                write(&txn, &kanji_key, &kanji)?;
            }
        }

        txn.delete(key.as_bytes())?;
        txn.delete(username_key(&profile.username).as_bytes())?;
        txn.commit()?;
        Ok(released)
    }

    // --- Posts ---

    /// Store a new post.
    pub fn create_post(
        &self,
        user_id: &str,
        content: String,
        image_url: Option<String>,
    ) -> Result<Post> {
        let txn = self.db.transaction();
        let id = next_id(&txn, "post")?;
        let mut post = Post::new(id, user_id.to_string(), content, unix_now());
        post.image_url = image_url;
        write(&txn, &post_key(id), &post)?;
        txn.commit()?;
        Ok(post)
    }

    /// Get a post by ID.
    pub fn post(&self, id: u64) -> Result<Option<Post>> {
        self.get(&post_key(id))
    }

    /// Replace a post's content.
    pub fn update_post(&self, id: u64, content: String) -> Result<Post> {
        let txn = self.db.transaction();
        let key = post_key(id);
        let mut post: Post =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("post {id}")))?;
        post.content = content;
        post.updated_at = unix_now();
        write(&txn, &key, &post)?;
        txn.commit()?;
        Ok(post)
    }

    /// Delete a post together with its likes and comments.
    pub fn delete_post(&self, id: u64) -> Result<()> {
        let txn = self.db.transaction();
        let key = post_key(id);
        if lock::<Post>(&txn, &key)?.is_none() {
            return Err(Error::NotFound(format!("post {id}")));
        }
        for like in self.scan_keys(&like_prefix(id))? {
            txn.delete(like.as_bytes())?;
        }
        for comment in self.scan_keys(&comment_prefix(id))? {
            txn.delete(comment.as_bytes())?;
        }
        txn.delete(key.as_bytes())?;
        txn.commit()?;
        Ok(())
    }

    /// Newest posts first.
    pub fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.scan("post:")?;
        posts.reverse();
        posts.truncate(limit);
        Ok(posts)
    }

    /// A user's posts, newest first.
    pub fn posts_by_user(&self, user_id: &str) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.scan("post:")?;
        posts.retain(|p| p.user_id == user_id);
        posts.reverse();
        Ok(posts)
    }

    // --- Likes ---

    /// Like the post, or take the like back if one exists.
    pub fn toggle_like(&self, post_id: u64, user_id: &str) -> Result<LikeToggle> {
        let txn = self.db.transaction();
        let key = post_key(post_id);
        let mut post: Post =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("post {post_id}")))?;

        let like_key = format!("{}{user_id}", like_prefix(post_id));
        let liked = if txn.get_for_update(like_key.as_bytes(), true)?.is_some() {
            txn.delete(like_key.as_bytes())?;
            post.likes_count = post.likes_count.saturating_sub(1);
            false
        } else {
            let like = Like {
                user_id: user_id.to_string(),
                post_id,
                created_at: unix_now(),
            };
            write(&txn, &like_key, &like)?;
            post.likes_count += 1;
            true
        };

        write(&txn, &key, &post)?;
        txn.commit()?;
        Ok(LikeToggle {
            liked,
            likes_count: post.likes_count,
        })
    }

    /// Whether the user currently likes the post.
    pub fn has_liked(&self, post_id: u64, user_id: &str) -> Result<bool> {
        let key = format!("{}{user_id}", like_prefix(post_id));
        Ok(self.db.get(key.as_bytes())?.is_some())
    }

    fn remove_like(&self, post_id: u64, user_id: &str) -> Result<bool> {
        let txn = self.db.transaction();
        let key = post_key(post_id);
        let like_key = format!("{}{user_id}", like_prefix(post_id));
        let post: Option<Post> = lock(&txn, &key)?;
        if txn.get_for_update(like_key.as_bytes(), true)?.is_none() {
            return Ok(false);
        }
        txn.delete(like_key.as_bytes())?;
        if let Some(mut post) = post {
            post.likes_count = post.likes_count.saturating_sub(1);
            write(&txn, &key, &post)?;
        }
        txn.commit()?;
        Ok(true)
    }

    // --- Comments ---

    /// Add a comment and bump the post's comment count.
    pub fn add_comment(&self, post_id: u64, user_id: &str, content: String) -> Result<Comment> {
        let txn = self.db.transaction();
        let key = post_key(post_id);
        let mut post: Post =
            lock(&txn, &key)?.ok_or_else(|| Error::NotFound(format!("post {post_id}")))?;

        let comment = Comment {
            id: next_id(&txn, "comment")?,
            post_id,
            user_id: user_id.to_string(),
            content,
            created_at: unix_now(),
        };
        write(
            &txn,
            &format!("{}{:020}", comment_prefix(post_id), comment.id),
            &comment,
        )?;
        post.comments_count += 1;
        write(&txn, &key, &post)?;
        txn.commit()?;
        Ok(comment)
    }

    /// A post's comments, oldest first.
    pub fn comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        self.scan(&comment_prefix(post_id))
    }

    fn delete_comment(&self, comment: &Comment) -> Result<()> {
        let txn = self.db.transaction();
        let key = post_key(comment.post_id);
        let post: Option<Post> = lock(&txn, &key)?;
        txn.delete(format!("{}{:020}", comment_prefix(comment.post_id), comment.id).as_bytes())?;
        if let Some(mut post) = post {
            post.comments_count = post.comments_count.saturating_sub(1);
            write(&txn, &key, &post)?;
        }
        txn.commit()?;
        Ok(())
    }

    // --- Selection records ---

    /// Get a selection attempt by ID.
    pub fn attempt(&self, id: AttemptId) -> Result<Option<SelectionAttempt>> {
        self.get(&attempt_key(id))
    }

    fn attempts_for(&self, user_id: &str) -> Result<Vec<SelectionAttempt>> {
        let mut attempts = Vec::new();
        for key in self.scan_keys(&user_attempt_prefix(user_id))? {
            let Some(id) = key.rsplit(':').next().and_then(|id| id.parse().ok()) else {
                return Err(Error::Storage(format!("Invalid attempt index {key}")));
            };
            if let Some(attempt) = self.attempt(id)? {
                attempts.push(attempt);
            }
        }
        Ok(attempts)
    }

    fn commit(&self, commit: &ClaimCommit) -> Result<CommitOutcome> {
        let txn = self.db.transaction();

        let profile_key = profile_key(&commit.user_id);
        let Some(mut profile) = lock::<Profile>(&txn, &profile_key)? else {
            return Ok(CommitOutcome::Missing(MissingRecord::Claimant));
        };
        if profile.has_finalized_claim {
            return Ok(CommitOutcome::AlreadyFinalized);
        }

        let attempt_key = attempt_key(commit.attempt_id);
        let attempt = lock::<SelectionAttempt>(&txn, &attempt_key)?.filter(|a| {
            a.user_id == commit.user_id && a.kanji_id == commit.kanji_id && !a.is_finalized
        });
        let Some(mut attempt) = attempt else {
            return Ok(CommitOutcome::Missing(MissingRecord::Attempt));
        };

        let kanji_key = kanji_key(commit.kanji_id);
        let Some(mut kanji) = lock::<Kanji>(&txn, &kanji_key)? else {
            return Ok(CommitOutcome::Missing(MissingRecord::Kanji));
        };
        if kanji.capacity_used >= commit.limit {
            return Ok(CommitOutcome::CapacityExceeded {
                capacity_used: kanji.capacity_used,
            });
        }

        kanji.capacity_used += 1;
        profile.selected_kanji_id = Some(commit.kanji_id);
        profile.has_finalized_claim = true;
        profile.updated_at = commit.committed_at;
        attempt.is_finalized = true;

        write(&txn, &kanji_key, &kanji)?;
        write(&txn, &profile_key, &profile)?;
        write(&txn, &attempt_key, &attempt)?;
        txn.commit()?;

        Ok(CommitOutcome::Committed(Claim {
            user_id: commit.user_id.clone(),
            kanji_id: commit.kanji_id,
            attempt_id: commit.attempt_id,
            capacity_used: kanji.capacity_used,
            finalized_at: commit.committed_at,
        }))
    }

    fn release(&self, user_id: &str) -> Result<Option<KanjiId>> {
        let txn = self.db.transaction();

        let key = profile_key(user_id);
        let Some(mut profile) = lock::<Profile>(&txn, &key)? else {
            return Ok(None);
        };
        let released = profile.claimant().held_kanji();

        if let Some(kanji_id) = released {
            for attempt in self.attempts_for(user_id)? {
                let attempt_key = attempt_key(attempt.id);
                if let Some(mut attempt) = lock::<SelectionAttempt>(&txn, &attempt_key)? {
                    attempt.is_finalized = false;
                    write(&txn, &attempt_key, &attempt)?;
                }
            }
            let kanji_key = kanji_key(kanji_id);
            if let Some(mut kanji) = lock::<Kanji>(&txn, &kanji_key)? {
                kanji.capacity_used = kanji.capacity_used.saturating_sub(1);
                write(&txn, &kanji_key, &kanji)?;
            }
        }

        profile.apply_claimant(&Claimant::new(user_id), unix_now());
        write(&txn, &key, &profile)?;
        txn.commit()?;
        Ok(released)
    }
}

/// Post ID from `like:{post}:{user}` when the like belongs to `user_id`.
fn parse_like_key(key: &str, user_id: &str) -> Option<u64> {
    let rest = key.strip_prefix("like:")?;
    let (post_id, owner) = rest.split_once(':')?;
    (owner == user_id).then(|| post_id.parse().ok()).flatten()
}

impl SlotStore for Storage {
    fn get_kanji(&self, id: KanjiId) -> StoreResult<Option<Kanji>> {
        Ok(self.kanji(id)?)
    }

    fn list_kanjis(&self) -> StoreResult<Vec<Kanji>> {
        Ok(self.kanjis()?)
    }

    fn try_increment_capacity(&self, id: KanjiId, limit: u32) -> StoreResult<IncrementOutcome> {
        let run = || -> Result<IncrementOutcome> {
            let txn = self.db.transaction();
            let key = kanji_key(id);
            let Some(mut kanji) = lock::<Kanji>(&txn, &key)? else {
                return Ok(IncrementOutcome::Missing);
            };
            if kanji.capacity_used >= limit {
                return Ok(IncrementOutcome::Exceeded {
                    capacity_used: kanji.capacity_used,
                });
            }
            kanji.capacity_used += 1;
            write(&txn, &key, &kanji)?;
            txn.commit()?;
            Ok(IncrementOutcome::Admitted {
                capacity_used: kanji.capacity_used,
            })
        };
        Ok(run()?)
    }

    fn get_claimant(&self, user_id: &str) -> StoreResult<Option<Claimant>> {
        Ok(self.profile(user_id)?.map(|p| p.claimant()))
    }

    fn upsert_claimant(&self, claimant: &Claimant) -> StoreResult<()> {
        let run = || -> Result<()> {
            let txn = self.db.transaction();
            let key = profile_key(&claimant.user_id);
            let mut profile: Profile = lock(&txn, &key)?.ok_or_else(|| {
                Error::Conflict(format!("no profile for {}", claimant.user_id))
            })?;
            if profile.has_finalized_claim && profile.claimant() != *claimant {
                return Err(Error::Conflict(claimant.user_id.clone()));
            }
            profile.apply_claimant(claimant, unix_now());
            write(&txn, &key, &profile)?;
            txn.commit()?;
            Ok(())
        };
        Ok(run()?)
    }

    fn insert_attempt(&self, attempt: NewAttempt) -> StoreResult<SelectionAttempt> {
        let run = || -> Result<SelectionAttempt> {
            let txn = self.db.transaction();
            let attempt = attempt.into_attempt(next_id(&txn, "attempt")?);
            write(&txn, &attempt_key(attempt.id), &attempt)?;
            let index = format!("{}{:020}", user_attempt_prefix(&attempt.user_id), attempt.id);
            txn.put(index.as_bytes(), b"")?;
            txn.commit()?;
            Ok(attempt)
        };
        Ok(run()?)
    }

    fn list_attempts(&self, user_id: &str) -> StoreResult<Vec<SelectionAttempt>> {
        Ok(self.attempts_for(user_id)?)
    }

    fn finalize_attempt(&self, id: AttemptId) -> StoreResult<bool> {
        let run = || -> Result<bool> {
            let txn = self.db.transaction();
            let key = attempt_key(id);
            let Some(mut attempt) = lock::<SelectionAttempt>(&txn, &key)? else {
                return Ok(false);
            };
            attempt.is_finalized = true;
            write(&txn, &key, &attempt)?;
            txn.commit()?;
            Ok(true)
        };
        Ok(run()?)
    }

    fn commit_claim(&self, commit: &ClaimCommit) -> StoreResult<CommitOutcome> {
        Ok(self.commit(commit)?)
    }

    fn release_claim(&self, user_id: &str) -> StoreResult<Option<KanjiId>> {
        Ok(self.release(user_id)?)
    }
}
