//! Likes and the fee they carry.
//!
//! A `(post, user)` pair is either liked or not. Liking charges the liker a
//! fee that is credited to the post's author; unliking removes the record and
//! keeps the fee where it went.

use crate::amount::TokenAmount;
use crate::error::{LedgerError, Result};
use crate::journal::EntryKind;
use crate::transfer::{TransferEngine, TransferRequest, TransferResult};
use crate::{PostId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Marks that `user_id` liked `post_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeRecord {
    pub post_id: PostId,
    pub user_id: UserId,

    /// Journal entry that charged the like fee.
    pub debit_entry_id: u64,

    pub created_at: DateTime<Utc>,
}

/// A successful like and the fee transfer behind it.
#[derive(Debug, Clone)]
pub struct LikeReceipt {
    pub like: LikeRecord,
    pub transfer: TransferResult,
}

type PostLikes = Arc<Mutex<HashMap<UserId, LikeRecord>>>;

/// Enforces one like per `(post, user)` and drives the fee transfer.
///
/// Each post has its own like table. Its lock is held across the existence
/// check, the transfer and the insert, so concurrent likes of the same pair
/// see each other and at most one fee is ever charged for a pair that is
/// currently liked. Likes on different posts only meet at the account locks.
///
/// Lock order: post table, then accounts, then the journal.
#[derive(Debug, Default)]
pub struct LikeGuard {
    posts: RwLock<HashMap<PostId, PostLikes>>,
}

impl LikeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The like table of `post_id`, created on first use.
    fn post_table(&self, post_id: PostId) -> Result<PostLikes> {
        if let Some(table) = self.existing_table(post_id)? {
            return Ok(table);
        }
        let mut posts = self
            .posts
            .write()
            .map_err(|_| LedgerError::poisoned("likes"))?;
        let table = Arc::clone(posts.entry(post_id).or_default());
        Ok(table)
    }

    fn existing_table(&self, post_id: PostId) -> Result<Option<PostLikes>> {
        let posts = self
            .posts
            .read()
            .map_err(|_| LedgerError::poisoned("likes"))?;
        Ok(posts.get(&post_id).cloned())
    }

    fn lock(table: &PostLikes) -> Result<MutexGuard<'_, HashMap<UserId, LikeRecord>>> {
        table.lock().map_err(|_| LedgerError::poisoned("post likes"))
    }

    /// Likes `post_id` on behalf of `actor_id`, paying `fee` to `owner_id`.
    pub fn like(
        &self,
        engine: &TransferEngine,
        post_id: PostId,
        actor_id: UserId,
        owner_id: UserId,
        fee: TokenAmount,
    ) -> Result<LikeReceipt> {
        let table = self.post_table(post_id)?;
        let mut likes = Self::lock(&table)?;
        if likes.contains_key(&actor_id) {
            return Err(LedgerError::AlreadyLiked {
                post_id,
                user_id: actor_id,
            });
        }

        let transfer = engine.transfer(
            TransferRequest::new(actor_id, owner_id, fee)
                .with_kinds(EntryKind::LikeDebit, EntryKind::LikeCredit)
                .with_reference(post_id)
                .with_description(format!("Like fee for post {post_id}")),
        )?;

        let like = LikeRecord {
            post_id,
            user_id: actor_id,
            debit_entry_id: transfer.debit.id,
            created_at: transfer.debit.created_at,
        };
        likes.insert(actor_id, like.clone());

        Ok(LikeReceipt { like, transfer })
    }

    /// Removes the like. The fee paid for it is not returned.
    pub fn unlike(&self, post_id: PostId, actor_id: UserId) -> Result<LikeRecord> {
        let not_liked = LedgerError::NotLiked {
            post_id,
            user_id: actor_id,
        };
        let Some(table) = self.existing_table(post_id)? else {
            return Err(not_liked);
        };
        let removed = Self::lock(&table)?.remove(&actor_id);
        removed.ok_or(not_liked)
    }

    pub fn has_liked(&self, post_id: PostId, user_id: UserId) -> Result<bool> {
        let Some(table) = self.existing_table(post_id)? else {
            return Ok(false);
        };
        let liked = Self::lock(&table)?.contains_key(&user_id);
        Ok(liked)
    }

    /// Likes on a post, newest first.
    pub fn likes_for_post(&self, post_id: PostId) -> Result<Vec<LikeRecord>> {
        let Some(table) = self.existing_table(post_id)? else {
            return Ok(Vec::new());
        };
        let mut records: Vec<LikeRecord> = Self::lock(&table)?.values().cloned().collect();
        records.sort_by(|a, b| {
            (b.created_at, b.debit_entry_id).cmp(&(a.created_at, a.debit_entry_id))
        });
        Ok(records)
    }

    pub fn like_count(&self, post_id: PostId) -> Result<usize> {
        let Some(table) = self.existing_table(post_id)? else {
            return Ok(0);
        };
        let count = Self::lock(&table)?.len();
        Ok(count)
    }
}
