//! Append-only journal of balance changes.
//!
//! Every debit and credit applied by the transfer engine leaves exactly one
//! [`LedgerEntry`] here. Entries are never updated or removed.

use crate::amount::TokenAmount;
use crate::error::{LedgerError, Result};
use crate::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, RwLockWriteGuard};

/// Tag describing why a balance changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    /// Fee paid by a user for liking a post.
    LikeDebit,

    /// Fee received by a post author.
    LikeCredit,

    /// Once-per-day login reward.
    DailyReward,

    /// Tokens bought by the user.
    Purchase,

    /// Any other caller-defined kind.
    Other(String),
}

impl EntryKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::LikeDebit => "like_debit",
            EntryKind::LikeCredit => "like_credit",
            EntryKind::DailyReward => "daily_reward",
            EntryKind::Purchase => "purchase",
            EntryKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = std::convert::Infallible;

    /// Built-in tags match case-insensitively; any other tag is kept as written.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let tag = s.trim();
        let builtin = [
            EntryKind::LikeDebit,
            EntryKind::LikeCredit,
            EntryKind::DailyReward,
            EntryKind::Purchase,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(tag));

        Ok(builtin.unwrap_or_else(|| EntryKind::Other(tag.to_string())))
    }
}

impl Serialize for EntryKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Input for a journal append; identity and timestamp are assigned on write.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: UserId,

    /// Signed change: negative for debits, positive for credits.
    pub amount: TokenAmount,

    pub kind: EntryKind,

    pub description: String,

    /// Related entity, e.g. the liked post.
    pub reference_id: Option<u64>,
}

/// An immutable journal record of one balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Sequential identity, starting at 1.
    pub id: u64,
    pub user_id: UserId,
    pub amount: TokenAmount,
    pub kind: EntryKind,
    pub description: String,
    pub reference_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_debit(&self) -> bool {
        self.amount.is_negative()
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}

/// A 1-based page selector for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: usize = 10;

    /// Builds a request; page `0` is read as the first page and limit `0` as
    /// the default limit.
    pub fn new(page: usize, limit: usize) -> Self {
        PageRequest {
            page: page.max(1),
            limit: if limit == 0 { Self::DEFAULT_LIMIT } else { limit },
        }
    }

    /// Every item on a single page.
    pub fn all() -> Self {
        PageRequest {
            page: 1,
            limit: usize::MAX,
        }
    }

    fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
    pub limit: usize,
}

/// The append-only journal.
#[derive(Debug, Default)]
pub struct Journal {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the journal for writing.
    ///
    /// The returned writer holds the journal lock until dropped, so every
    /// append made through it becomes visible to readers at the same time.
    pub(crate) fn writer(&self) -> Result<JournalWriter<'_>> {
        let entries = self
            .entries
            .write()
            .map_err(|_| LedgerError::poisoned("journal"))?;
        Ok(JournalWriter { entries })
    }

    /// Appends a single entry.
    #[cfg(test)]
    pub(crate) fn append(&self, entry: NewEntry, now: DateTime<Utc>) -> Result<LedgerEntry> {
        Ok(self.writer()?.append(entry, now))
    }

    /// The user's entries, most recent first, one page at a time.
    pub fn list_for_user(&self, user_id: UserId, request: PageRequest) -> Result<Page<LedgerEntry>> {
        let request = PageRequest::new(request.page, request.limit);
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("journal"))?;

        let mut own: Vec<&LedgerEntry> = entries.iter().filter(|e| e.user_id == user_id).collect();
        own.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = own.len();
        let items = own
            .into_iter()
            .skip(request.offset())
            .take(request.limit)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            total_pages: total.div_ceil(request.limit),
            page: request.page,
            limit: request.limit,
        })
    }

    /// Every entry in append order.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("journal"))?;
        Ok(entries.clone())
    }

    pub fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("journal"))?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Exclusive write access to the journal for one unit of work.
pub(crate) struct JournalWriter<'a> {
    entries: RwLockWriteGuard<'a, Vec<LedgerEntry>>,
}

impl JournalWriter<'_> {
    /// Stores the entry with the next identity and the given timestamp.
    pub(crate) fn append(&mut self, entry: NewEntry, now: DateTime<Utc>) -> LedgerEntry {
        let id = self.entries.last().map(|e| e.id + 1).unwrap_or(1);
        let stored = LedgerEntry {
            id,
            user_id: entry.user_id,
            amount: entry.amount,
            kind: entry.kind,
            description: entry.description,
            reference_id: entry.reference_id,
            created_at: now,
        };
        self.entries.push(stored.clone());
        stored
    }

    /// Returns `true` if the user has an entry of `kind` dated `day` (UTC).
    pub(crate) fn has_entry_on(&self, user_id: UserId, kind: &EntryKind, day: NaiveDate) -> bool {
        self.entries.iter().rev().any(|e| {
            e.user_id == user_id && &e.kind == kind && e.created_at.date_naive() == day
        })
    }
}
