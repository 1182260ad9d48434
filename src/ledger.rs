//! The token ledger facade.
//!
//! [`TokenLedger`] bundles the account store, journal, transfer engine and
//! like guard behind one `Send + Sync` handle that hosts share across request
//! threads. It trusts the user and owner ids it is given: identity and post
//! ownership are resolved by the caller.

use crate::account::Account;
use crate::amount::TokenAmount;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::journal::{EntryKind, LedgerEntry, Page, PageRequest};
use crate::likes::{LikeGuard, LikeReceipt, LikeRecord};
use crate::transfer::{Credit, CreditRequest, TransferEngine, TransferRequest, TransferResult};
use crate::{PostId, UserId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Aggregate figures over the whole token economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    /// Sum of every account balance.
    pub total_in_circulation: TokenAmount,

    /// Accounts holding a positive balance.
    pub users_with_tokens: usize,

    /// Journal activity per entry kind, sorted by kind tag.
    pub by_kind: Vec<KindStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub kind: EntryKind,
    pub count: usize,
    pub total_amount: TokenAmount,
}

pub struct TokenLedger {
    config: LedgerConfig,
    engine: TransferEngine,
    likes: LikeGuard,
}

impl TokenLedger {
    /// Creates an empty ledger on the system clock.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        TokenLedger {
            config,
            engine: TransferEngine::new(clock),
            likes: LikeGuard::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Opens the account of a newly registered user with the configured
    /// starting balance.
    pub fn register(&self, user_id: UserId) -> Result<Account> {
        self.create_account(user_id, self.config.initial_balance)
    }

    pub fn create_account(&self, user_id: UserId, initial_balance: TokenAmount) -> Result<Account> {
        let now = self.engine.clock().now();
        self.engine
            .accounts()
            .create_account(user_id, initial_balance, now)
    }

    pub fn get_balance(&self, user_id: UserId) -> Result<Account> {
        self.engine.accounts().get_balance(user_id)
    }

    /// Every account, ordered by user id.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.engine.accounts().snapshot()
    }

    /// The user's journal, most recent first.
    pub fn list_for_user(&self, user_id: UserId, request: PageRequest) -> Result<Page<LedgerEntry>> {
        self.engine.journal().list_for_user(user_id, request)
    }

    /// The whole journal in append order.
    pub fn journal(&self) -> Result<Vec<LedgerEntry>> {
        self.engine.journal().entries()
    }

    pub fn transfer(&self, request: TransferRequest) -> Result<TransferResult> {
        self.engine.transfer(request)
    }

    /// Likes a post, charging the configured fee to `actor_id` and paying it
    /// to `owner_id`.
    pub fn like(&self, post_id: PostId, actor_id: UserId, owner_id: UserId) -> Result<LikeReceipt> {
        self.like_with_fee(post_id, actor_id, owner_id, self.config.like_fee)
    }

    pub fn like_with_fee(
        &self,
        post_id: PostId,
        actor_id: UserId,
        owner_id: UserId,
        fee: TokenAmount,
    ) -> Result<LikeReceipt> {
        self.likes.like(&self.engine, post_id, actor_id, owner_id, fee)
    }

    /// Removes a like without refunding its fee.
    pub fn unlike(&self, post_id: PostId, actor_id: UserId) -> Result<LikeRecord> {
        self.likes.unlike(post_id, actor_id)
    }

    pub fn has_liked(&self, post_id: PostId, user_id: UserId) -> Result<bool> {
        self.likes.has_liked(post_id, user_id)
    }

    pub fn likes_for_post(&self, post_id: PostId) -> Result<Vec<LikeRecord>> {
        self.likes.likes_for_post(post_id)
    }

    pub fn like_count(&self, post_id: PostId) -> Result<usize> {
        self.likes.like_count(post_id)
    }

    /// Credits bought tokens to the user.
    pub fn purchase(&self, user_id: UserId, amount: TokenAmount) -> Result<Credit> {
        self.engine.credit(CreditRequest {
            user_id,
            amount,
            kind: EntryKind::Purchase,
            description: format!("Purchased {amount} tokens"),
            reference_id: None,
        })
    }

    /// Credits the daily reward, at most once per UTC calendar day.
    pub fn claim_daily_reward(&self, user_id: UserId) -> Result<Credit> {
        let request = CreditRequest {
            user_id,
            amount: self.config.daily_reward,
            kind: EntryKind::DailyReward,
            description: "Daily login reward".to_string(),
            reference_id: None,
        };

        self.engine.credit_checked(request, |ctx| {
            let today = ctx.now.date_naive();
            if ctx.journal.has_entry_on(user_id, &EntryKind::DailyReward, today) {
                return Err(LedgerError::RewardAlreadyClaimed { user_id });
            }
            Ok(())
        })
    }

    /// Circulation and per-kind journal totals.
    ///
    /// Kinds are keyed by the kind itself, so a custom tag that happens to
    /// spell a built-in kind's name is reported on its own row.
    pub fn stats(&self) -> Result<TokenStats> {
        let accounts = self.accounts()?;
        let total_in_circulation = accounts
            .iter()
            .try_fold(TokenAmount::ZERO, |total, a| total.checked_add(a.balance))
            .ok_or_else(|| LedgerError::AmountOutOfRange("total in circulation".to_string()))?;
        let users_with_tokens = accounts.iter().filter(|a| a.balance.is_positive()).count();

        let mut by_kind: BTreeMap<(String, EntryKind), KindStats> = BTreeMap::new();
        for entry in self.journal()? {
            let key = (entry.kind.as_str().to_string(), entry.kind.clone());
            let stats = by_kind.entry(key).or_insert_with(|| KindStats {
                kind: entry.kind.clone(),
                count: 0,
                total_amount: TokenAmount::ZERO,
            });
            stats.count += 1;
            stats.total_amount = stats
                .total_amount
                .checked_add(entry.amount)
                .ok_or_else(|| {
                    LedgerError::AmountOutOfRange(format!("total of {} entries", entry.kind))
                })?;
        }

        Ok(TokenStats {
            total_in_circulation,
            users_with_tokens,
            by_kind: by_kind.into_values().collect(),
        })
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}
