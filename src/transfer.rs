//! The transfer engine: the only writer of balances and journal entries.
//!
//! Each operation runs as one unit of work:
//!
//! 1. lock the involved accounts in ascending `user_id` order
//! 2. run every check that can fail
//! 3. lock the journal
//! 4. append the entries and adjust the balances
//!
//! Nothing is written before step 4 and nothing in step 4 can fail, so a
//! rejected operation leaves no trace in either store.

use crate::account::{Account, AccountStore};
use crate::amount::TokenAmount;
use crate::clock::Clock;
use crate::error::{LedgerError, Result};
use crate::journal::{EntryKind, Journal, JournalWriter, LedgerEntry, NewEntry};
use crate::UserId;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A request to move tokens from one account to another.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: UserId,
    pub to: UserId,
    pub amount: TokenAmount,
    pub debit_kind: EntryKind,
    pub credit_kind: EntryKind,
    pub reference_id: Option<u64>,
    pub description: String,
}

impl TransferRequest {
    /// A plain transfer tagged with `EntryKind::Other("transfer")` on both sides.
    pub fn new(from: UserId, to: UserId, amount: TokenAmount) -> Self {
        let kind = EntryKind::Other("transfer".to_string());
        TransferRequest {
            from,
            to,
            amount,
            debit_kind: kind.clone(),
            credit_kind: kind,
            reference_id: None,
            description: String::new(),
        }
    }

    pub fn with_kinds(mut self, debit_kind: EntryKind, credit_kind: EntryKind) -> Self {
        self.debit_kind = debit_kind;
        self.credit_kind = credit_kind;
        self
    }

    pub fn with_reference(mut self, reference_id: u64) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Whether both halves of a transfer were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Sender debited and recipient credited.
    Completed,

    /// Sender debited, but the recipient has no account so no credit was made.
    PartialTransfer,
}

/// Post-transfer state of both sides.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub outcome: TransferOutcome,
    pub sender: Account,
    pub recipient: Option<Account>,
    pub debit: LedgerEntry,
    pub credit: Option<LedgerEntry>,
}

impl TransferResult {
    pub fn is_partial(&self) -> bool {
        self.outcome == TransferOutcome::PartialTransfer
    }
}

/// A single-sided credit such as a purchase or reward.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub user_id: UserId,
    pub amount: TokenAmount,
    pub kind: EntryKind,
    pub description: String,
    pub reference_id: Option<u64>,
}

/// Post-credit account state and its journal entry.
#[derive(Debug, Clone)]
pub struct Credit {
    pub account: Account,
    pub entry: LedgerEntry,
}

pub struct TransferEngine {
    accounts: AccountStore,
    journal: Journal,
    clock: Arc<dyn Clock>,
}

impl TransferEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        TransferEngine {
            accounts: AccountStore::new(),
            journal: Journal::new(),
            clock,
        }
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Moves `amount` from `request.from` to `request.to`.
    ///
    /// Fails with `InvalidAmount` for non-positive amounts, `AccountNotFound`
    /// if the sender has no account, and `InsufficientBalance` if the sender
    /// cannot cover the amount, and `BalanceOverflow` if the recipient's
    /// balance cannot hold the credit. A recipient without an account yields a
    /// [`TransferOutcome::PartialTransfer`]: the sender is still debited.
    pub fn transfer(&self, request: TransferRequest) -> Result<TransferResult> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(request.amount));
        }

        self.accounts
            .with_locked(&[request.from, request.to], |locked| {
                let sender = locked.require(request.from)?;
                if !sender.can_cover(request.amount) {
                    return Err(LedgerError::InsufficientBalance {
                        user_id: request.from,
                        balance: sender.balance,
                        required: request.amount,
                    });
                }
                let recipient_exists = match locked.get(request.to) {
                    Some(recipient) if request.from != request.to => {
                        recipient.can_absorb(request.amount)?;
                        true
                    }
                    Some(_) => true,
                    None => false,
                };

                let mut journal = self.journal.writer()?;
                let now = self.clock.now();

                let debit = journal.append(
                    NewEntry {
                        user_id: request.from,
                        amount: -request.amount,
                        kind: request.debit_kind,
                        description: request.description.clone(),
                        reference_id: request.reference_id,
                    },
                    now,
                );
                let mut sender = locked.adjust_balance(request.from, -request.amount, now)?;

                if !recipient_exists {
                    return Ok(TransferResult {
                        outcome: TransferOutcome::PartialTransfer,
                        sender,
                        recipient: None,
                        debit,
                        credit: None,
                    });
                }

                let credit = journal.append(
                    NewEntry {
                        user_id: request.to,
                        amount: request.amount,
                        kind: request.credit_kind,
                        description: request.description,
                        reference_id: request.reference_id,
                    },
                    now,
                );
                let recipient = locked.adjust_balance(request.to, request.amount, now)?;
                if request.from == request.to {
                    sender = recipient.clone();
                }

                Ok(TransferResult {
                    outcome: TransferOutcome::Completed,
                    sender,
                    recipient: Some(recipient),
                    debit,
                    credit: Some(credit),
                })
            })
    }

    /// Credits `request.amount` to a single account.
    pub fn credit(&self, request: CreditRequest) -> Result<Credit> {
        self.credit_checked(request, |_| Ok(()))
    }

    /// Credits a single account once `check` has accepted the request.
    ///
    /// `check` runs while the account is locked, so its verdict cannot go
    /// stale before the credit is applied.
    pub(crate) fn credit_checked<F>(&self, request: CreditRequest, check: F) -> Result<Credit>
    where
        F: FnOnce(&CreditContext<'_>) -> Result<()>,
    {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(request.amount));
        }

        self.accounts.with_locked(&[request.user_id], |locked| {
            locked.require(request.user_id)?.can_absorb(request.amount)?;
            let now = self.clock.now();
            let mut journal = self.journal.writer()?;

            check(&CreditContext {
                journal: &journal,
                now,
            })?;

            let entry = journal.append(
                NewEntry {
                    user_id: request.user_id,
                    amount: request.amount,
                    kind: request.kind,
                    description: request.description,
                    reference_id: request.reference_id,
                },
                now,
            );
            let account = locked.adjust_balance(request.user_id, request.amount, now)?;

            Ok(Credit { account, entry })
        })
    }
}

/// What a credit precondition may inspect.
pub(crate) struct CreditContext<'a> {
    pub(crate) journal: &'a JournalWriter<'a>,
    pub(crate) now: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::journal::PageRequest;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn tokens(s: &str) -> TokenAmount {
        TokenAmount::from_str(s).unwrap()
    }

    fn engine_with(balances: &[(UserId, &str)]) -> TransferEngine {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let engine = TransferEngine::new(Arc::new(clock));
        for (user, balance) in balances {
            engine
                .accounts()
                .create_account(*user, tokens(balance), engine.clock().now())
                .unwrap();
        }
        engine
    }

    fn balance(engine: &TransferEngine, user: UserId) -> String {
        engine.accounts().get_balance(user).unwrap().balance.to_string()
    }

    #[test]
    fn test_transfer_moves_funds_and_journals_both_sides() {
        let engine = engine_with(&[(1, "10.0"), (2, "10.0")]);

        let result = engine
            .transfer(
                TransferRequest::new(1, 2, tokens("0.1"))
                    .with_kinds(EntryKind::LikeDebit, EntryKind::LikeCredit)
                    .with_reference(42),
            )
            .unwrap();

        assert_eq!(result.outcome, TransferOutcome::Completed);
        assert_eq!(result.sender.balance.to_string(), "9.9000");
        assert_eq!(result.recipient.unwrap().balance.to_string(), "10.1000");
        assert_eq!(result.debit.amount.to_string(), "-0.1000");
        assert_eq!(result.debit.kind, EntryKind::LikeDebit);
        assert_eq!(result.debit.reference_id, Some(42));

        let credit = result.credit.unwrap();
        assert_eq!(credit.kind, EntryKind::LikeCredit);
        assert!((result.debit.amount + credit.amount).is_zero());
        assert_eq!(engine.journal().len().unwrap(), 2);
    }

    #[test]
    fn test_insufficient_balance_leaves_no_trace() {
        let engine = engine_with(&[(1, "0.05"), (2, "10.0")]);

        let err = engine
            .transfer(TransferRequest::new(1, 2, tokens("0.1")))
            .unwrap_err();

        match err {
            LedgerError::InsufficientBalance {
                user_id,
                balance,
                required,
            } => {
                assert_eq!(user_id, 1);
                assert_eq!(balance.to_string(), "0.0500");
                assert_eq!(required.to_string(), "0.1000");
            }
            other => panic!("Expected InsufficientBalance, got {other:?}"),
        }
        assert_eq!(balance(&engine, 1), "0.0500");
        assert_eq!(balance(&engine, 2), "10.0000");
        assert!(engine.journal().is_empty().unwrap());
    }

    #[test]
    fn test_exact_balance_can_be_spent() {
        let engine = engine_with(&[(1, "0.1"), (2, "0")]);
        engine.transfer(TransferRequest::new(1, 2, tokens("0.1"))).unwrap();

        assert_eq!(balance(&engine, 1), "0.0000");
        assert_eq!(balance(&engine, 2), "0.1000");
    }

    #[test]
    fn test_missing_sender_fails() {
        let engine = engine_with(&[(2, "10.0")]);
        let err = engine
            .transfer(TransferRequest::new(1, 2, tokens("0.1")))
            .unwrap_err();

        assert!(matches!(err, LedgerError::AccountNotFound { user_id: 1 }));
        assert!(engine.journal().is_empty().unwrap());
    }

    #[test]
    fn test_missing_recipient_is_a_partial_transfer() {
        let engine = engine_with(&[(1, "10.0")]);
        let result = engine
            .transfer(TransferRequest::new(1, 99, tokens("0.1")))
            .unwrap();

        assert!(result.is_partial());
        assert!(result.recipient.is_none());
        assert!(result.credit.is_none());
        assert_eq!(balance(&engine, 1), "9.9000");
        assert_eq!(engine.journal().len().unwrap(), 1);
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let engine = engine_with(&[(1, "10.0"), (2, "10.0")]);

        for amount in ["0", "-1"] {
            let err = engine
                .transfer(TransferRequest::new(1, 2, tokens(amount)))
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }
        assert!(engine.journal().is_empty().unwrap());
    }

    #[test]
    fn test_self_transfer_nets_to_zero() {
        let engine = engine_with(&[(1, "1.0")]);
        let result = engine
            .transfer(TransferRequest::new(1, 1, tokens("0.4")))
            .unwrap();

        assert_eq!(result.outcome, TransferOutcome::Completed);
        assert_eq!(result.sender.balance.to_string(), "1.0000");
        assert_eq!(balance(&engine, 1), "1.0000");
        assert_eq!(engine.journal().len().unwrap(), 2);
    }

    #[test]
    fn test_self_transfer_still_requires_cover() {
        let engine = engine_with(&[(1, "0.1")]);
        let err = engine
            .transfer(TransferRequest::new(1, 1, tokens("0.4")))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_recipient_overflow_is_refused_before_debit() {
        let engine = engine_with(&[(1, "10.0"), (2, "7922816251426433759354395")]);

        let err = engine
            .transfer(TransferRequest::new(1, 2, tokens("5")))
            .unwrap_err();

        assert!(matches!(err, LedgerError::BalanceOverflow { user_id: 2, .. }));
        assert_eq!(balance(&engine, 1), "10.0000");
        assert_eq!(balance(&engine, 2), "7922816251426433759354395.0000");
        assert!(engine.journal().is_empty().unwrap());
    }

    #[test]
    fn test_credit_overflow_leaves_no_trace() {
        let engine = engine_with(&[(1, "7000000000000000000000000")]);

        let err = engine
            .credit(CreditRequest {
                user_id: 1,
                amount: tokens("7000000000000000000000000"),
                kind: EntryKind::Purchase,
                description: String::new(),
                reference_id: None,
            })
            .unwrap_err();

        assert!(matches!(err, LedgerError::BalanceOverflow { user_id: 1, .. }));
        assert_eq!(balance(&engine, 1), "7000000000000000000000000.0000");
        assert!(engine.journal().is_empty().unwrap());
    }

    #[test]
    fn test_credit_appends_and_increments() {
        let engine = engine_with(&[(1, "1.0")]);
        let credit = engine
            .credit(CreditRequest {
                user_id: 1,
                amount: tokens("2.5"),
                kind: EntryKind::Purchase,
                description: "bought".to_string(),
                reference_id: None,
            })
            .unwrap();

        assert_eq!(credit.account.balance.to_string(), "3.5000");
        assert_eq!(credit.entry.kind, EntryKind::Purchase);

        let history = engine.journal().list_for_user(1, PageRequest::default()).unwrap();
        assert_eq!(history.items, vec![credit.entry]);
    }

    #[test]
    fn test_rejected_check_leaves_no_trace() {
        let engine = engine_with(&[(1, "1.0")]);
        let err = engine
            .credit_checked(
                CreditRequest {
                    user_id: 1,
                    amount: tokens("1"),
                    kind: EntryKind::DailyReward,
                    description: String::new(),
                    reference_id: None,
                },
                |_| Err(LedgerError::RewardAlreadyClaimed { user_id: 1 }),
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::RewardAlreadyClaimed { user_id: 1 }));
        assert_eq!(balance(&engine, 1), "1.0000");
        assert!(engine.journal().is_empty().unwrap());
    }
}
