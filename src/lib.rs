//! # Token Ledger
//!
//! Token balances for a social platform where liking a post costs the liker
//! a small fee that is paid to the post's author.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: 4 decimal places via `rust_decimal`
//! - **Append-only journal**: every balance change leaves one immutable entry
//! - **Atomic units of work**: a transfer's checks, entries and balance
//!   changes apply together or not at all
//! - **Ordered locking**: accounts are locked in ascending user id order
//!
//! ## Example
//!
//! ```
//! use token_ledger::{LedgerConfig, TokenLedger};
//!
//! let ledger = TokenLedger::new(LedgerConfig::default());
//! ledger.register(1).unwrap();
//! ledger.register(2).unwrap();
//!
//! // User 1 likes post 100, written by user 2.
//! ledger.like(100, 1, 2).unwrap();
//!
//! assert_eq!(ledger.get_balance(1).unwrap().balance.to_string(), "9.9000");
//! assert_eq!(ledger.get_balance(2).unwrap().balance.to_string(), "10.1000");
//! ```

pub mod account;
pub mod amount;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod likes;
pub mod posts;
pub mod replay;
pub mod transfer;

/// Identifier of a user, issued by the identity provider.
pub type UserId = u64;

/// Identifier of a post, issued by the post repository.
pub type PostId = u64;

pub use account::{Account, AccountStore};
pub use amount::TokenAmount;
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandKind, CommandRecord, ParsedCommand};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use journal::{EntryKind, Journal, LedgerEntry, NewEntry, Page, PageRequest};
pub use ledger::{KindStats, TokenLedger, TokenStats};
pub use likes::{LikeGuard, LikeReceipt, LikeRecord};
pub use posts::{PostDirectory, PostRecord};
pub use replay::LedgerReplay;
pub use transfer::{
    Credit, CreditRequest, TransferEngine, TransferOutcome, TransferRequest, TransferResult,
};
