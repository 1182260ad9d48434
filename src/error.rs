//! Error types for the token ledger.

use crate::amount::TokenAmount;
use crate::{PostId, UserId};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors returned by the ledger and by the replay driver.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No account exists for the user
    #[error("No token account for user {user_id}")]
    AccountNotFound { user_id: UserId },

    /// An account for the user already exists
    #[error("Token account for user {user_id} already exists")]
    AccountExists { user_id: UserId },

    /// The user has already liked the post
    #[error("User {user_id} has already liked post {post_id}")]
    AlreadyLiked { post_id: PostId, user_id: UserId },

    /// The user has not liked the post
    #[error("User {user_id} has not liked post {post_id}")]
    NotLiked { post_id: PostId, user_id: UserId },

    /// The debited account cannot cover the amount
    #[error("Insufficient balance for user {user_id}: has {balance}, needs {required}")]
    InsufficientBalance {
        user_id: UserId,
        balance: TokenAmount,
        required: TokenAmount,
    },

    /// Transfer or credit amount is zero or negative
    #[error("Invalid token amount {0}: must be greater than zero")]
    InvalidAmount(TokenAmount),

    /// Crediting the account would exceed the largest representable balance
    #[error("Balance of user {user_id} cannot absorb {amount}: already at {balance}")]
    BalanceOverflow {
        user_id: UserId,
        balance: TokenAmount,
        amount: TokenAmount,
    },

    /// An aggregate over many amounts left the representable range
    #[error("Token amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Daily reward already credited on this calendar day
    #[error("User {user_id} has already claimed today's reward")]
    RewardAlreadyClaimed { user_id: UserId },

    /// Backing store could not be accessed
    #[error("Ledger storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Failed to open or read a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid command record
    #[error("Invalid command at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Command references a post that was never registered
    #[error("Unknown post {post_id}")]
    UnknownPost { post_id: PostId },

    /// Missing input file argument
    #[error("Missing input file argument. Usage: token-ledger <commands.csv> [journal.csv]")]
    MissingArgument,

    /// Configuration value could not be parsed
    #[error("Invalid value {value:?} for {key}")]
    InvalidConfig { key: String, value: String },
}

impl LedgerError {
    pub(crate) fn poisoned(what: &str) -> Self {
        LedgerError::StorageUnavailable(format!("{what} lock poisoned"))
    }
}
