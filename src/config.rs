//! Ledger tunables.
//!
//! Every value can be overridden from the environment:
//!
//! - `TOKEN_LEDGER_INITIAL_BALANCE`: balance granted at registration (default `10.0`)
//! - `TOKEN_LEDGER_LIKE_FEE`: tokens moved from liker to author per like (default `0.1`)
//! - `TOKEN_LEDGER_DAILY_REWARD`: tokens credited by the daily reward (default `0.5`)
//!
//! The starting balance may be zero. The like fee and daily reward move
//! tokens on every use and must be strictly positive.

use crate::amount::TokenAmount;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

const INITIAL_BALANCE_KEY: &str = "TOKEN_LEDGER_INITIAL_BALANCE";
const LIKE_FEE_KEY: &str = "TOKEN_LEDGER_LIKE_FEE";
const DAILY_REWARD_KEY: &str = "TOKEN_LEDGER_DAILY_REWARD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Balance of a freshly registered account.
    pub initial_balance: TokenAmount,

    /// Fee charged to the liker and credited to the post author.
    pub like_fee: TokenAmount,

    /// Amount credited once per UTC day by the daily reward.
    pub daily_reward: TokenAmount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_balance: TokenAmount::from_whole(10),
            like_fee: TokenAmount::from_minor(1_000),
            daily_reward: TokenAmount::from_minor(5_000),
        }
    }
}

impl LedgerConfig {
    /// Loads the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults. The starting balance must be
    /// non-negative; the like fee and daily reward must be positive.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(value) = lookup(INITIAL_BALANCE_KEY) {
            config.initial_balance = parse_amount(INITIAL_BALANCE_KEY, &value, false)?;
        }
        if let Some(value) = lookup(LIKE_FEE_KEY) {
            config.like_fee = parse_amount(LIKE_FEE_KEY, &value, true)?;
        }
        if let Some(value) = lookup(DAILY_REWARD_KEY) {
            config.daily_reward = parse_amount(DAILY_REWARD_KEY, &value, true)?;
        }

        Ok(config)
    }
}

fn parse_amount(key: &str, value: &str, positive: bool) -> Result<TokenAmount> {
    let invalid = || LedgerError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    };

    let amount = TokenAmount::from_str(value).map_err(|_| invalid())?;
    if amount.is_negative() || (positive && amount.is_zero()) {
        return Err(invalid());
    }
    Ok(amount)
}
