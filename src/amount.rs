//! Fixed-point token quantities.
//!
//! Balances and fees are carried with exactly four decimal places so that
//! repeated 0.1 token likes never accumulate binary floating-point drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A signed token quantity with exactly 4 decimal places of precision.
///
/// Journal entries use the sign to distinguish debits (negative) from
/// credits (positive); balances are kept non-negative by the transfer engine.
///
/// Every value holds scale 4. Magnitudes that cannot be represented at that
/// scale (roughly 7.9e24 and above) are refused at construction, and the
/// `checked_*` methods return `None` when a result would leave that range.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use token_ledger::TokenAmount;
///
/// let fee = TokenAmount::from_str("0.1").unwrap();
/// assert_eq!(fee.to_string(), "0.1000");
/// assert_eq!((-fee).to_string(), "-0.1000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(Decimal);

impl TokenAmount {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 4;

    /// Zero tokens.
    pub const ZERO: Self = TokenAmount(Decimal::ZERO);

    /// Creates an amount from a `Decimal`, rounding to 4 decimal places.
    ///
    /// Returns `None` if the value is too large to carry 4 decimal places.
    pub fn new(value: Decimal) -> Option<Self> {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        if normalized.scale() != Self::SCALE {
            return None;
        }
        if normalized.is_zero() {
            normalized.set_sign_positive(true);
        }
        Some(TokenAmount(normalized))
    }

    /// Creates an amount from a count of ten-thousandths of a token.
    ///
    /// `TokenAmount::from_minor(1_000)` is 0.1 tokens.
    pub fn from_minor(units: i64) -> Self {
        TokenAmount(Decimal::new(units, Self::SCALE))
    }

    /// Creates an amount from a whole number of tokens.
    pub fn from_whole(tokens: i64) -> Self {
        // |i64| * 10^4 stays well inside the 96-bit mantissa.
        let mut value = Decimal::from(tokens);
        value.rescale(Self::SCALE);
        TokenAmount(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` for amounts strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    /// Returns `true` for amounts strictly less than zero.
    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Adds `rhs`, or `None` if the sum cannot be held at 4 decimal places.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(TokenAmount::new)
    }

    /// Subtracts `rhs`, or `None` if the difference cannot be held at 4 decimal places.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).and_then(TokenAmount::new)
    }
}

impl FromStr for TokenAmount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())?;
        TokenAmount::new(decimal).ok_or(rust_decimal::Error::ExceedsMaximumPossibleValue)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scale is always 4, so the decimal prints its own trailing zeros.
        fmt::Display::fmt(&self.0, f)
    }
}

/// Panics if the sum is out of range; ledger code uses [`TokenAmount::checked_add`].
impl Add for TokenAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match self.checked_add(rhs) {
            Some(sum) => sum,
            None => panic!("token amount overflow: {self} + {rhs}"),
        }
    }
}

impl AddAssign for TokenAmount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Panics if the difference is out of range; ledger code uses [`TokenAmount::checked_sub`].
impl Sub for TokenAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        match self.checked_sub(rhs) {
            Some(difference) => difference,
            None => panic!("token amount overflow: {self} - {rhs}"),
        }
    }
}

impl SubAssign for TokenAmount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for TokenAmount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        if self.0.is_zero() {
            return self;
        }
        TokenAmount(-self.0)
    }
}

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TokenAmount::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a TokenAmount> for TokenAmount {
    fn sum<I: Iterator<Item = &'a TokenAmount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TokenAmount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
