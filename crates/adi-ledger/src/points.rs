//! The `Points` balance type and the `Level` permission rank.
//!
//! Points form a closed, bounded economy. Balances never wrap: adding past
//! [`Points::MAX`] clamps to the maximum and subtracting more than the
//! balance clamps to zero. All balance mutations outside this module go
//! through the [`Account`](crate::Account) trait.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// An unsigned point balance or amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(u64);

impl Points {
    /// A zero balance.
    pub const ZERO: Self = Self(0);

    /// The largest representable balance.
    pub const MAX: Self = Self(u64::MAX);

    /// Wrap a raw amount.
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Return the raw amount.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Return whether the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add, clamping at [`Points::MAX`].
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiply a unit price by a count, returning `None` on overflow.
    pub const fn checked_mul(self, count: u64) -> Option<Self> {
        match self.0.checked_mul(count) {
            Some(total) => Some(Self(total)),
            None => None,
        }
    }

    /// How many whole units of `price` this balance can pay for.
    ///
    /// Returns `None` when `price` is zero.
    pub const fn checked_div(self, price: Self) -> Option<u64> {
        self.0.checked_div(price.0)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Points {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

impl FromStr for Points {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

/// A small unsigned permission rank gating command access.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    /// Wrap a raw rank.
    pub const fn new(rank: u8) -> Self {
        Self(rank)
    }

    /// Return the raw rank.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Level {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u8>().map(Self)
    }
}
