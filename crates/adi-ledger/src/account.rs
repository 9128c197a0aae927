//! The account capability and account identities.
//!
//! Anything that holds a balance implements [`Account`]. Three owners exist
//! in the bot: a user, the global bank, and the lottery pot. Because those
//! live in different structures, callers refer to an account through an
//! [`AccountRef`] and resolve it against the owning state when they need to
//! mutate it. Two references denote the same account iff they are equal,
//! which is what self-transfer detection relies on.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Points;

/// Opaque user identifier assigned by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a platform identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A balance holder.
///
/// Mutations never fail and never panic: `add` clamps at [`Points::MAX`],
/// `sub` clamps at zero.
pub trait Account {
    /// Current balance.
    fn balance(&self) -> Points;

    /// Credit `amount`, saturating.
    fn add(&mut self, amount: Points);

    /// Debit `amount`, saturating.
    fn sub(&mut self, amount: Points);
}

impl Account for Points {
    fn balance(&self) -> Points {
        *self
    }

    fn add(&mut self, amount: Points) {
        *self = self.saturating_add(amount);
    }

    fn sub(&mut self, amount: Points) {
        *self = self.saturating_sub(amount);
    }
}

/// Identity of an account, resolved through the owning state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountRef {
    /// A user's wallet.
    User(UserId),
    /// The house account receiving command charges.
    Bank,
    /// The lottery prize accumulator.
    Pot,
}

impl AccountRef {
    /// Resolve the reserved account names `bank` and `pot`.
    ///
    /// Returns `None` for any other name; those must be looked up in the
    /// user directory.
    pub fn reserved(name: &str) -> Option<Self> {
        match name {
            "bank" => Some(Self::Bank),
            "pot" => Some(Self::Pot),
            _ => None,
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Bank => f.write_str("bank"),
            Self::Pot => f.write_str("pot"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn account_add_and_sub_saturate() {
        let mut wallet = Points::new(10);
        wallet.sub(Points::new(25));
        assert_eq!(wallet.balance(), Points::ZERO);

        let mut full = Points::MAX;
        full.add(Points::new(1));
        assert_eq!(full.balance(), Points::MAX);
    }

    #[test]
    fn reserved_names_resolve() {
        assert_eq!(AccountRef::reserved("bank"), Some(AccountRef::Bank));
        assert_eq!(AccountRef::reserved("pot"), Some(AccountRef::Pot));
        assert_eq!(AccountRef::reserved("alice"), None);
    }

    #[test]
    fn identity_is_by_reference_not_balance() {
        let a = AccountRef::User(UserId::from("U1"));
        let b = AccountRef::User(UserId::from("U2"));
        assert_ne!(a, b);
        assert_eq!(a, AccountRef::User(UserId::from("U1")));
        assert_ne!(AccountRef::Bank, AccountRef::Pot);
    }
}
