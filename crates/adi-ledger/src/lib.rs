//! Points, accounts, and conservation checks for the adi chat bot economy.
//!
//! Every balance in the bot (user wallets, the bank, the lottery pot) is a
//! [`Points`] value mutated only through the [`Account`] trait. Mutations
//! saturate instead of failing, so a command handler can never crash the
//! dispatcher through arithmetic.
//!
//! # Modules
//!
//! - [`points`] -- [`Points`] and [`Level`] newtypes.
//! - [`account`] -- the [`Account`] capability, [`UserId`], and
//!   [`AccountRef`] account identities.
//! - [`conservation`] -- total-supply accounting and anomaly reports.
//!
//! # Usage
//!
//! ```
//! use adi_ledger::{Account, Points};
//!
//! let mut wallet = Points::new(5);
//! wallet.sub(Points::new(8));
//! assert_eq!(wallet.balance(), Points::ZERO);
//! ```

pub mod account;
pub mod conservation;
pub mod points;

pub use account::{Account, AccountRef, UserId};
pub use conservation::{ConservationResult, total_supply, verify_conservation};
pub use points::{Level, Points};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when moving points between accounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Source and destination are the same account.
    #[error("source and destination are the same account: {account}")]
    SelfTransfer {
        /// The account named on both sides.
        account: AccountRef,
    },

    /// The source cannot cover the amount.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Amount the caller tried to move.
        requested: Points,
        /// Balance of the source account.
        available: Points,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A change of total supply detected by a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Total supply before the checked operations.
    pub before: u128,
    /// Total supply after the checked operations.
    pub after: u128,
    /// Human-readable description.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
