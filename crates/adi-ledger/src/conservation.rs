//! Conservation checks over the point economy.
//!
//! Points move between users, the bank, and the pot but are never minted
//! or burned by a transfer. The only way the total supply changes is
//! saturation: crediting an account already at [`Points::MAX`] drops the
//! excess, and debiting more than an account holds while the other side
//! is credited in full mints the difference.
//!
//! For a sequence of operations the check is:
//!
//! ```text
//! sum(all balances before) == sum(all balances after)
//! ```
//!
//! Totals are accumulated in `u128` so that summing many `u64` balances
//! cannot overflow.

use crate::{LedgerAnomaly, Points};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The total supply is unchanged.
    Balanced,
    /// The total supply changed.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Return whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Sum a set of balances without overflow.
pub fn total_supply<I>(balances: I) -> u128
where
    I: IntoIterator<Item = Points>,
{
    balances
        .into_iter()
        .fold(0u128, |acc, p| acc.saturating_add(u128::from(p.value())))
}

/// Compare two supply totals taken around a sequence of operations.
pub fn verify_conservation(before: u128, after: u128) -> ConservationResult {
    if before == after {
        return ConservationResult::Balanced;
    }

    let anomaly = LedgerAnomaly {
        before,
        after,
        message: format!("LEDGER_ANOMALY: total supply changed from {before} to {after}"),
    };
    tracing::warn!(before, after, "conservation check failed");
    ConservationResult::Anomaly(anomaly)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        assert_eq!(total_supply(Vec::new()), 0);
    }

    #[test]
    fn supply_of_max_balances_does_not_overflow() {
        let total = total_supply([Points::MAX, Points::MAX, Points::new(1)]);
        assert_eq!(
            total,
            u128::from(u64::MAX)
                .saturating_mul(2)
                .saturating_add(1)
        );
    }

    #[test]
    fn equal_totals_are_balanced() {
        assert_eq!(verify_conservation(100, 100), ConservationResult::Balanced);
    }

    #[test]
    fn changed_total_is_anomaly() {
        let result = verify_conservation(100, 105);
        match result {
            ConservationResult::Anomaly(anomaly) => {
                assert_eq!(anomaly.before, 100);
                assert_eq!(anomaly.after, 105);
                assert!(anomaly.message.contains("LEDGER_ANOMALY"));
            }
            ConservationResult::Balanced => panic!("expected anomaly"),
        }
    }
}
