//! # Stored-Value Account
//!
//! Balance rules for a child's family card.
//!
//! ## Available Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   overdraft OFF            overdraft ON (limit L)                       │
//! │   ─────────────            ──────────────────────                       │
//! │   available = max(bal, 0)  available = bal + L                          │
//! │   floor     = 0            floor     = -L                               │
//! │                                                                         │
//! │   A purchase of `amount` is allowed when amount ≤ available,            │
//! │   i.e. when bal - amount ≥ floor.                                       │
//! │                                                                         │
//! │   The database applies the same rule in one statement:                  │
//! │     UPDATE children SET balance = balance - ?                           │
//! │      WHERE id = ? AND balance - ? >= floor                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checks in this module are the pre-flight answer shown to the
//! cashier. The conditional UPDATE is the authoritative one.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Snapshot of a card's spending rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePolicy {
    pub balance: Money,
    pub allow_negative: bool,
    pub negative_limit: Money,
}

impl BalancePolicy {
    pub fn new(balance: Money, allow_negative: bool, negative_limit: Money) -> Self {
        BalancePolicy {
            balance,
            allow_negative,
            negative_limit: negative_limit.abs(),
        }
    }

    /// What the holder can spend right now.
    pub fn available(&self) -> Money {
        if self.allow_negative {
            self.balance + self.negative_limit
        } else if self.balance.is_negative() {
            Money::zero()
        } else {
            self.balance
        }
    }

    /// Lowest balance a purchase may leave behind.
    pub fn floor(&self) -> Money {
        if self.allow_negative {
            -self.negative_limit
        } else {
            Money::zero()
        }
    }

    /// Checks a purchase and returns the resulting balance change.
    pub fn authorize_purchase(
        &self,
        card_active: bool,
        child_active: bool,
        amount: Money,
    ) -> CoreResult<BalanceChange> {
        if !card_active || !child_active {
            return Err(CoreError::CardInactive);
        }
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount("purchase amount must be positive"));
        }
        let available = self.available();
        if amount > available {
            return Err(CoreError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        Ok(BalanceChange::apply(self.balance, -amount))
    }
}

/// One movement of a balance. Mirrors a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub before: Money,
    /// Signed: credits positive, debits negative.
    pub amount: Money,
    pub after: Money,
}

impl BalanceChange {
    pub fn apply(before: Money, amount: Money) -> Self {
        BalanceChange {
            before,
            amount,
            after: before + amount,
        }
    }

    /// Rebuilds a change from the balance a conditional UPDATE returned.
    pub fn from_after(after: Money, amount: Money) -> Self {
        BalanceChange {
            before: after - amount,
            amount,
            after,
        }
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.before + self.amount == self.after
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gs(v: i64) -> Money {
        Money::from_guaranies(v)
    }

    #[test]
    fn test_available_without_overdraft() {
        assert_eq!(BalancePolicy::new(gs(5_000), false, gs(0)).available(), gs(5_000));
        // overdraft disabled later: a leftover negative balance counts as zero
        assert_eq!(BalancePolicy::new(gs(-1_000), false, gs(3_000)).available(), gs(0));
    }

    #[test]
    fn test_available_with_overdraft() {
        let policy = BalancePolicy::new(gs(5_000), true, gs(2_000));
        assert_eq!(policy.available(), gs(7_000));
        assert_eq!(policy.floor(), gs(-2_000));

        let in_debt = BalancePolicy::new(gs(-1_500), true, gs(2_000));
        assert_eq!(in_debt.available(), gs(500));
    }

    #[test]
    fn test_authorize_purchase() {
        let policy = BalancePolicy::new(gs(5_000), true, gs(2_000));

        let change = policy.authorize_purchase(true, true, gs(7_000)).unwrap();
        assert_eq!(change.after, gs(-2_000));
        assert!(change.is_consistent());

        assert!(matches!(
            policy.authorize_purchase(true, true, gs(7_001)),
            Err(CoreError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            policy.authorize_purchase(false, true, gs(100)),
            Err(CoreError::CardInactive)
        ));
        assert!(matches!(
            policy.authorize_purchase(true, false, gs(100)),
            Err(CoreError::CardInactive)
        ));
        assert!(matches!(
            policy.authorize_purchase(true, true, gs(0)),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_balance_change_from_after() {
        let change = BalanceChange::from_after(gs(3_000), gs(-2_000));
        assert_eq!(change.before, gs(5_000));
        assert!(change.is_consistent());
    }
}
