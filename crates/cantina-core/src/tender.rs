//! # Tender Planning
//!
//! Turns the cashier's payment choice into the exact amounts charged to
//! the card balance and to an external method.
//!
//! ## Tender Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Card       total on the card             total ≤ available             │
//! │  Cash       total in cash                 received ≥ total              │
//! │                                           change = received - total     │
//! │  Mixed      card + one other method       0 < external < total          │
//! │             card part = total - external  card part ≤ available         │
//! │                                           cash: received ≥ external     │
//! │  External   total on one non-card method  (debit, credit, transfer)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Planning is pure. The checkout transaction charges the card with the
//! atomic guard, so a plan that was valid here can still be rejected there
//! if another register spent the balance first.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::{CARD_BALANCE_METHOD, CASH_METHOD};

/// How the customer wants to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tender {
    Card,
    Cash {
        received: Money,
    },
    Mixed {
        method_code: String,
        external_amount: Money,
        /// Cash handed over for the external part. Defaults to the exact amount.
        received: Option<Money>,
    },
    External {
        method_code: String,
        reference: Option<String>,
    },
}

impl Tender {
    pub fn uses_card(&self) -> bool {
        matches!(self, Tender::Card | Tender::Mixed { .. })
    }
}

/// The non-card part of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPart {
    pub method_code: String,
    pub amount: Money,
    pub reference: Option<String>,
    /// Cash only.
    pub received: Option<Money>,
    /// Cash only.
    pub change: Option<Money>,
}

/// Resolved amounts for one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderPlan {
    /// Amount to debit from the card balance. Zero when the card is not used.
    pub card_amount: Money,
    pub external: Option<ExternalPart>,
}

impl TenderPlan {
    pub fn uses_card(&self) -> bool {
        self.card_amount.is_positive()
    }

    pub fn change(&self) -> Money {
        self.external
            .as_ref()
            .and_then(|e| e.change)
            .unwrap_or_else(Money::zero)
    }

    /// Sum of all parts. Always equals the sale total.
    pub fn covered(&self) -> Money {
        self.card_amount + self.external.as_ref().map(|e| e.amount).unwrap_or_default()
    }
}

/// Resolves a tender against a sale total.
///
/// `available` is the card's spendable balance, or `None` when the sale
/// has no card holder.
///
/// ```rust
/// use cantina_core::money::Money;
/// use cantina_core::tender::{plan, Tender};
///
/// let gs = Money::from_guaranies;
/// let p = plan(gs(12_000), &Tender::Cash { received: gs(20_000) }, None).unwrap();
/// assert_eq!(p.change(), gs(8_000));
/// ```
pub fn plan(total: Money, tender: &Tender, available: Option<Money>) -> CoreResult<TenderPlan> {
    if !total.is_positive() {
        return Err(CoreError::invalid_amount("sale total must be positive"));
    }

    match tender {
        Tender::Card => {
            let available = require_card(available)?;
            if total > available {
                return Err(CoreError::InsufficientBalance {
                    available,
                    required: total,
                });
            }
            Ok(TenderPlan {
                card_amount: total,
                external: None,
            })
        }

        Tender::Cash { received } => Ok(TenderPlan {
            card_amount: Money::zero(),
            external: Some(cash_part(total, *received)?),
        }),

        Tender::Mixed {
            method_code,
            external_amount,
            received,
        } => {
            let available = require_card(available)?;
            check_external_code(method_code)?;

            if !external_amount.is_positive() || *external_amount >= total {
                return Err(CoreError::invalid_tender(format!(
                    "external part must be between 0 and {} (exclusive)",
                    total
                )));
            }

            let card_amount = total - *external_amount;
            if card_amount > available {
                return Err(CoreError::InsufficientBalance {
                    available,
                    required: card_amount,
                });
            }

            let external = if method_code == CASH_METHOD {
                cash_part(*external_amount, received.unwrap_or(*external_amount))?
            } else {
                ExternalPart {
                    method_code: method_code.clone(),
                    amount: *external_amount,
                    reference: None,
                    received: None,
                    change: None,
                }
            };

            Ok(TenderPlan {
                card_amount,
                external: Some(external),
            })
        }

        Tender::External {
            method_code,
            reference,
        } => {
            check_external_code(method_code)?;
            let external = if method_code == CASH_METHOD {
                cash_part(total, total)?
            } else {
                ExternalPart {
                    method_code: method_code.clone(),
                    amount: total,
                    reference: reference.clone(),
                    received: None,
                    change: None,
                }
            };
            Ok(TenderPlan {
                card_amount: Money::zero(),
                external: Some(external),
            })
        }
    }
}

fn require_card(available: Option<Money>) -> CoreResult<Money> {
    available.ok_or_else(|| CoreError::invalid_tender("card payment requires a card holder"))
}

fn check_external_code(code: &str) -> CoreResult<()> {
    if code.trim().is_empty() {
        return Err(CoreError::invalid_tender("payment method is required"));
    }
    if code == CARD_BALANCE_METHOD {
        return Err(CoreError::invalid_tender(
            "card balance cannot be the external method",
        ));
    }
    Ok(())
}

fn cash_part(amount: Money, received: Money) -> CoreResult<ExternalPart> {
    if received < amount {
        return Err(CoreError::invalid_tender(format!(
            "received {} is less than {}",
            received, amount
        )));
    }
    Ok(ExternalPart {
        method_code: CASH_METHOD.to_string(),
        amount,
        reference: None,
        received: Some(received),
        change: Some(received - amount),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
