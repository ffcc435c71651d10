//! # Permissions
//!
//! Which operator role may perform which action.
//!
//! ```text
//! ┌──────────────────────────┬──────────┬─────────┬───────────────┐
//! │ Action                   │ Guardian │ Cashier │ Administrator │
//! ├──────────────────────────┼──────────┼─────────┼───────────────┤
//! │ Sell                     │          │   ✓     │      ✓        │
//! │ Recharge                 │    ✓     │   ✓     │      ✓        │
//! │ Assign card              │    ✓     │         │      ✓        │
//! │ Regenerate card          │          │         │      ✓        │
//! │ Activate/deactivate card │          │         │      ✓        │
//! │ Adjust balance / refund  │          │         │      ✓        │
//! │ Generate invoice         │          │   ✓     │      ✓        │
//! │ Void invoice             │          │         │      ✓        │
//! │ Cancel sale              │          │         │      ✓        │
//! │ Manage stock             │          │         │      ✓        │
//! │ View reports             │          │   ✓     │      ✓        │
//! └──────────────────────────┴──────────┴─────────┴───────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Sell,
    Recharge,
    AssignCard,
    RegenerateCard,
    ToggleCard,
    AdjustBalance,
    GenerateInvoice,
    VoidInvoice,
    CancelSale,
    ManageStock,
    ViewReports,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sell => "sell",
            Action::Recharge => "recharge a card",
            Action::AssignCard => "assign a card",
            Action::RegenerateCard => "regenerate a card",
            Action::ToggleCard => "activate or deactivate a card",
            Action::AdjustBalance => "adjust a balance",
            Action::GenerateInvoice => "generate an invoice",
            Action::VoidInvoice => "void an invoice",
            Action::CancelSale => "cancel a sale",
            Action::ManageStock => "manage stock",
            Action::ViewReports => "view reports",
        }
    }
}

pub fn is_allowed(role: UserRole, action: Action) -> bool {
    use Action::*;
    match role {
        UserRole::Administrator => true,
        UserRole::Cashier => matches!(action, Sell | Recharge | GenerateInvoice | ViewReports),
        UserRole::Guardian => matches!(action, Recharge | AssignCard),
    }
}

/// Returns `Forbidden` when `role` may not perform `action`.
pub fn require(role: UserRole, action: Action) -> CoreResult<()> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            role: role.to_string(),
            action: action.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only_actions() {
        for action in [
            Action::RegenerateCard,
            Action::ToggleCard,
            Action::VoidInvoice,
            Action::CancelSale,
        ] {
            assert!(require(UserRole::Administrator, action).is_ok());
            assert!(require(UserRole::Cashier, action).is_err());
            assert!(require(UserRole::Guardian, action).is_err());
        }
    }

    #[test]
    fn test_assign_card() {
        assert!(is_allowed(UserRole::Guardian, Action::AssignCard));
        assert!(is_allowed(UserRole::Administrator, Action::AssignCard));
        assert!(!is_allowed(UserRole::Cashier, Action::AssignCard));
    }

    #[test]
    fn test_forbidden_message() {
        let err = require(UserRole::Cashier, Action::VoidInvoice).unwrap_err();
        assert_eq!(err.to_string(), "cashier is not allowed to void an invoice");
    }
}
