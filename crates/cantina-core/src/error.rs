//! # Error Types
//!
//! Domain-specific error types for cantina-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cantina-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cantina-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  CLI errors (in app)                                                   │
//! │  └── CliError         - What the operator sees ({code, message})       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → CliError → stdout       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Every variant is a *rejection*: the operation did not happen and no
/// partial state was written.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product is flagged unavailable for sale.
    #[error("Product {code} is not available for sale")]
    ProductUnavailable { code: String },

    /// Trying to sell more than the stock on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "EMP-01", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    #[error("Child not found: {0}")]
    ChildNotFound(String),

    /// Card is deactivated, never assigned, or its holder is inactive.
    #[error("Card is inactive")]
    CardInactive,

    /// The child already holds a card number.
    #[error("{child} already has a card assigned")]
    CardAlreadyAssigned { child: String },

    /// Card number is taken by another child.
    #[error("Card number {0} is already in use")]
    CardNumberInUse(String),

    /// The purchase would push the balance below the permitted floor.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Payment split does not add up or is otherwise unusable.
    #[error("Invalid tender: {reason}")]
    InvalidTender { reason: String },

    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The sale is in a status that forbids the operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("No active cashier station")]
    NoActiveStation,

    #[error("Station {station} is not attached to this cashier")]
    StationNotAssigned { station: String },

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Sale {0} already has an invoice")]
    InvoiceAlreadyExists(String),

    #[error("Invoice {0} is already voided")]
    InvoiceAlreadyVoided(String),

    /// None of the sale's payment methods issues invoices.
    #[error("Sale {0} was paid only with methods that do not issue invoices")]
    NotInvoiceable(String),

    /// Document kind disabled in the billing configuration.
    #[error("{kind} documents are disabled")]
    DocumentKindDisabled { kind: String },

    /// Operator role does not allow the action.
    #[error("{role} is not allowed to {action}")]
    Forbidden { role: String, action: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn invalid_tender(reason: impl Into<String>) -> Self {
        CoreError::InvalidTender {
            reason: reason.into(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., card number, UUID, phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "EMP-01".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for EMP-01: available 3, requested 5"
        );

        let err = CoreError::InsufficientBalance {
            available: Money::from_guaranies(4_000),
            required: Money::from_guaranies(7_500),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: available Gs. 4.000, required Gs. 7.500"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
