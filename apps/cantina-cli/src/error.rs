//! # CLI Error Type
//!
//! Unified error printed by every subcommand.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Cantina CLI                        │
//! │                                                                         │
//! │  cantina sell --card 5555... --item EMP-01:2 --pay card                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<Value, CliError>                                         │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed("...") ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Business rule? ─── CoreError::InsufficientBalance ─ CliError ─►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────► stdout (JSON)  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  stderr: {"code": "INSUFFICIENT_BALANCE", "message": "..."}  exit 1     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cantina_core::{CoreError, ValidationError};
use cantina_db::DbError;
use serde::Serialize;

/// What a failed command prints.
///
/// ```json
/// {
///   "code": "CARD_INACTIVE",
///   "message": "Card is inactive"
/// }
/// ```
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    /// Machine-readable error code for scripts
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    /// Role does not allow the action
    Forbidden,
    InsufficientBalance,
    InsufficientStock,
    CardInactive,
    /// Card assignment or number conflict
    CardError,
    /// Payment split or method problem
    PaymentError,
    /// Invoice state or configuration problem
    InvoiceError,
    /// Any other business rule
    BusinessLogic,
    /// Bad settings or arguments
    ConfigError,
    DatabaseError,
    Internal,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        CliError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::ConfigError, message)
    }

    /// Single-line JSON for stderr.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL","message":"{}"}}"#, self.message)
        })
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => core.into(),
            DbError::NotFound { entity, id } => CliError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => CliError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                CliError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violation: {}", message);
                CliError::new(ErrorCode::BusinessLogic, "Operation violates a data constraint")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but print a generic message
                tracing::error!("Database query failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Busy => CliError::new(ErrorCode::DatabaseError, "Database is busy, try again"),
            DbError::PoolExhausted => {
                CliError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                CliError::new(ErrorCode::Internal, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match err {
            CoreError::ProductNotFound(_)
            | CoreError::ChildNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::InvoiceNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } | CoreError::ProductUnavailable { .. } => {
                ErrorCode::InsufficientStock
            }
            CoreError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            CoreError::CardInactive => ErrorCode::CardInactive,
            CoreError::CardAlreadyAssigned { .. } | CoreError::CardNumberInUse(_) => {
                ErrorCode::CardError
            }
            CoreError::InvalidTender { .. } | CoreError::UnknownPaymentMethod(_) => {
                ErrorCode::PaymentError
            }
            CoreError::InvoiceAlreadyExists(_)
            | CoreError::InvoiceAlreadyVoided(_)
            | CoreError::NotInvoiceable(_)
            | CoreError::DocumentKindDisabled { .. } => ErrorCode::InvoiceError,
            CoreError::Forbidden { .. } => ErrorCode::Forbidden,
            CoreError::InvalidAmount { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InvalidSaleStatus { .. }
            | CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::NoActiveStation
            | CoreError::StationNotAssigned { .. } => ErrorCode::BusinessLogic,
        };
        CliError::new(code, message)
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::validation(err.to_string())
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::config(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(ErrorCode::Internal, format!("Could not encode output: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantina_core::Money;

    #[test]
    fn test_business_errors_keep_their_message() {
        let err: CliError = DbError::Core(CoreError::InsufficientBalance {
            available: Money::from_guaranies(2_000),
            required: Money::from_guaranies(5_000),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
        assert!(err.message.starts_with("Insufficient balance"));
    }

    #[test]
    fn test_query_failures_are_not_leaked() {
        let err: CliError = DbError::QueryFailed("near \"SELEC\": syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_json_shape() {
        let json = CliError::new(ErrorCode::CardInactive, "Card is inactive").to_json();
        assert_eq!(json, r#"{"code":"CARD_INACTIVE","message":"Card is inactive"}"#);
    }
}
