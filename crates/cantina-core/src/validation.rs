//! # Validation Module
//!
//! Input validation utilities for Cantina POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI (clap)                                                    │
//! │  ├── Type parsing (numbers, enums)                                      │
//! │  └── Required arguments                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Business rule validation (formats, ranges, minimums)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  ├── UNIQUE constraints (card number, product code, invoice number)     │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cantina_core::validation::{validate_product_code, validate_quantity};
//!
//! validate_product_code("EMP-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MIN_RECHARGE_GUARANIES, MIN_SEARCH_CHARS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 20 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use cantina_core::validation::validate_product_code;
///
/// assert!(validate_product_code("EMP-01").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > 20 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 20,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a non-empty display name (product, child, category, station).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name, 200)
}

/// Validates a phone number: optional `+`, optional leading `1`, then
/// 9 to 15 digits.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "phone".to_string(),
        reason: "expected +999999999 with 9 to 15 digits".to_string(),
    };

    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    // The optional "1" can be read either as a prefix or as part of the body.
    let len = digits.len();
    let fits = (9..=15).contains(&len) || (digits.starts_with('1') && (10..=16).contains(&len));
    if !fits {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a register search query.
///
/// ## Returns
/// - `Ok(None)` when the query is too short to search (fewer than 2 chars)
/// - `Ok(Some(trimmed))` otherwise
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    if query.chars().count() < MIN_SEARCH_CHARS {
        return Ok(None);
    }

    Ok(Some(query.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  sell --item EMP-01:5                                                   │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                   │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"                │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"      │
/// │       │                                                                 │
/// │       └── OK → cart.add_item                                            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free items).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a recharge amount: at least Gs. 1.000.
///
/// ```rust
/// use cantina_core::money::Money;
/// use cantina_core::validation::validate_recharge_amount;
///
/// assert!(validate_recharge_amount(Money::from_guaranies(1_000)).is_ok());
/// assert!(validate_recharge_amount(Money::from_guaranies(999)).is_err());
/// ```
pub fn validate_recharge_amount(amount: Money) -> ValidationResult<()> {
    if amount < Money::from_guaranies(MIN_RECHARGE_GUARANIES) {
        return Err(ValidationError::OutOfRange {
            field: "recharge amount".to_string(),
            min: MIN_RECHARGE_GUARANIES,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount: must be positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points (VAT, commissions): 0% to 100%.
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates stock thresholds: both non-negative and max ≥ min.
pub fn validate_stock_bounds(min_stock: i64, max_stock: i64) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    if max_stock < min_stock {
        return Err(ValidationError::OutOfRange {
            field: "max stock".to_string(),
            min: min_stock,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of unique items).
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use cantina_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("EMP-01").is_ok());
        assert!(validate_product_code("JUGO_1L").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_product_name("Empanada de carne").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
        assert!(validate_name("child name", "Ana", 100).is_ok());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+595981123456").is_ok());
        assert!(validate_phone("0981123456").is_ok());
        assert!(validate_phone("123456789").is_ok());
        assert!(validate_phone("1234567890123456").is_ok());

        assert!(validate_phone("12345678").is_err());
        assert!(validate_phone("0981-123-456").is_err());
        assert!(validate_phone("+").is_err());
        assert!(validate_phone("98765432109876543").is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query(" a ").unwrap(), None);
        assert_eq!(
            validate_search_query(" ana ").unwrap(),
            Some("ana".to_string())
        );
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_guaranies(-1)).is_err());

        assert!(validate_recharge_amount(Money::from_guaranies(50_000)).is_ok());
        assert!(validate_recharge_amount(Money::from_cents(99_999)).is_err());

        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
    }

    #[test]
    fn test_validate_rates_and_bounds() {
        assert!(validate_rate_bps("vat", 1900).is_ok());
        assert!(validate_rate_bps("vat", 10_001).is_err());
        assert!(validate_stock_bounds(5, 100).is_ok());
        assert!(validate_stock_bounds(5, 4).is_err());
        assert!(validate_stock_bounds(-1, 4).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
