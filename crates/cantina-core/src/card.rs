//! # Family Card Module
//!
//! Card numbers and security codes for the stored-value family card.
//!
//! ## Card Number Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   5555  1234  5678  9012                                                │
//! │   ────  ──────────────────                                              │
//! │   │     └── 12 random digits                                            │
//! │   └── fixed issuer prefix                                               │
//! │                                                                         │
//! │   Formatted:  5555-1234-5678-9012                                       │
//! │   Masked:     5555-****-****-9012   (receipts, search results)          │
//! │   Security:   4 random digits, returned when the card is issued,        │
//! │               hidden in search results, not asked for at checkout       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Uniqueness is not guaranteed here. The database enforces it with a
//! UNIQUE index and the caller retries on collision.

use rand::Rng;

use crate::error::ValidationError;

/// Issuer prefix for every family card.
pub const CARD_PREFIX: &str = "5555";

/// Total digits in a card number.
pub const CARD_NUMBER_LEN: usize = 16;

/// Digits in a security code.
pub const SECURITY_CODE_LEN: usize = 4;

/// Generates a fresh card number: the issuer prefix plus 12 random digits.
pub fn generate_card_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut number = String::with_capacity(CARD_NUMBER_LEN);
    number.push_str(CARD_PREFIX);
    for _ in CARD_PREFIX.len()..CARD_NUMBER_LEN {
        number.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    number
}

/// Generates a 4-digit security code. Leading zeros are kept.
pub fn generate_security_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:04}", rng.gen_range(0..10_000u32))
}

/// Strips the separators an operator may type (`-` and spaces).
pub fn normalize_card_number(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Validates a card number after normalization.
///
/// ```rust
/// use cantina_core::card::validate_card_number;
///
/// assert!(validate_card_number("5555-1234-5678-9012").is_ok());
/// assert!(validate_card_number("1234").is_err());
/// ```
pub fn validate_card_number(input: &str) -> Result<String, ValidationError> {
    let number = normalize_card_number(input);

    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "card number".to_string(),
        });
    }

    if number.len() != CARD_NUMBER_LEN || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "card number".to_string(),
            reason: format!("must be {} digits", CARD_NUMBER_LEN),
        });
    }

    Ok(number)
}

pub fn validate_security_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.len() != SECURITY_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "security code".to_string(),
            reason: format!("must be {} digits", SECURITY_CODE_LEN),
        });
    }
    Ok(())
}

/// `5555123456789012` → `5555-1234-5678-9012`.
///
/// Input that is not a 16-character number is returned unchanged.
pub fn format_card_number(number: &str) -> String {
    if number.len() != CARD_NUMBER_LEN || !number.is_ascii() {
        return number.to_string();
    }
    format!(
        "{}-{}-{}-{}",
        &number[0..4],
        &number[4..8],
        &number[8..12],
        &number[12..16]
    )
}

/// `5555123456789012` → `5555-****-****-9012`.
pub fn mask_card_number(number: &str) -> String {
    if number.len() != CARD_NUMBER_LEN || !number.is_ascii() {
        return number.to_string();
    }
    format!("{}-****-****-{}", &number[0..4], &number[12..16])
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_card_number_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let number = generate_card_number(&mut rng);
            assert_eq!(number.len(), 16);
            assert!(number.starts_with("5555"));
            assert!(validate_card_number(&number).is_ok());
        }
    }

    #[test]
    fn test_generate_security_code_keeps_leading_zeros() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let code = generate_security_code(&mut rng);
            assert_eq!(code.len(), 4);
            assert!(validate_security_code(&code).is_ok());
        }
    }

    #[test]
    fn test_format_and_mask() {
        assert_eq!(format_card_number("5555123456789012"), "5555-1234-5678-9012");
        assert_eq!(mask_card_number("5555123456789012"), "5555-****-****-9012");
        assert_eq!(format_card_number("123"), "123");
        assert_eq!(mask_card_number("N/A"), "N/A");
    }

    #[test]
    fn test_validate_card_number() {
        assert_eq!(
            validate_card_number(" 5555 1234 5678 9012 ").unwrap(),
            "5555123456789012"
        );
        assert!(validate_card_number("").is_err());
        assert!(validate_card_number("5555-1234-5678-901X").is_err());
        assert!(validate_card_number("55551234567890123").is_err());
    }

    #[test]
    fn test_validate_security_code() {
        assert!(validate_security_code("0042").is_ok());
        assert!(validate_security_code("42").is_err());
        assert!(validate_security_code("abcd").is_err());
    }
}
