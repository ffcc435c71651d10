//! # Money Module
//!
//! Provides the `Money` type for handling guaraní amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A card balance that drifts by a fraction after a thousand purchases   │
//! │  no longer matches its own ledger.                                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer céntimos                                         │
//! │    Gs. 15.000 is stored as 1_500_000 céntimos                           │
//! │    Every sum, split and commission is exact or explicitly rounded       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guaraní has no coins below one unit in circulation, so display
//! always shows whole guaraníes. Two decimal places are still kept
//! internally so that VAT splits and commissions round once, at the end.
//!
//! ## Usage
//! ```rust
//! use cantina_core::money::Money;
//!
//! let price = Money::from_guaranies(3_500);
//! let total = price * 2_i64 + Money::from_guaranies(1_000);
//! assert_eq!(total.to_string(), "Gs. 8.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::error::ValidationError;

/// Minor units (céntimos) per guaraní.
pub const MINOR_PER_UNIT: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in céntimos.
///
/// ## Design Decisions
/// - **i64 (signed)**: card balances may be negative under an overdraft
///   allowance, and ledger amounts are signed (debits negative)
/// - **Single field tuple struct**: zero-cost wrapper over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from céntimos.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole guaraníes.
    ///
    /// ```rust
    /// use cantina_core::money::Money;
    ///
    /// assert_eq!(Money::from_guaranies(15_000).cents(), 1_500_000);
    /// ```
    #[inline]
    pub const fn from_guaranies(guaranies: i64) -> Self {
        Money(guaranies * MINOR_PER_UNIT)
    }

    /// Returns the value in céntimos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-guaraní part, truncated toward zero.
    #[inline]
    pub const fn guaranies(&self) -> i64 {
        self.0 / MINOR_PER_UNIT
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half away from zero.
    ///
    /// Used for payment method commissions: a 3.5% commission is 350 bps.
    ///
    /// ```rust
    /// use cantina_core::money::Money;
    ///
    /// let paid = Money::from_guaranies(10_000);
    /// assert_eq!(paid.percentage(350), Money::from_guaranies(350));
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let raw = self.0 as i128 * bps as i128;
        let rounded = if raw >= 0 {
            (raw + 5_000) / 10_000
        } else {
            (raw - 5_000) / 10_000
        };
        Money(rounded as i64)
    }

    /// Parses an operator-entered amount such as `15.000`, `Gs. 15.000`
    /// or `15000`. Dots are thousands separators; a trailing `,NN` is
    /// accepted as céntimos.
    pub fn parse_guaranies(input: &str) -> Result<Money, ValidationError> {
        let invalid = || ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' is not a guaraní amount", input.trim()),
        };

        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix("Gs.")
            .or_else(|| trimmed.strip_prefix("Gs"))
            .unwrap_or(trimmed)
            .trim();

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once(',') {
            Some((w, f)) => (w, Some(f)),
            None => (digits, None),
        };

        let whole: String = whole.chars().filter(|c| *c != '.').collect();
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let units: i64 = whole.parse().map_err(|_| invalid())?;

        let minor = match frac {
            None => 0,
            Some(f) if f.len() == 2 && f.chars().all(|c| c.is_ascii_digit()) => {
                f.parse::<i64>().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
        };

        let cents = units
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Formats without the currency symbol, e.g. `15.000`.
    pub fn format_plain(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}", sign, group_thousands(self.guaranies().unsigned_abs()))
    }
}

fn group_thousands(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut groups = Vec::new();
    while value > 0 {
        groups.push(value % 1_000);
        value /= 1_000;
    }
    let mut out = groups.pop().map(|g| g.to_string()).unwrap_or_default();
    while let Some(g) = groups.pop() {
        out.push_str(&format!(".{:03}", g));
    }
    out
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money the way receipts print it: `Gs. 15.000`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gs. {}", self.format_plain())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_guaranies() {
        let money = Money::from_guaranies(15_000);
        assert_eq!(money.cents(), 1_500_000);
        assert_eq!(money.guaranies(), 15_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_guaranies(15_000).to_string(), "Gs. 15.000");
        assert_eq!(Money::from_guaranies(1_234_567).to_string(), "Gs. 1.234.567");
        assert_eq!(Money::from_guaranies(500).to_string(), "Gs. 500");
        assert_eq!(Money::zero().to_string(), "Gs. 0");
        assert_eq!(Money::from_guaranies(-2_500).to_string(), "Gs. -2.500");
        // céntimos are truncated on display
        assert_eq!(Money::from_cents(150_099).to_string(), "Gs. 1.500");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_guaranies(10_000);
        let b = Money::from_guaranies(4_000);

        assert_eq!(a + b, Money::from_guaranies(14_000));
        assert_eq!(a - b, Money::from_guaranies(6_000));
        assert_eq!(b - a, Money::from_guaranies(-6_000));
        assert_eq!(-a, Money::from_guaranies(-10_000));
        assert_eq!(a * 3_i64, Money::from_guaranies(30_000));
        assert_eq!(a.multiply_quantity(2), Money::from_guaranies(20_000));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_guaranies(18_000));
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        // 2.5% of Gs. 1 = 0.025 Gs = 2.5 céntimos → 3
        assert_eq!(Money::from_guaranies(1).percentage(250).cents(), 3);
        assert_eq!(Money::from_guaranies(-1).percentage(250).cents(), -3);
        assert_eq!(Money::from_guaranies(20_000).percentage(0), Money::zero());
    }

    #[test]
    fn test_parse_guaranies() {
        assert_eq!(
            Money::parse_guaranies("15.000").unwrap(),
            Money::from_guaranies(15_000)
        );
        assert_eq!(
            Money::parse_guaranies("Gs. 1.500").unwrap(),
            Money::from_guaranies(1_500)
        );
        assert_eq!(
            Money::parse_guaranies("2500").unwrap(),
            Money::from_guaranies(2_500)
        );
        assert_eq!(Money::parse_guaranies("10,50").unwrap().cents(), 1_050);
        assert_eq!(
            Money::parse_guaranies("-300").unwrap(),
            Money::from_guaranies(-300)
        );

        assert!(Money::parse_guaranies("").is_err());
        assert!(Money::parse_guaranies("abc").is_err());
        assert!(Money::parse_guaranies("10,5").is_err());
        assert!(Money::parse_guaranies("99999999999999999999").is_err());
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert_eq!(Money::from_cents(-550).abs().cents(), 550);
    }
}
