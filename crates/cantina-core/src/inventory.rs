//! # Inventory Rules
//!
//! Stock classification and the labels the register shows.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  requires_stock = false            → Unlimited                          │
//! │  stock ≤ 0                         → Out       (alert: critical)        │
//! │  0 < stock ≤ min                   → Low       (alert: important)       │
//! │  min < stock ≤ 1.2 × min           → Warning   (alert: warning)         │
//! │  otherwise                         → Ok                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    Unlimited,
    Out,
    Low,
    Warning,
    Ok,
}

impl StockLevel {
    /// Alert raised for this level, if any.
    pub fn alert(&self) -> Option<AlertSeverity> {
        match self {
            StockLevel::Out => Some(AlertSeverity::Critical),
            StockLevel::Low => Some(AlertSeverity::Important),
            StockLevel::Warning => Some(AlertSeverity::Warning),
            StockLevel::Unlimited | StockLevel::Ok => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Important,
    Warning,
}

pub fn classify(requires_stock: bool, stock: i64, min_stock: i64) -> StockLevel {
    if !requires_stock {
        return StockLevel::Unlimited;
    }
    if stock <= 0 {
        StockLevel::Out
    } else if stock <= min_stock {
        StockLevel::Low
    } else if stock * 10 <= min_stock * 12 {
        StockLevel::Warning
    } else {
        StockLevel::Ok
    }
}

pub fn can_sell(available: bool, requires_stock: bool, stock: i64, quantity: i64) -> bool {
    if !available || quantity <= 0 {
        return false;
    }
    !requires_stock || stock >= quantity
}

/// `CODE - Name (Stock: n)`, `(Stock: n - BAJO)`, `(SIN STOCK)` or `(Ilimitado)`.
pub fn search_label(code: &str, name: &str, level: StockLevel, stock: i64) -> String {
    let suffix = match level {
        StockLevel::Unlimited => "(Ilimitado)".to_string(),
        StockLevel::Out => "(SIN STOCK)".to_string(),
        StockLevel::Low => format!("(Stock: {} - BAJO)", stock),
        StockLevel::Warning | StockLevel::Ok => format!("(Stock: {})", stock),
    };
    format!("{} - {} {}", code, name, suffix)
}

/// Gross margin over cost, in percent. `None` when cost is zero.
pub fn margin_percent(cost: Money, price: Money) -> Option<f64> {
    if cost.is_zero() {
        return None;
    }
    Some((price - cost).cents() as f64 / cost.cents() as f64 * 100.0)
}

/// Stock valued at cost.
pub fn stock_value(cost: Money, stock: i64) -> Money {
    if stock <= 0 {
        return Money::zero();
    }
    cost.multiply_quantity(stock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(false, 0, 5), StockLevel::Unlimited);
        assert_eq!(classify(true, 0, 5), StockLevel::Out);
        assert_eq!(classify(true, -1, 5), StockLevel::Out);
        assert_eq!(classify(true, 5, 5), StockLevel::Low);
        assert_eq!(classify(true, 6, 5), StockLevel::Warning);
        assert_eq!(classify(true, 7, 5), StockLevel::Ok);
        assert_eq!(classify(true, 12, 10), StockLevel::Warning);
        assert_eq!(classify(true, 13, 10), StockLevel::Ok);
    }

    #[test]
    fn test_alerts() {
        assert_eq!(StockLevel::Out.alert(), Some(AlertSeverity::Critical));
        assert_eq!(StockLevel::Low.alert(), Some(AlertSeverity::Important));
        assert_eq!(StockLevel::Ok.alert(), None);
    }

    #[test]
    fn test_can_sell() {
        assert!(can_sell(true, true, 3, 3));
        assert!(!can_sell(true, true, 3, 4));
        assert!(can_sell(true, false, 0, 50));
        assert!(!can_sell(false, false, 0, 1));
        assert!(!can_sell(true, false, 0, 0));
    }

    #[test]
    fn test_search_label() {
        assert_eq!(
            search_label("EMP-01", "Empanada", StockLevel::Ok, 20),
            "EMP-01 - Empanada (Stock: 20)"
        );
        assert_eq!(
            search_label("EMP-01", "Empanada", StockLevel::Low, 2),
            "EMP-01 - Empanada (Stock: 2 - BAJO)"
        );
        assert_eq!(
            search_label("EMP-01", "Empanada", StockLevel::Out, 0),
            "EMP-01 - Empanada (SIN STOCK)"
        );
        assert_eq!(
            search_label("ALM-01", "Almuerzo", StockLevel::Unlimited, 0),
            "ALM-01 - Almuerzo (Ilimitado)"
        );
    }

    #[test]
    fn test_margin_and_value() {
        let m = margin_percent(Money::from_guaranies(4_000), Money::from_guaranies(5_000)).unwrap();
        assert!((m - 25.0).abs() < 1e-9);
        assert!(margin_percent(Money::zero(), Money::from_guaranies(1)).is_none());
        assert_eq!(
            stock_value(Money::from_guaranies(2_000), 3),
            Money::from_guaranies(6_000)
        );
        assert_eq!(stock_value(Money::from_guaranies(2_000), -3), Money::zero());
    }
}
