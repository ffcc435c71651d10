//! # Invoice Rules
//!
//! Document numbers, sale numbers and the VAT split.
//!
//! ## Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Receipt (boleta)           BOL-000001, BOL-000002, ...                 │
//! │  Invoice (factura, either)  FAC-000001, FAC-000002, ...                 │
//! │  Sale                       V202610180001  (V + date + daily sequence)  │
//! │                                                                         │
//! │  Counters live in the database and are bumped with                      │
//! │  UPDATE ... SET next = next + 1 RETURNING next - 1                      │
//! │  inside the transaction that inserts the document.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## VAT Split
//! Shelf prices include VAT. A taxed invoice shows the split:
//! `subtotal = total / (1 + vat)`, `tax = total - subtotal`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{InvoiceKind, InvoiceStatus, TaxRate};

pub const RECEIPT_PREFIX: &str = "BOL";
pub const INVOICE_PREFIX: &str = "FAC";

/// Prefix for a document kind. Both factura kinds share one series.
pub fn document_prefix(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::Receipt => RECEIPT_PREFIX,
        InvoiceKind::ExemptInvoice | InvoiceKind::TaxedInvoice => INVOICE_PREFIX,
    }
}

/// `format_document_number(Receipt, 42)` → `BOL-000042`.
pub fn format_document_number(kind: InvoiceKind, sequence: i64) -> String {
    format!("{}-{:06}", document_prefix(kind), sequence)
}

/// `V` + `YYYYMMDD` + 4-digit daily sequence.
///
/// ```rust
/// use cantina_core::invoice::format_sale_number;
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
/// assert_eq!(format_sale_number(day, 7), "V202603090007");
/// ```
pub fn format_sale_number(day: NaiveDate, sequence: i64) -> String {
    format!("V{}{:04}", day.format("%Y%m%d"), sequence)
}

/// Amounts printed on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSplit {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Splits a VAT-inclusive total for the given document kind.
///
/// Receipts and exempt invoices carry no tax line.
pub fn split_tax(kind: InvoiceKind, total: Money, vat: TaxRate) -> TaxSplit {
    match kind {
        InvoiceKind::TaxedInvoice if !vat.is_zero() => {
            let subtotal = net_of_vat(total, vat);
            TaxSplit {
                subtotal,
                tax: total - subtotal,
                total,
            }
        }
        _ => TaxSplit {
            subtotal: total,
            tax: Money::zero(),
            total,
        },
    }
}

/// `total / (1 + bps/10000)`, rounded half away from zero to the céntimo.
fn net_of_vat(total: Money, vat: TaxRate) -> Money {
    let num = total.cents() as i128 * 10_000;
    let den = 10_000 + vat.bps() as i128;
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    Money::from_cents(rounded as i64)
}

/// Tax as a percentage of the subtotal, for display.
pub fn effective_tax_percent(subtotal: Money, tax: Money) -> f64 {
    if subtotal.is_zero() {
        return 0.0;
    }
    tax.cents() as f64 / subtotal.cents() as f64 * 100.0
}

/// Draft → Issued. Anything else is left alone.
pub fn issue(status: InvoiceStatus) -> InvoiceStatus {
    match status {
        InvoiceStatus::Draft => InvoiceStatus::Issued,
        other => other,
    }
}

/// Checks that an invoice may be voided.
pub fn ensure_can_void(number: &str, status: InvoiceStatus) -> CoreResult<()> {
    if status == InvoiceStatus::Voided {
        return Err(CoreError::InvoiceAlreadyVoided(number.to_string()));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_numbers() {
        assert_eq!(format_document_number(InvoiceKind::Receipt, 1), "BOL-000001");
        assert_eq!(
            format_document_number(InvoiceKind::ExemptInvoice, 123),
            "FAC-000123"
        );
        assert_eq!(
            format_document_number(InvoiceKind::TaxedInvoice, 123),
            "FAC-000123"
        );
    }

    #[test]
    fn test_split_taxed_invoice() {
        let total = Money::from_guaranies(11_900);
        let split = split_tax(InvoiceKind::TaxedInvoice, total, TaxRate::from_bps(1900));
        assert_eq!(split.subtotal, Money::from_guaranies(10_000));
        assert_eq!(split.tax, Money::from_guaranies(1_900));
        assert_eq!(split.subtotal + split.tax, split.total);
    }

    #[test]
    fn test_split_rounds_to_centimo() {
        // 10.000 / 1.19 = 8403.3613... → 840336 céntimos
        let split = split_tax(
            InvoiceKind::TaxedInvoice,
            Money::from_guaranies(10_000),
            TaxRate::from_bps(1900),
        );
        assert_eq!(split.subtotal.cents(), 840_336);
        assert_eq!(split.tax.cents(), 159_664);
    }

    #[test]
    fn test_split_receipt_and_exempt() {
        let total = Money::from_guaranies(5_000);
        for kind in [InvoiceKind::Receipt, InvoiceKind::ExemptInvoice] {
            let split = split_tax(kind, total, TaxRate::from_bps(1900));
            assert_eq!(split.subtotal, total);
            assert!(split.tax.is_zero());
        }
    }

    #[test]
    fn test_effective_tax_percent() {
        let pct = effective_tax_percent(Money::from_guaranies(10_000), Money::from_guaranies(1_900));
        assert!((pct - 19.0).abs() < 1e-9);
        assert_eq!(effective_tax_percent(Money::zero(), Money::zero()), 0.0);
    }

    #[test]
    fn test_status_transitions() {
        assert_eq!(issue(InvoiceStatus::Draft), InvoiceStatus::Issued);
        assert_eq!(issue(InvoiceStatus::Voided), InvoiceStatus::Voided);
        assert!(ensure_can_void("BOL-000001", InvoiceStatus::Issued).is_ok());
        assert!(matches!(
            ensure_can_void("BOL-000001", InvoiceStatus::Voided),
            Err(CoreError::InvoiceAlreadyVoided(_))
        ));
    }
}
