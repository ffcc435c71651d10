//! # Domain Types
//!
//! Core domain types used throughout Cantina POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Operator (guardian) ──1:N──► Child ──1:N──► CardTransaction            │
//! │                                 │    └─1:N──► Recharge                  │
//! │                                 │                                       │
//! │  CashierStation ──1:N──► Sale ◄─┘ (optional buyer)                      │
//! │                           ├─1:N──► SaleItem ──► Product ──► Category    │
//! │                           ├─1:N──► SalePayment ──► PaymentMethod        │
//! │                           └─1:1──► Invoice ──1:N──► InvoiceHistoryEntry │
//! │                                                                         │
//! │  Product ──1:N──► StockMovement                                         │
//! │  BillingConfig (single row): numbering counters + VAT                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (product code, card number, sale number, invoice number)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::BalancePolicy;
use crate::card;
use crate::inventory::{self, StockLevel};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the default VAT of 19% is 1900 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product sold at the cantina.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub category_id: Option<String>,

    /// Internal product code - business identifier.
    pub code: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub description: Option<String>,

    /// Cost price in céntimos.
    pub cost_cents: i64,

    /// Sale price in céntimos.
    pub price_cents: i64,

    /// Units on hand. Ignored when `requires_stock` is false.
    pub stock: i64,

    /// Alert threshold.
    pub min_stock: i64,

    /// Recommended ceiling when restocking.
    pub max_stock: i64,

    /// `false` for unlimited items (e.g. made-to-order food).
    pub requires_stock: bool,

    /// Soft on/off switch for the register.
    pub available: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Checks if `quantity` units can be sold right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        inventory::can_sell(self.available, self.requires_stock, self.stock, quantity)
    }

    pub fn stock_level(&self) -> StockLevel {
        inventory::classify(self.requires_stock, self.stock, self.min_stock)
    }

    /// Label used in register search results.
    pub fn search_label(&self) -> String {
        inventory::search_label(&self.code, &self.name, self.stock_level(), self.stock)
    }
}

// =============================================================================
// Stock Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Goods received.
    Entry,
    /// Goods removed outside a sale (waste, internal use).
    Exit,
    /// Manual count correction.
    Adjustment,
    /// Sold at the register.
    Sale,
    /// Returned by a customer.
    Return,
}

/// One change to a product's stock. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: StockMovementKind,
    /// Signed: positive for entries, negative for exits and sales.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reason: Option<String>,
    pub operator_id: Option<String>,
    /// Set on `Sale` movements and on the returns that undo them.
    pub sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// People
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Parent or tutor who funds children's cards.
    Guardian,
    Cashier,
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guardian => "guardian",
            UserRole::Cashier => "cashier",
            UserRole::Administrator => "administrator",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anyone who operates the system: guardians, cashiers, administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Operator {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A guardian's dependent. Holds the family card and its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Child {
    pub id: String,
    pub guardian_id: String,
    pub full_name: String,
    pub grade: Option<String>,
    pub section: Option<String>,

    /// 16-digit card number, unique across children.
    pub card_number: Option<String>,

    /// 4-digit code handed to the family with the card. Checkout does not ask for it.
    pub security_code: Option<String>,

    pub card_active: bool,
    pub card_assigned_at: Option<DateTime<Utc>>,

    /// Stored-value balance in céntimos. May be negative under overdraft.
    pub balance_cents: i64,

    /// Guardian authorised spending below zero.
    pub allow_negative: bool,

    /// How far below zero the balance may go, in céntimos.
    pub negative_limit_cents: i64,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Child {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    pub fn balance_policy(&self) -> BalancePolicy {
        BalancePolicy::new(
            self.balance(),
            self.allow_negative,
            Money::from_cents(self.negative_limit_cents),
        )
    }

    /// Card is usable at the register.
    pub fn card_usable(&self) -> bool {
        self.active && self.card_active && self.card_number.is_some()
    }

    pub fn formatted_card_number(&self) -> Option<String> {
        self.card_number.as_deref().map(card::format_card_number)
    }

    pub fn masked_card_number(&self) -> Option<String> {
        self.card_number.as_deref().map(card::mask_card_number)
    }
}

// =============================================================================
// Card Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CardTransactionKind {
    Purchase,
    Recharge,
    Adjustment,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    Failed,
    Pending,
    Cancelled,
}

/// Immutable ledger row for a card.
///
/// ## Invariant
/// `balance_after_cents == balance_before_cents + amount_cents`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CardTransaction {
    pub id: String,
    pub child_id: String,
    /// Card number at the time of the transaction ("N/A" if none).
    pub card_number: String,
    pub kind: CardTransactionKind,
    /// Signed: credits positive, debits negative.
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub status: TransactionStatus,
    pub operator_id: Option<String>,
    pub station_code: Option<String>,
    pub sale_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CardTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Checks the ledger invariant for this row.
    pub fn is_consistent(&self) -> bool {
        self.balance_before_cents + self.amount_cents == self.balance_after_cents
    }
}

/// A top-up of a child's balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Recharge {
    pub id: String,
    pub child_id: String,
    pub amount_cents: i64,
    pub operator_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Methods & Stations
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: String,
    /// Stable code: `efectivo`, `saldo_virtual`, `tarjeta_debito`, ...
    pub code: String,
    pub name: String,
    /// Commission charged by the provider, in basis points.
    pub commission_bps: u32,
    /// Whether payments by this method produce a legal invoice.
    pub issues_invoice: bool,
    pub active: bool,
    pub sort_order: i64,
}

impl PaymentMethod {
    /// Commission owed on `amount` for this method.
    pub fn commission_on(&self, amount: Money) -> Money {
        amount.percentage(self.commission_bps)
    }
}

/// A register in the cantina.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashierStation {
    pub id: String,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub current_cashier_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Paid,
    Cancelled,
    Returned,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Paid => "paid",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Returned => "returned",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// `V{YYYYMMDD}{NNNN}`
    pub sale_number: String,
    pub station_id: String,
    pub cashier_id: String,
    pub child_id: Option<String>,
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: SaleStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub code_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A payment towards a sale. Split tenders produce several rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method_code: String,
    pub amount_cents: i64,
    pub commission_cents: i64,
    /// For cash: amount the customer handed over.
    pub tendered_cents: Option<i64>,
    /// For cash: change returned.
    pub change_cents: Option<i64>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoicing
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT"))]
pub enum InvoiceKind {
    /// Simple receipt, no VAT breakdown.
    #[serde(rename = "boleta")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "boleta"))]
    Receipt,
    /// VAT-exempt invoice.
    #[serde(rename = "factura")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "factura"))]
    ExemptInvoice,
    /// Invoice with VAT included in the total.
    #[serde(rename = "factura_afecta")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "factura_afecta"))]
    TaxedInvoice,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Receipt => "boleta",
            InvoiceKind::ExemptInvoice => "factura",
            InvoiceKind::TaxedInvoice => "factura_afecta",
        }
    }

    pub fn is_receipt(&self) -> bool {
        matches!(self, InvoiceKind::Receipt)
    }
}

impl std::str::FromStr for InvoiceKind {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "boleta" | "receipt" => Ok(InvoiceKind::Receipt),
            "factura" | "exempt" => Ok(InvoiceKind::ExemptInvoice),
            "factura_afecta" | "taxed" => Ok(InvoiceKind::TaxedInvoice),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "invoice kind".to_string(),
                allowed: vec![
                    "boleta".to_string(),
                    "factura".to_string(),
                    "factura_afecta".to_string(),
                ],
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Voided,
    Expired,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Voided => "voided",
            InvoiceStatus::Expired => "expired",
        }
    }
}

/// A legal document for one sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    /// `BOL-000001` or `FAC-000001`
    pub number: String,
    pub sale_id: String,
    pub kind: InvoiceKind,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_by: Option<String>,
}

/// Company data and numbering counters. A single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillingConfig {
    pub company_name: String,
    pub company_tax_id: String,
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub next_receipt_number: i64,
    pub next_invoice_number: i64,
    pub vat_bps: u32,
    pub issues_receipts: bool,
    pub issues_invoices: bool,
    pub updated_at: DateTime<Utc>,
}

impl BillingConfig {
    #[inline]
    pub fn vat(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_bps)
    }

    pub fn allows(&self, kind: InvoiceKind) -> bool {
        if kind.is_receipt() {
            self.issues_receipts
        } else {
            self.issues_invoices
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceAction {
    Created,
    Issued,
    Voided,
    Modified,
    Printed,
    Emailed,
}

/// Audit trail row for an invoice number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceHistoryEntry {
    pub id: String,
    pub invoice_number: String,
    pub action: InvoiceAction,
    pub description: Option<String>,
    pub operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn child(balance: i64) -> Child {
        let now = Utc::now();
        Child {
            id: "c1".to_string(),
            guardian_id: "g1".to_string(),
            full_name: "Ana Benítez".to_string(),
            grade: Some("3".to_string()),
            section: Some("B".to_string()),
            card_number: Some("5555123456789012".to_string()),
            security_code: Some("1234".to_string()),
            card_active: true,
            card_assigned_at: Some(now),
            balance_cents: balance,
            allow_negative: false,
            negative_limit_cents: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(10.0);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_child_card_helpers() {
        let c = child(0);
        assert!(c.card_usable());
        assert_eq!(
            c.masked_card_number().as_deref(),
            Some("5555-****-****-9012")
        );
        assert_eq!(
            c.formatted_card_number().as_deref(),
            Some("5555-1234-5678-9012")
        );

        let mut inactive = child(0);
        inactive.card_active = false;
        assert!(!inactive.card_usable());
    }

    #[test]
    fn test_card_transaction_consistency() {
        let tx = CardTransaction {
            id: "t".to_string(),
            child_id: "c1".to_string(),
            card_number: "5555123456789012".to_string(),
            kind: CardTransactionKind::Purchase,
            amount_cents: -500,
            balance_before_cents: 1_000,
            balance_after_cents: 500,
            status: TransactionStatus::Succeeded,
            operator_id: None,
            station_code: None,
            sale_id: None,
            note: None,
            created_at: Utc::now(),
        };
        assert!(tx.is_consistent());
    }

    #[test]
    fn test_invoice_kind_parse() {
        assert_eq!("boleta".parse::<InvoiceKind>().unwrap(), InvoiceKind::Receipt);
        assert_eq!(
            "FACTURA_AFECTA".parse::<InvoiceKind>().unwrap(),
            InvoiceKind::TaxedInvoice
        );
        assert!("ticket".parse::<InvoiceKind>().is_err());
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Pending);
    }
}
