//! # cantina-db: Database Layer for Cantina POS
//!
//! SQLite persistence for the cantina: catalog and stock, families and
//! cards, the stored-value ledger, sales, invoices and reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cantina POS Data Flow                            │
//! │                                                                         │
//! │  cantina sell --card 5555... --item EMP-01:2                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    cantina-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ products      │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ families      │    │ 001_initial  │   │   │
//! │  │   │ checkout()    │    │ cards         │    │              │   │   │
//! │  │   │               │    │ stations      │    │              │   │   │
//! │  │   │               │    │ sales         │    │              │   │   │
//! │  │   │               │    │ invoices      │    │              │   │   │
//! │  │   │               │    │ reports       │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   cantina.db                                                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`checkout`] - The atomic sale transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cantina_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("cantina.db")).await?;
//!
//! let cards = db.families().search_cards("5555 1234", 10).await?;
//! let receipt = db.checkout(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutLine, CheckoutReceipt, CheckoutRequest, InvoiceRequest};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::card::{CardRepository, LedgerContext, RechargeReceipt};
pub use repository::family::{FamilyRepository, NewChild, NewOperator};
pub use repository::invoice::{
    BillingUpdate, CustomerInfo, InvoiceFilter, InvoiceRepository, InvoiceSummary,
};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::report::{DateRange, ReportRepository};
pub use repository::sale::{SaleDetail, SaleRepository};
pub use repository::station::{NewPaymentMethod, StationRepository};
