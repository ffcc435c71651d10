//! # Repository Module
//!
//! Database repository implementations for Cantina POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Transactions                        │
//! │                                                                         │
//! │  CLI command                                                            │
//! │       │  db.cards().recharge(child, amount, ...)                        │
//! │       ▼                                                                 │
//! │  CardRepository (owns a pool clone)                                     │
//! │       │  pool.begin() ──► tx                                            │
//! │       ▼                                                                 │
//! │  card::charge(&mut tx, ...)                 ◄── also called by          │
//! │       │                                         Database::checkout      │
//! │       ▼                                         inside ITS transaction  │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repository methods that write open their own transaction. The
//! statement-level helpers take `&mut SqliteConnection` so the checkout
//! can compose several of them into one atomic unit.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog, search, stock movements
//! - [`FamilyRepository`](family::FamilyRepository) - Operators and children
//! - [`CardRepository`](card::CardRepository) - Card issuing and the balance ledger
//! - [`StationRepository`](station::StationRepository) - Payment methods, cashier stations
//! - [`SaleRepository`](sale::SaleRepository) - Sale lookups and status changes
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Billing config, numbering, voiding
//! - [`ReportRepository`](report::ReportRepository) - Aggregates for the back office

use uuid::Uuid;

pub mod card;
pub mod family;
pub mod invoice;
pub mod product;
pub mod report;
pub mod sale;
pub mod station;

/// New UUID v4 string for a row id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// `%term%` for LIKE, with the LIKE wildcards in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("EMP_01"), "%EMP\\_01%");
    }
}
