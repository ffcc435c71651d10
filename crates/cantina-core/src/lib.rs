//! # cantina-core: Pure Business Logic for Cantina POS
//!
//! This crate holds the rules of the school cantina: money arithmetic,
//! family cards, the stored-value balance policy, cart math, payment
//! splits, invoice numbering and inventory classification. Nothing here
//! touches a database or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cantina POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    cantina CLI (operator)                       │   │
//! │  │   search-card ──► search-product ──► sell ──► invoice           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cantina-db                                   │   │
//! │  │   repositories, atomic ledger, checkout transaction             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls pure functions                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ cantina-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   money   types   card   account   cart   tender   invoice      │   │
//! │  │   inventory   validation   permissions   error                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, Child, Sale, Invoice, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`card`] - Card numbers and security codes
//! - [`account`] - Stored-value balance policy
//! - [`cart`] - Cart lines and totals
//! - [`tender`] - Card / cash / split payment planning
//! - [`invoice`] - Document numbering and VAT split
//! - [`inventory`] - Stock level classification
//! - [`permissions`] - Which role may do what
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cantina_core::account::BalancePolicy;
//! use cantina_core::money::Money;
//!
//! let policy = BalancePolicy::new(Money::from_guaranies(5_000), true, Money::from_guaranies(2_000));
//! assert_eq!(policy.available(), Money::from_guaranies(7_000));
//! ```

pub mod account;
pub mod card;
pub mod cart;
pub mod error;
pub mod inventory;
pub mod invoice;
pub mod money;
pub mod permissions;
pub mod tender;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in a cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Smallest recharge accepted for a card, in whole guaraníes.
pub const MIN_RECHARGE_GUARANIES: i64 = 1_000;

/// Searches shorter than this return no results.
pub const MIN_SEARCH_CHARS: usize = 2;

/// Result cap for card searches at the register.
pub const CARD_SEARCH_LIMIT: u32 = 10;

/// Result cap for product searches at the register.
pub const PRODUCT_SEARCH_LIMIT: u32 = 15;

/// Payment method code for the stored-value card balance.
pub const CARD_BALANCE_METHOD: &str = "saldo_virtual";

/// Payment method code for cash.
pub const CASH_METHOD: &str = "efectivo";
