//! # Cart
//!
//! The lines a cashier has rung up before payment.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Method                  Cart Change           │
//! │  ──────────────           ──────                  ───────────           │
//! │                                                                         │
//! │  Scan / pick product ───► add_item() ──────────► lines.push(line)       │
//! │                                                  or qty += n            │
//! │  Change quantity ───────► update_quantity() ───► lines[i].qty = n       │
//! │                                                                         │
//! │  Remove ────────────────► remove_item() ───────► lines.remove(i)        │
//! │                                                                         │
//! │  Checkout ──────────────► total() ─────────────► (read only)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices, names and stock are frozen into the line when the product is
//! added. The checkout transaction re-checks stock against the database.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart with a snapshot of the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub code: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub requires_stock: bool,
    /// Stock seen when the line was added.
    pub stock_at_add: i64,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            requires_stock: product.requires_stock,
            stock_at_add: product.stock,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    fn check_stock(&self, quantity: i64) -> CoreResult<()> {
        if self.requires_stock && quantity > self.stock_at_add {
            return Err(CoreError::InsufficientStock {
                code: self.code.clone(),
                available: self.stock_at_add,
                requested: quantity,
            });
        }
        Ok(())
    }
}

/// ## Invariants
/// - Lines are unique by `product_id`
/// - Every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds a product or increases the quantity of its existing line.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(CoreError::invalid_amount("quantity must be positive"));
        }
        if !product.available {
            return Err(CoreError::ProductUnavailable {
                code: product.code.clone(),
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.check_stock(new_qty)?;
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = CartLine::from_product(product, quantity);
        line.check_stock(quantity)?;
        self.lines.push(line);
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        if quantity < 0 {
            return Err(CoreError::invalid_amount("quantity must be positive"));
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        line.check_stock(quantity)?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(CoreError::ProductNotFound(product_id.to_string()));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sale total. Prices are VAT-inclusive so this is what the customer pays.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Rejects an empty cart.
    pub fn ensure_not_empty(&self) -> CoreResult<()> {
        if self.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
