//! # Checkout
//!
//! The register's single write path: one sale, one transaction.
//!
//! ## Transaction Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. sale_counters += 1 for today        ← first statement is a write   │
//! │   2. load station (must be attached to the cashier), child, products    │
//! │   3. build the cart and plan the tender  (cantina-core, pure)           │
//! │   4. INSERT sales (status = paid)                                       │
//! │   5. per line: guarded stock decrement + movement, INSERT sale_items    │
//! │   6. guarded card debit + ledger row (if the card pays a part)          │
//! │   7. INSERT sale_payments (card part, external part, commissions)       │
//! │   8. invoice: counter += 1, INSERT invoices + history (if requested)    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any Err between BEGIN and COMMIT drops the transaction: no stock,      │
//! │  balance, counter or document change survives a rejected sale.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use cantina_core::cart::Cart;
use cantina_core::permissions::{self, Action};
use cantina_core::tender::{plan, Tender};
use cantina_core::validation::validate_quantity;
use cantina_core::{
    CardTransaction, CoreError, Invoice, InvoiceKind, Money, Sale, SaleItem, SalePayment,
    SaleStatus, StockMovement, StockMovementKind, CARD_BALANCE_METHOD,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::card::{charge, LedgerContext};
use crate::repository::family::get_child_conn;
use crate::repository::invoice::{generate_conn, CustomerInfo};
use crate::repository::new_id;
use crate::repository::product::{change_stock, get_by_code_conn, MovementContext};
use crate::repository::sale::{insert_item, insert_payment, insert_sale, next_sale_number};
use crate::repository::station::{get_station_conn, require_method_conn};

/// One product line as typed or scanned at the register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub code: String,
    pub quantity: i64,
}

impl CheckoutLine {
    pub fn new(code: impl Into<String>, quantity: i64) -> Self {
        CheckoutLine {
            code: code.into(),
            quantity,
        }
    }
}

/// Document to issue together with the sale.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    pub kind: InvoiceKind,
    #[serde(default)]
    pub customer: CustomerInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub station_code: String,
    pub cashier_id: String,
    /// Card holder. Required when the card pays any part.
    pub child_id: Option<String>,
    pub customer_name: Option<String>,
    pub lines: Vec<CheckoutLine>,
    pub tender: Tender,
    pub invoice: Option<InvoiceRequest>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
    pub stock_movements: Vec<StockMovement>,
    pub card_transaction: Option<CardTransaction>,
    pub invoice: Option<Invoice>,
    pub change: Money,
    /// Card balance after the sale, when the card paid.
    pub balance_after: Option<Money>,
}

impl Database {
    /// Runs a complete sale atomically.
    ///
    /// ## Returns
    /// * `Err(CoreError::EmptyCart)` - no lines
    /// * `Err(CoreError::NoActiveStation)` - unknown or disabled station
    /// * `Err(CoreError::StationNotAssigned)` - station attached to someone else
    /// * `Err(CoreError::InsufficientStock)` - a line exceeds stock
    /// * `Err(CoreError::InsufficientBalance)` / `CardInactive` - card rejected
    /// * `Err(CoreError::InvalidTender)` - payment split does not work
    pub async fn checkout(&self, request: CheckoutRequest) -> DbResult<CheckoutReceipt> {
        if request.lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        for line in &request.lines {
            validate_quantity(line.quantity)?;
        }

        let cashier = self.families().find_active_operator(&request.cashier_id).await?;
        permissions::require(cashier.role, Action::Sell)?;

        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        // 1. Number first: takes the write lock for the whole sale.
        let sale_number = next_sale_number(&mut tx, now.date_naive()).await?;

        // 2. Context
        let station = get_station_conn(&mut tx, &request.station_code)
            .await?
            .filter(|s| s.active)
            .ok_or(CoreError::NoActiveStation)?;
        if station.current_cashier_id.as_deref() != Some(cashier.id.as_str()) {
            return Err(CoreError::StationNotAssigned {
                station: station.code,
            }
            .into());
        }

        let child = match &request.child_id {
            Some(id) => {
                let child = get_child_conn(&mut tx, id).await?;
                if !child.active {
                    return Err(CoreError::CardInactive.into());
                }
                Some(child)
            }
            None => None,
        };

        // 3. Cart and tender
        let mut cart = Cart::new();
        for line in &request.lines {
            let product = get_by_code_conn(&mut tx, &line.code)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.code.clone()))?;
            cart.add_item(&product, line.quantity)?;
        }
        cart.ensure_not_empty()?;
        let total = cart.total();

        let available = child.as_ref().map(|c| c.balance_policy().available());
        let tender_plan = plan(total, &request.tender, available)?;
        debug_assert_eq!(tender_plan.covered(), total);

        let external_method = match &tender_plan.external {
            Some(part) => Some(require_method_conn(&mut tx, &part.method_code).await?),
            None => None,
        };
        let card_method = if tender_plan.uses_card() {
            Some(require_method_conn(&mut tx, CARD_BALANCE_METHOD).await?)
        } else {
            None
        };

        // 4. Sale header
        let sale = Sale {
            id: new_id(),
            sale_number,
            station_id: station.id.clone(),
            cashier_id: cashier.id.clone(),
            child_id: child.as_ref().map(|c| c.id.clone()),
            customer_name: request
                .customer_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .or_else(|| child.as_ref().map(|c| c.full_name.clone())),
            subtotal_cents: total.cents(),
            discount_cents: 0,
            tax_cents: 0,
            total_cents: total.cents(),
            status: SaleStatus::Paid,
            note: request.note.clone(),
            created_at: now,
            updated_at: now,
        };
        insert_sale(&mut tx, &sale).await?;

        // 5. Lines and stock
        let reason = format!("Sale {}", sale.sale_number);
        let mut items = Vec::with_capacity(cart.item_count());
        let mut movements = Vec::new();
        for line in cart.lines() {
            if line.requires_stock {
                let movement = change_stock(
                    &mut tx,
                    &line.product_id,
                    StockMovementKind::Sale,
                    -line.quantity,
                    MovementContext::new(Some(&reason), Some(&cashier.id)).for_sale(&sale.id),
                )
                .await?;
                movements.push(movement);
            }

            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                code_snapshot: line.code.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                line_total_cents: line.line_total().cents(),
                created_at: now,
            };
            insert_item(&mut tx, &item).await?;
            items.push(item);
        }

        // 6. Card
        let mut payments = Vec::with_capacity(2);
        let card_transaction = match (&card_method, &child) {
            (Some(method), Some(child)) => {
                let ctx = LedgerContext {
                    operator_id: Some(cashier.id.clone()),
                    station_code: Some(station.code.clone()),
                    sale_id: Some(sale.id.clone()),
                    note: Some(reason.clone()),
                };
                let row = charge(&mut tx, &child.id, tender_plan.card_amount, &ctx).await?;

                payments.push(SalePayment {
                    id: new_id(),
                    sale_id: sale.id.clone(),
                    method_code: method.code.clone(),
                    amount_cents: tender_plan.card_amount.cents(),
                    commission_cents: method.commission_on(tender_plan.card_amount).cents(),
                    tendered_cents: None,
                    change_cents: None,
                    reference: Some(row.card_number.clone()),
                    created_at: now,
                });
                Some(row)
            }
            (Some(_), None) => {
                return Err(CoreError::invalid_tender("card payment requires a card holder").into())
            }
            _ => None,
        };

        // 7. External part
        if let (Some(part), Some(method)) = (&tender_plan.external, &external_method) {
            payments.push(SalePayment {
                id: new_id(),
                sale_id: sale.id.clone(),
                method_code: method.code.clone(),
                amount_cents: part.amount.cents(),
                commission_cents: method.commission_on(part.amount).cents(),
                tendered_cents: part.received.map(|m| m.cents()),
                change_cents: part.change.map(|m| m.cents()),
                reference: part.reference.clone(),
                created_at: now,
            });
        }
        for payment in &payments {
            insert_payment(&mut tx, payment).await?;
        }

        // 8. Document
        let invoice = match &request.invoice {
            Some(req) => {
                Some(generate_conn(&mut tx, &sale.id, req.kind, &req.customer, Some(&cashier.id)).await?)
            }
            None => None,
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_number = %sale.sale_number,
            station = %station.code,
            total = %total,
            card = %tender_plan.card_amount,
            lines = items.len(),
            invoice = invoice.as_ref().map(|i| i.number.as_str()).unwrap_or("-"),
            "Sale completed"
        );

        Ok(CheckoutReceipt {
            change: tender_plan.change(),
            balance_after: card_transaction
                .as_ref()
                .map(|t| Money::from_cents(t.balance_after_cents)),
            sale,
            items,
            payments,
            stock_movements: movements,
            card_transaction,
            invoice,
        })
    }
}
