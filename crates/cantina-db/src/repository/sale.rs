//! # Sale Repository
//!
//! Database operations for sales, their line items and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CHECKOUT  (Database::checkout, one transaction)                     │
//! │     └── next_sale_number() → V202603090007                              │
//! │     └── insert_sale() + insert_item() × n + insert_payment() × 1..2     │
//! │     └── Sale { status: Paid }                                           │
//! │                                                                         │
//! │  2. (OPTIONAL) CANCEL  (administrator)                                  │
//! │     └── status → Cancelled                                              │
//! │     └── stock returned for every movement the sale wrote                │
//! │     └── card part refunded to the card                                  │
//! │     └── invoice voided, if one was issued                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Items and payments are never edited after checkout. The snapshot
//! columns keep the sale readable even if the product is renamed or
//! repriced later.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use cantina_core::invoice::format_sale_number;
use cantina_core::permissions::{self, Action};
use cantina_core::{
    CardTransactionKind, CoreError, Money, Operator, Sale, SaleItem, SalePayment, SaleStatus,
    StockMovementKind, CARD_BALANCE_METHOD,
};

use super::card::{credit, LedgerContext};
use super::invoice::void_for_sale_conn;
use super::product::{change_stock, MovementContext};
use crate::error::DbResult;

pub(crate) const SALE_COLUMNS: &str = "id, sale_number, station_id, cashier_id, child_id, \
     customer_name, subtotal_cents, discount_cents, tax_cents, total_cents, status, note, \
     created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, code_snapshot, name_snapshot, \
     unit_price_cents, quantity, line_total_cents, created_at";

const PAYMENT_COLUMNS: &str = "id, sale_id, method_code, amount_cents, commission_cents, \
     tendered_cents, change_cents, reference, created_at";

/// A sale with its lines and payments.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
}

impl SaleDetail {
    /// Amount paid from the card balance.
    pub fn card_amount(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.method_code == CARD_BALANCE_METHOD)
            .map(|p| Money::from_cents(p.amount_cents))
            .sum()
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(sale) = get_sale_conn(&mut conn, id).await? else {
            return Ok(None);
        };
        detail(&mut conn, sale).await.map(Some)
    }

    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_number.trim())
            .fetch_optional(&mut *conn)
            .await?;
        match sale {
            Some(sale) => detail(&mut conn, sale).await.map(Some),
            None => Ok(None),
        }
    }

    /// Sales created in `[from, to)`, newest first.
    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at DESC LIMIT ?3"
        );
        let rows = sqlx::query_as::<_, Sale>(&sql)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// A child's purchases, newest first.
    pub async fn list_for_child(&self, child_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE child_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, Sale>(&sql)
            .bind(child_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Cancels a pending or paid sale and reverses its effects.
    ///
    /// ## Returns
    /// * `Err(CoreError::SaleNotFound)`
    /// * `Err(CoreError::InvalidSaleStatus)` - already cancelled or returned
    pub async fn cancel(&self, sale_id: &str, reason: &str, actor: &Operator) -> DbResult<SaleDetail> {
        permissions::require(actor.role, Action::CancelSale)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE sales SET status = ?1, note = ?2, updated_at = ?3 \
             WHERE id = ?4 AND status IN ('pending', 'paid') RETURNING {SALE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Sale>(&sql)
            .bind(SaleStatus::Cancelled)
            .bind(reason.trim())
            .bind(now)
            .bind(sale_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(sale) = updated else {
            return Err(match get_sale_conn(&mut tx, sale_id).await? {
                None => CoreError::SaleNotFound(sale_id.to_string()),
                Some(sale) => CoreError::InvalidSaleStatus {
                    sale_id: sale.sale_number,
                    current_status: sale.status.as_str().to_string(),
                },
            }
            .into());
        };

        // Only what checkout actually took out goes back.
        let stock_lines: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, -quantity
              FROM stock_movements
             WHERE sale_id = ?1 AND kind = 'sale'
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        let return_note = format!("Sale {} cancelled", sale.sale_number);
        for (product_id, quantity) in &stock_lines {
            change_stock(
                &mut tx,
                product_id,
                StockMovementKind::Return,
                *quantity,
                MovementContext::new(Some(&return_note), Some(&actor.id)).for_sale(sale_id),
            )
            .await?;
        }

        let detail = detail(&mut tx, sale).await?;
        let card_amount = detail.card_amount();
        if card_amount.is_positive() {
            match &detail.sale.child_id {
                Some(child_id) => {
                    let ctx = LedgerContext {
                        operator_id: Some(actor.id.clone()),
                        sale_id: Some(sale_id.to_string()),
                        note: Some(return_note.clone()),
                        ..Default::default()
                    };
                    credit(&mut tx, child_id, card_amount, CardTransactionKind::Refund, &ctx)
                        .await?;
                }
                None => warn!(sale_id = %sale_id, "Card payment without a child, nothing to refund"),
            }
        }

        void_for_sale_conn(&mut tx, sale_id, &return_note, Some(&actor.id)).await?;

        tx.commit().await?;

        info!(
            sale_number = %detail.sale.sale_number,
            refunded = %card_amount,
            lines_restocked = stock_lines.len(),
            "Sale cancelled"
        );
        Ok(detail)
    }
}

// =============================================================================
// Statement-level helpers (run inside a caller's transaction)
// =============================================================================

/// Bumps the per-day counter and formats the sale number.
///
/// This is the first statement of the checkout transaction, so it also
/// takes the SQLite write lock.
pub(crate) async fn next_sale_number(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<String> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sale_counters (day, last_seq) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(day.format("%Y-%m-%d").to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_sale_number(day, seq))
}

pub(crate) async fn get_sale_conn(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, sale_number, station_id, cashier_id, child_id, customer_name,
            subtotal_cents, discount_cents, tax_cents, total_cents,
            status, note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.sale_number)
    .bind(&sale.station_id)
    .bind(&sale.cashier_id)
    .bind(&sale.child_id)
    .bind(&sale.customer_name)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.status)
    .bind(&sale.note)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, code_snapshot, name_snapshot,
            unit_price_cents, quantity, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.code_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &SalePayment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_payments (
            id, sale_id, method_code, amount_cents, commission_cents,
            tendered_cents, change_cents, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(&payment.method_code)
    .bind(payment.amount_cents)
    .bind(payment.commission_cents)
    .bind(payment.tendered_cents)
    .bind(payment.change_cents)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn detail(conn: &mut SqliteConnection, sale: Sale) -> DbResult<SaleDetail> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(&sale.id)
        .fetch_all(&mut *conn)
        .await?;

    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM sale_payments WHERE sale_id = ?1 ORDER BY rowid");
    let payments = sqlx::query_as::<_, SalePayment>(&sql)
        .bind(&sale.id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(SaleDetail {
        sale,
        items,
        payments,
    })
}
