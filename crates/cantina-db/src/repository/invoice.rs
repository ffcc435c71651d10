//! # Invoice Repository
//!
//! Billing configuration, document numbering, voiding and the audit trail.
//!
//! ## Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  billing_config (single row, id = 1)                                    │
//! │    next_receipt_number ── boletas          BOL-000001, BOL-000002 ...   │
//! │    next_invoice_number ── both facturas    FAC-000001, FAC-000002 ...   │
//! │                                                                         │
//! │  UPDATE billing_config                                                  │
//! │     SET next_receipt_number = next_receipt_number + 1                   │
//! │   WHERE id = 1 AND issues_receipts = 1                                  │
//! │  RETURNING next_receipt_number - 1        ← the number we own           │
//! │                                                                         │
//! │  The increment and the invoice INSERT share one transaction. A failed   │
//! │  insert rolls the counter back, so numbers stay gap-free.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every invoice is issued as soon as it is created and gets two history
//! rows: `created` then `issued`. Voiding adds a `voided` row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use cantina_core::invoice::{ensure_can_void, format_document_number, issue, split_tax};
use cantina_core::permissions::{self, Action};
use cantina_core::types::TaxRate;
use cantina_core::validation::{validate_name, validate_phone, validate_rate_bps};
use cantina_core::{
    BillingConfig, CoreError, Invoice, InvoiceAction, InvoiceHistoryEntry, InvoiceKind,
    InvoiceStatus, Money, Operator, SaleStatus,
};

use super::new_id;
use super::sale::get_sale_conn;
use crate::error::{DbError, DbResult};

/// Customer name printed when none is given.
pub const DEFAULT_CUSTOMER: &str = "Cliente General";

const INVOICE_COLUMNS: &str = "id, number, sale_id, kind, customer_name, customer_tax_id, \
     customer_address, customer_phone, customer_email, subtotal_cents, tax_cents, total_cents, \
     status, issued_at, voided_at, note, created_by";

const CONFIG_COLUMNS: &str = "company_name, company_tax_id, company_address, company_phone, \
     company_email, next_receipt_number, next_invoice_number, vat_bps, issues_receipts, \
     issues_invoices, updated_at";

/// Who the document is made out to. Everything is optional.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
}

/// Editable part of the billing configuration. Counters are not editable.
#[derive(Debug, Clone)]
pub struct BillingUpdate {
    pub company_name: String,
    pub company_tax_id: String,
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub vat_bps: u32,
    pub issues_receipts: bool,
    pub issues_invoices: bool,
}

impl From<BillingConfig> for BillingUpdate {
    fn from(c: BillingConfig) -> Self {
        BillingUpdate {
            company_name: c.company_name,
            company_tax_id: c.company_tax_id,
            company_address: c.company_address,
            company_phone: c.company_phone,
            company_email: c.company_email,
            vat_bps: c.vat_bps,
            issues_receipts: c.issues_receipts,
            issues_invoices: c.issues_invoices,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub kind: Option<InvoiceKind>,
    pub status: Option<InvoiceStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Matches number or customer name.
    pub search: Option<String>,
    pub limit: u32,
}

/// Totals over a filtered set. Voided documents are counted but not summed.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub count: i64,
    pub issued: i64,
    pub voided: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    pub async fn billing_config(&self) -> DbResult<BillingConfig> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM billing_config WHERE id = 1");
        sqlx::query_as::<_, BillingConfig>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("BillingConfig", "1"))
    }

    pub async fn update_billing_config(
        &self,
        update: BillingUpdate,
        actor: &Operator,
    ) -> DbResult<BillingConfig> {
        if actor.role != cantina_core::UserRole::Administrator {
            return Err(CoreError::Forbidden {
                role: actor.role.to_string(),
                action: "change the billing configuration".to_string(),
            }
            .into());
        }
        validate_name("company name", &update.company_name, 200)?;
        validate_rate_bps("vat", update.vat_bps)?;
        if !update.company_phone.is_empty() {
            validate_phone(&update.company_phone)?;
        }

        let sql = format!(
            "UPDATE billing_config SET company_name = ?1, company_tax_id = ?2, \
                 company_address = ?3, company_phone = ?4, company_email = ?5, vat_bps = ?6, \
                 issues_receipts = ?7, issues_invoices = ?8, updated_at = ?9 \
             WHERE id = 1 RETURNING {CONFIG_COLUMNS}"
        );
        let config = sqlx::query_as::<_, BillingConfig>(&sql)
            .bind(update.company_name.trim())
            .bind(update.company_tax_id.trim())
            .bind(update.company_address.trim())
            .bind(update.company_phone.trim())
            .bind(update.company_email.trim())
            .bind(update.vat_bps)
            .bind(update.issues_receipts)
            .bind(update.issues_invoices)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        info!(vat_bps = config.vat_bps, "Billing configuration updated");
        Ok(config)
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Creates and issues the document for a paid sale.
    ///
    /// ## Returns
    /// * `Err(CoreError::InvoiceAlreadyExists)` - the sale has one already
    /// * `Err(CoreError::DocumentKindDisabled)` - turned off in the config
    /// * `Err(CoreError::InvalidSaleStatus)` - sale is not paid
    pub async fn generate(
        &self,
        sale_id: &str,
        kind: InvoiceKind,
        customer: CustomerInfo,
        actor: &Operator,
    ) -> DbResult<Invoice> {
        permissions::require(actor.role, Action::GenerateInvoice)?;

        let mut tx = self.pool.begin().await?;
        let invoice = generate_conn(&mut tx, sale_id, kind, &customer, Some(&actor.id)).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    pub async fn get(&self, number: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE number = ?1");
        let row = sqlx::query_as::<_, Invoice>(&sql)
            .bind(number.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_for_sale(&self, sale_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE sale_id = ?1");
        let row = sqlx::query_as::<_, Invoice>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Voids an issued document. Administrators only.
    pub async fn void(&self, number: &str, reason: &str, actor: &Operator) -> DbResult<Invoice> {
        permissions::require(actor.role, Action::VoidInvoice)?;
        let reason = match reason.trim() {
            "" => "Anulada por usuario",
            r => r,
        };

        let mut tx = self.pool.begin().await?;
        let invoice = void_conn(&mut tx, &number.trim().to_uppercase(), reason, Some(&actor.id)).await?;
        tx.commit().await?;

        info!(number = %invoice.number, reason = %reason, "Invoice voided");
        Ok(invoice)
    }

    /// Audit trail, oldest first.
    pub async fn history(&self, number: &str) -> DbResult<Vec<InvoiceHistoryEntry>> {
        let rows = sqlx::query_as::<_, InvoiceHistoryEntry>(
            "SELECT id, invoice_number, action, description, operator_id, created_at \
             FROM invoice_history WHERE invoice_number = ?1 ORDER BY created_at, rowid",
        )
        .bind(number.trim().to_uppercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Newest first.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE 1 = 1"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY issued_at DESC LIMIT ");
        qb.push_bind(if filter.limit == 0 { 100 } else { filter.limit });

        let rows = qb.build_query_as::<Invoice>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn summary(&self, filter: &InvoiceFilter) -> DbResult<InvoiceSummary> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(status = 'issued'), 0),
                COALESCE(SUM(status = 'voided'), 0),
                COALESCE(SUM(CASE WHEN status != 'voided' THEN subtotal_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status != 'voided' THEN tax_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status != 'voided' THEN total_cents ELSE 0 END), 0)
            FROM invoices WHERE 1 = 1
            "#,
        );
        push_filter(&mut qb, filter);

        let (count, issued, voided, subtotal, tax, total): (i64, i64, i64, i64, i64, i64) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(InvoiceSummary {
            count,
            issued,
            voided,
            subtotal: Money::from_cents(subtotal),
            tax: Money::from_cents(tax),
            total: Money::from_cents(total),
        })
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &InvoiceFilter) {
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        qb.push(" AND issued_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND issued_at < ").push_bind(to);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = super::like_pattern(search);
        qb.push(r" AND (number LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR customer_name LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
}

// =============================================================================
// Statement-level helpers (run inside a caller's transaction)
// =============================================================================

/// Allocates the next number and writes an issued document for the sale.
pub(crate) async fn generate_conn(
    conn: &mut SqliteConnection,
    sale_id: &str,
    kind: InvoiceKind,
    customer: &CustomerInfo,
    operator_id: Option<&str>,
) -> DbResult<Invoice> {
    if let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        validate_phone(phone)?;
    }

    let now = Utc::now();
    let sql = if kind.is_receipt() {
        "UPDATE billing_config SET next_receipt_number = next_receipt_number + 1, updated_at = ?1 \
         WHERE id = 1 AND issues_receipts = 1 RETURNING next_receipt_number - 1, vat_bps"
    } else {
        "UPDATE billing_config SET next_invoice_number = next_invoice_number + 1, updated_at = ?1 \
         WHERE id = 1 AND issues_invoices = 1 RETURNING next_invoice_number - 1, vat_bps"
    };
    let allocated: Option<(i64, u32)> = sqlx::query_as(sql)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
    let Some((sequence, vat_bps)) = allocated else {
        return Err(CoreError::DocumentKindDisabled {
            kind: kind.as_str().to_string(),
        }
        .into());
    };

    let sale = get_sale_conn(conn, sale_id)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
    if sale.status != SaleStatus::Paid {
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale.sale_number,
            current_status: sale.status.as_str().to_string(),
        }
        .into());
    }

    let existing: Option<String> =
        sqlx::query_scalar("SELECT number FROM invoices WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_optional(&mut *conn)
            .await?;
    if existing.is_some() {
        return Err(CoreError::InvoiceAlreadyExists(sale.sale_number).into());
    }

    // Card balance is invoiced when it is recharged, not when it is spent:
    // only the part paid with invoicing methods goes on the document.
    let (invoiceable, invoiceable_cents): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(sp.amount_cents), 0) FROM sale_payments sp \
         JOIN payment_methods m ON m.code = sp.method_code \
         WHERE sp.sale_id = ?1 AND m.issues_invoice = 1",
    )
    .bind(sale_id)
    .fetch_one(&mut *conn)
    .await?;
    if invoiceable == 0 || invoiceable_cents <= 0 {
        return Err(CoreError::NotInvoiceable(sale.sale_number).into());
    }

    let split = split_tax(
        kind,
        Money::from_cents(invoiceable_cents),
        TaxRate::from_bps(vat_bps),
    );
    let customer_name = customer
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or(sale.customer_name.as_deref())
        .unwrap_or(DEFAULT_CUSTOMER)
        .to_string();

    let mut invoice = Invoice {
        id: new_id(),
        number: format_document_number(kind, sequence),
        sale_id: sale_id.to_string(),
        kind,
        customer_name,
        customer_tax_id: non_empty(&customer.tax_id),
        customer_address: non_empty(&customer.address),
        customer_phone: non_empty(&customer.phone),
        customer_email: non_empty(&customer.email),
        subtotal_cents: split.subtotal.cents(),
        tax_cents: split.tax.cents(),
        total_cents: split.total.cents(),
        status: InvoiceStatus::Draft,
        issued_at: now,
        voided_at: None,
        note: non_empty(&customer.note),
        created_by: operator_id.map(str::to_string),
    };
    invoice.status = issue(invoice.status);

    let sql = format!(
        "INSERT INTO invoices ({INVOICE_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
    );
    sqlx::query(&sql)
        .bind(&invoice.id)
        .bind(&invoice.number)
        .bind(&invoice.sale_id)
        .bind(invoice.kind)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_tax_id)
        .bind(&invoice.customer_address)
        .bind(&invoice.customer_phone)
        .bind(&invoice.customer_email)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.total_cents)
        .bind(invoice.status)
        .bind(invoice.issued_at)
        .bind(invoice.voided_at)
        .bind(&invoice.note)
        .bind(&invoice.created_by)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_on("sale_id") {
                CoreError::InvoiceAlreadyExists(invoice.sale_id.clone()).into()
            } else {
                err
            }
        })?;

    record_history(
        conn,
        &invoice.number,
        InvoiceAction::Created,
        &format!("{} created for sale {}", kind.as_str(), sale.sale_number),
        operator_id,
    )
    .await?;
    record_history(conn, &invoice.number, InvoiceAction::Issued, "Issued", operator_id).await?;

    info!(
        number = %invoice.number,
        sale = %sale.sale_number,
        total = %split.total,
        tax = %split.tax,
        "Invoice issued"
    );
    Ok(invoice)
}

/// Sets the document to voided and logs the reason.
pub(crate) async fn void_conn(
    conn: &mut SqliteConnection,
    number: &str,
    reason: &str,
    operator_id: Option<&str>,
) -> DbResult<Invoice> {
    let sql = format!(
        "UPDATE invoices SET status = 'voided', voided_at = ?1, note = ?2 \
         WHERE number = ?3 AND status != 'voided' RETURNING {INVOICE_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Invoice>(&sql)
        .bind(Utc::now())
        .bind(reason)
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(invoice) = updated else {
        let status: Option<InvoiceStatus> =
            sqlx::query_scalar("SELECT status FROM invoices WHERE number = ?1")
                .bind(number)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(match status {
            None => CoreError::InvoiceNotFound(number.to_string()).into(),
            Some(status) => match ensure_can_void(number, status) {
                Err(e) => e.into(),
                Ok(()) => DbError::Internal(format!("invoice {number} could not be voided")),
            },
        });
    };

    record_history(
        conn,
        &invoice.number,
        InvoiceAction::Voided,
        &format!("Voided: {reason}"),
        operator_id,
    )
    .await?;
    Ok(invoice)
}

/// Voids the sale's document if it has a live one. Used by sale cancellation.
pub(crate) async fn void_for_sale_conn(
    conn: &mut SqliteConnection,
    sale_id: &str,
    reason: &str,
    operator_id: Option<&str>,
) -> DbResult<Option<Invoice>> {
    let number: Option<String> = sqlx::query_scalar(
        "SELECT number FROM invoices WHERE sale_id = ?1 AND status != 'voided'",
    )
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?;

    match number {
        Some(number) => void_conn(conn, &number, reason, operator_id).await.map(Some),
        None => Ok(None),
    }
}

async fn record_history(
    conn: &mut SqliteConnection,
    number: &str,
    action: InvoiceAction,
    description: &str,
    operator_id: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO invoice_history (id, invoice_number, action, description, operator_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(new_id())
    .bind(number)
    .bind(action)
    .bind(description)
    .bind(operator_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(number = %number, action = ?action, "Invoice history recorded");
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutLine, CheckoutRequest};
    use crate::test_support::{fixture, Fixture};
    use cantina_core::tender::Tender;

    async fn cash_sale(fx: &Fixture, code: &str, qty: i64) -> String {
        fx.db
            .checkout(CheckoutRequest {
                station_code: fx.station.code.clone(),
                cashier_id: fx.cashier.id.clone(),
                child_id: None,
                customer_name: None,
                lines: vec![CheckoutLine::new(code, qty)],
                tender: Tender::Cash {
                    received: Money::from_guaranies(50_000),
                },
                invoice: None,
                note: None,
            })
            .await
            .unwrap()
            .sale
            .id
    }

    #[tokio::test]
    async fn test_receipt_and_invoice_counters_are_separate() {
        let fx = fixture().await;
        let invoices = fx.db.invoices();

        let s1 = cash_sale(&fx, "EMP-01", 1).await;
        let s2 = cash_sale(&fx, "EMP-01", 1).await;
        let s3 = cash_sale(&fx, "AGUA", 2).await;

        let b1 = invoices
            .generate(&s1, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();
        let f1 = invoices
            .generate(&s2, InvoiceKind::ExemptInvoice, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();
        let b2 = invoices
            .generate(&s3, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();

        assert_eq!(b1.number, "BOL-000001");
        assert_eq!(f1.number, "FAC-000001");
        assert_eq!(b2.number, "BOL-000002");
        assert_eq!(b1.status, InvoiceStatus::Issued);
        assert_eq!(b1.customer_name, DEFAULT_CUSTOMER);

        let config = invoices.billing_config().await.unwrap();
        assert_eq!(config.next_receipt_number, 3);
        assert_eq!(config.next_invoice_number, 2);
    }

    #[tokio::test]
    async fn test_taxed_invoice_splits_vat() {
        let fx = fixture().await;
        let sale = cash_sale(&fx, "EMP-01", 1).await; // Gs. 5.000

        let invoice = fx
            .db
            .invoices()
            .generate(
                &sale,
                InvoiceKind::TaxedInvoice,
                CustomerInfo {
                    name: Some("Juan Pérez".to_string()),
                    tax_id: Some("1234567-8".to_string()),
                    ..Default::default()
                },
                &fx.cashier,
            )
            .await
            .unwrap();

        // 5.000 / 1.19 = 4.201,68
        assert_eq!(invoice.total_cents, 500_000);
        assert_eq!(invoice.subtotal_cents, 420_168);
        assert_eq!(invoice.tax_cents, 79_832);
        assert_eq!(invoice.customer_tax_id.as_deref(), Some("1234567-8"));
    }

    #[tokio::test]
    async fn test_mixed_sale_invoices_only_the_external_part() {
        let fx = fixture().await;
        // 2 x EMP-01 = Gs. 10.000: 9.000 from the card, 1.000 cash
        let sale = fx
            .db
            .checkout(CheckoutRequest {
                station_code: fx.station.code.clone(),
                cashier_id: fx.cashier.id.clone(),
                child_id: Some(fx.child.id.clone()),
                customer_name: None,
                lines: vec![CheckoutLine::new("EMP-01", 2)],
                tender: Tender::Mixed {
                    method_code: "efectivo".to_string(),
                    external_amount: Money::from_guaranies(1_000),
                    received: Some(Money::from_guaranies(1_000)),
                },
                invoice: None,
                note: None,
            })
            .await
            .unwrap()
            .sale;
        assert_eq!(sale.total(), Money::from_guaranies(10_000));

        let invoice = fx
            .db
            .invoices()
            .generate(&sale.id, InvoiceKind::TaxedInvoice, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();

        // 1.000 / 1.19 = 840,34
        assert_eq!(invoice.total_cents, 100_000);
        assert_eq!(invoice.subtotal_cents, 84_034);
        assert_eq!(invoice.tax_cents, 15_966);
    }

    #[tokio::test]
    async fn test_one_document_per_sale_and_counter_rolls_back() {
        let fx = fixture().await;
        let invoices = fx.db.invoices();
        let sale = cash_sale(&fx, "EMP-01", 1).await;

        invoices
            .generate(&sale, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();
        let err = invoices
            .generate(&sale, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvoiceAlreadyExists(_))));

        // the rejected attempt must not burn a number
        assert_eq!(invoices.billing_config().await.unwrap().next_receipt_number, 2);
    }

    #[tokio::test]
    async fn test_disabled_kind_rejected() {
        let fx = fixture().await;
        let invoices = fx.db.invoices();
        let mut update = BillingUpdate::from(invoices.billing_config().await.unwrap());
        update.issues_invoices = false;

        assert!(invoices
            .update_billing_config(update.clone(), &fx.cashier)
            .await
            .is_err());
        invoices.update_billing_config(update, &fx.admin).await.unwrap();

        let sale = cash_sale(&fx, "EMP-01", 1).await;
        let err = invoices
            .generate(&sale, InvoiceKind::ExemptInvoice, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::DocumentKindDisabled { .. })));
    }

    #[tokio::test]
    async fn test_void_and_history() {
        let fx = fixture().await;
        let invoices = fx.db.invoices();
        let sale = cash_sale(&fx, "EMP-01", 1).await;
        let invoice = invoices
            .generate(&sale, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
            .await
            .unwrap();

        let err = invoices.void(&invoice.number, "error", &fx.cashier).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Forbidden { .. })));

        let voided = invoices.void("bol-000001", "", &fx.admin).await.unwrap();
        assert_eq!(voided.status, InvoiceStatus::Voided);
        assert!(voided.voided_at.is_some());

        let err = invoices.void(&invoice.number, "again", &fx.admin).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvoiceAlreadyVoided(_))));

        let err = invoices.void("BOL-999999", "x", &fx.admin).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvoiceNotFound(_))));

        let actions: Vec<InvoiceAction> = invoices
            .history(&invoice.number)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.action)
            .collect();
        assert_eq!(
            actions,
            vec![InvoiceAction::Created, InvoiceAction::Issued, InvoiceAction::Voided]
        );
    }

    #[tokio::test]
    async fn test_list_and_summary() {
        let fx = fixture().await;
        let invoices = fx.db.invoices();
        for _ in 0..3 {
            let sale = cash_sale(&fx, "EMP-01", 1).await;
            invoices
                .generate(&sale, InvoiceKind::Receipt, CustomerInfo::default(), &fx.cashier)
                .await
                .unwrap();
        }
        invoices.void("BOL-000002", "duplicada", &fx.admin).await.unwrap();

        let all = invoices.list(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let voided = invoices
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Voided),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(voided.len(), 1);

        let found = invoices
            .list(&InvoiceFilter {
                search: Some("000003".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found[0].number, "BOL-000003");

        let summary = invoices.summary(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.issued, 2);
        assert_eq!(summary.voided, 1);
        assert_eq!(summary.total, Money::from_guaranies(10_000));
    }
}
