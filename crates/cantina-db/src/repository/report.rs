//! # Report Repository
//!
//! Read-only aggregates for the back office.
//!
//! Only `paid` sales count towards revenue. Dates are compared on the
//! calendar day of the stored UTC timestamp (`substr(created_at, 1, 10)`),
//! and ranges are inclusive on both ends.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use cantina_core::inventory::{classify, stock_value, AlertSeverity};
use cantina_core::{Money, Product};

use super::product::PRODUCT_COLUMNS;
use crate::error::DbResult;

/// Inclusive day range. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateRange { from, to }
    }

    /// The last `days` days, ending today.
    pub fn last_days(today: NaiveDate, days: i64) -> Self {
        DateRange {
            from: Some(today - Duration::days(days)),
            to: Some(today),
        }
    }

    fn bounds(&self) -> (String, String) {
        (
            self.from
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "0000-01-01".to_string()),
            self.to
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "9999-12-31".to_string()),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodTotals {
    pub sales: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: PeriodTotals,
    pub last_7_days: PeriodTotals,
    pub last_30_days: PeriodTotals,
    pub active_cards: i64,
    pub low_stock_products: i64,
    /// Sum of all active children's balances.
    pub card_balance_total: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductQuantity {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildConsumption {
    pub child_id: String,
    pub full_name: String,
    pub total_spent: Money,
    pub purchases: i64,
    pub average_purchase: Money,
    /// Top three products by quantity.
    pub favorites: Vec<ProductQuantity>,
    pub balance: Money,
    pub card_purchases: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSales {
    pub product_id: String,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub revenue: Money,
    pub transactions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodIncome {
    pub code: String,
    pub name: String,
    pub transactions: i64,
    pub amount: Money,
    pub commission: Money,
    pub average: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySales {
    /// `YYYY-MM-DD`
    pub day: String,
    pub sales: i64,
    pub revenue: Money,
    pub items: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySalesReport {
    pub days: Vec<DailySales>,
    pub total_sales: i64,
    pub total_revenue: Money,
    pub total_items: i64,
    pub average_revenue_per_day: Money,
    pub best_day: Option<DailySales>,
    pub worst_day: Option<DailySales>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockReport {
    pub active_products: i64,
    pub low: Vec<Product>,
    pub out: Vec<Product>,
    /// Stock × cost over available products.
    pub inventory_value: Money,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StockAlerts {
    /// Out of stock.
    pub critical: Vec<Product>,
    /// At or below the minimum.
    pub important: Vec<Product>,
    /// Within 20% above the minimum.
    pub warning: Vec<Product>,
}

impl StockAlerts {
    pub fn total(&self) -> usize {
        self.critical.len() + self.important.len() + self.warning.len()
    }
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    pub async fn dashboard(&self, today: NaiveDate) -> DbResult<Dashboard> {
        let today_totals = self.period_totals(DateRange::new(Some(today), Some(today))).await?;
        let week = self.period_totals(DateRange::last_days(today, 7)).await?;
        let month = self.period_totals(DateRange::last_days(today, 30)).await?;

        let (active_cards, balance_total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(card_active = 1 AND card_number IS NOT NULL), 0),
                COALESCE(SUM(balance_cents), 0)
            FROM children WHERE active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let low_stock: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products \
             WHERE available = 1 AND requires_stock = 1 AND stock <= min_stock",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Dashboard {
            today: today_totals,
            last_7_days: week,
            last_30_days: month,
            active_cards,
            low_stock_products: low_stock,
            card_balance_total: Money::from_cents(balance_total),
        })
    }

    async fn period_totals(&self, range: DateRange) -> DbResult<PeriodTotals> {
        let (from, to) = range.bounds();
        let (sales, revenue): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM sales \
             WHERE status = 'paid' AND substr(created_at, 1, 10) BETWEEN ?1 AND ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(PeriodTotals {
            sales,
            revenue: Money::from_cents(revenue),
        })
    }

    /// Spending per active child. Narrow with `child_id` or `guardian_id`.
    pub async fn child_consumption(
        &self,
        range: DateRange,
        child_id: Option<&str>,
        guardian_id: Option<&str>,
    ) -> DbResult<Vec<ChildConsumption>> {
        let (from, to) = range.bounds();

        let rows: Vec<(String, String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                c.id,
                c.full_name,
                c.balance_cents,
                (SELECT COALESCE(SUM(s.total_cents), 0) FROM sales s
                  WHERE s.child_id = c.id AND s.status = 'paid'
                    AND substr(s.created_at, 1, 10) BETWEEN ?1 AND ?2),
                (SELECT COUNT(*) FROM sales s
                  WHERE s.child_id = c.id AND s.status = 'paid'
                    AND substr(s.created_at, 1, 10) BETWEEN ?1 AND ?2),
                (SELECT COUNT(*) FROM card_transactions t
                  JOIN sales s ON s.id = t.sale_id
                  WHERE t.child_id = c.id AND t.kind = 'purchase' AND t.status = 'succeeded'
                    AND s.status = 'paid'
                    AND substr(t.created_at, 1, 10) BETWEEN ?1 AND ?2)
            FROM children c
            WHERE c.active = 1
              AND (?3 IS NULL OR c.id = ?3)
              AND (?4 IS NULL OR c.guardian_id = ?4)
            ORDER BY c.full_name
            "#,
        )
        .bind(&from)
        .bind(&to)
        .bind(child_id)
        .bind(guardian_id)
        .fetch_all(&self.pool)
        .await?;

        let mut report = Vec::with_capacity(rows.len());
        for (id, full_name, balance, spent, purchases, card_purchases) in rows {
            let favorites: Vec<(String, i64)> = sqlx::query_as(
                r#"
                SELECT si.name_snapshot, SUM(si.quantity) AS qty
                  FROM sale_items si
                  JOIN sales s ON s.id = si.sale_id
                 WHERE s.child_id = ?1 AND s.status = 'paid'
                   AND substr(s.created_at, 1, 10) BETWEEN ?2 AND ?3
                 GROUP BY si.product_id, si.name_snapshot
                 ORDER BY qty DESC, si.name_snapshot
                 LIMIT 3
                "#,
            )
            .bind(&id)
            .bind(&from)
            .bind(&to)
            .fetch_all(&self.pool)
            .await?;

            report.push(ChildConsumption {
                child_id: id,
                full_name,
                total_spent: Money::from_cents(spent),
                purchases,
                average_purchase: Money::from_cents(if purchases > 0 { spent / purchases } else { 0 }),
                favorites: favorites
                    .into_iter()
                    .map(|(name, quantity)| ProductQuantity { name, quantity })
                    .collect(),
                balance: Money::from_cents(balance),
                card_purchases,
            });
        }
        Ok(report)
    }

    /// Products ranked by quantity sold.
    pub async fn best_sellers(&self, range: DateRange, limit: u32) -> DbResult<Vec<ProductSales>> {
        let (from, to) = range.bounds();
        let rows: Vec<(String, String, String, Option<String>, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                p.id, p.code, p.name, c.name,
                SUM(si.quantity) AS qty,
                SUM(si.line_total_cents),
                COUNT(DISTINCT si.sale_id)
              FROM sale_items si
              JOIN sales s ON s.id = si.sale_id
              JOIN products p ON p.id = si.product_id
              LEFT JOIN categories c ON c.id = p.category_id
             WHERE s.status = 'paid'
               AND substr(s.created_at, 1, 10) BETWEEN ?1 AND ?2
             GROUP BY p.id
             ORDER BY qty DESC, p.code
             LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, code, name, category, quantity, revenue, transactions)| ProductSales {
                product_id,
                code,
                name,
                category,
                quantity,
                revenue: Money::from_cents(revenue),
                transactions,
            })
            .collect())
    }

    /// Takings per payment method, largest first.
    pub async fn income_by_method(&self, range: DateRange) -> DbResult<Vec<MethodIncome>> {
        let (from, to) = range.bounds();
        let rows: Vec<(String, String, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                m.code, m.name,
                COUNT(sp.id),
                SUM(sp.amount_cents) AS amount,
                SUM(sp.commission_cents)
              FROM sale_payments sp
              JOIN sales s ON s.id = sp.sale_id
              JOIN payment_methods m ON m.code = sp.method_code
             WHERE s.status = 'paid'
               AND substr(s.created_at, 1, 10) BETWEEN ?1 AND ?2
             GROUP BY m.code
             ORDER BY amount DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, name, transactions, amount, commission)| MethodIncome {
                code,
                name,
                transactions,
                amount: Money::from_cents(amount),
                commission: Money::from_cents(commission),
                average: Money::from_cents(if transactions > 0 { amount / transactions } else { 0 }),
            })
            .collect())
    }

    pub async fn daily_sales(&self, range: DateRange) -> DbResult<DailySalesReport> {
        let (from, to) = range.bounds();
        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                substr(s.created_at, 1, 10) AS day,
                COUNT(*),
                SUM(s.total_cents),
                COALESCE(SUM((SELECT SUM(quantity) FROM sale_items WHERE sale_id = s.id)), 0)
              FROM sales s
             WHERE s.status = 'paid'
               AND substr(s.created_at, 1, 10) BETWEEN ?1 AND ?2
             GROUP BY day
             ORDER BY day
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let days: Vec<DailySales> = rows
            .into_iter()
            .map(|(day, sales, revenue, items)| DailySales {
                day,
                sales,
                revenue: Money::from_cents(revenue),
                items,
            })
            .collect();

        let total_sales = days.iter().map(|d| d.sales).sum();
        let total_revenue: Money = days.iter().map(|d| d.revenue).sum();
        let total_items = days.iter().map(|d| d.items).sum();
        let average = if days.is_empty() {
            Money::zero()
        } else {
            Money::from_cents(total_revenue.cents() / days.len() as i64)
        };
        let best_day = days.iter().max_by_key(|d| d.revenue).cloned();
        let worst_day = days.iter().min_by_key(|d| d.revenue).cloned();

        Ok(DailySalesReport {
            days,
            total_sales,
            total_revenue,
            total_items,
            average_revenue_per_day: average,
            best_day,
            worst_day,
        })
    }

    pub async fn stock_report(&self) -> DbResult<StockReport> {
        let products = self.available_products().await?;

        let mut low = Vec::new();
        let mut out = Vec::new();
        let mut value = Money::zero();
        for p in &products {
            value += stock_value(p.cost(), p.stock.max(0));
            if !p.requires_stock {
                continue;
            }
            if p.stock <= 0 {
                out.push(p.clone());
            } else if p.stock <= p.min_stock {
                low.push(p.clone());
            }
        }

        Ok(StockReport {
            active_products: products.len() as i64,
            low,
            out,
            inventory_value: value,
        })
    }

    pub async fn stock_alerts(&self) -> DbResult<StockAlerts> {
        let mut alerts = StockAlerts::default();
        for p in self.available_products().await? {
            match classify(p.requires_stock, p.stock, p.min_stock).alert() {
                Some(AlertSeverity::Critical) => alerts.critical.push(p),
                Some(AlertSeverity::Important) => alerts.important.push(p),
                Some(AlertSeverity::Warning) => alerts.warning.push(p),
                None => {}
            }
        }
        Ok(alerts)
    }

    async fn available_products(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE available = 1 ORDER BY stock, code");
        let rows = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutLine, CheckoutRequest};
    use crate::test_support::{fixture, Fixture};
    use cantina_core::tender::Tender;
    use chrono::Utc;

    async fn sell(fx: &Fixture, lines: Vec<CheckoutLine>, tender: Tender, child: bool) {
        fx.db
            .checkout(CheckoutRequest {
                station_code: fx.station.code.clone(),
                cashier_id: fx.cashier.id.clone(),
                child_id: child.then(|| fx.child.id.clone()),
                customer_name: None,
                lines,
                tender,
                invoice: None,
                note: None,
            })
            .await
            .unwrap();
    }

    fn cash() -> Tender {
        Tender::Cash {
            received: Money::from_guaranies(100_000),
        }
    }

    #[tokio::test]
    async fn test_best_sellers_and_daily_sales() {
        let fx = fixture().await;
        sell(&fx, vec![CheckoutLine::new("EMP-01", 2), CheckoutLine::new("AGUA", 1)], cash(), false).await;
        sell(&fx, vec![CheckoutLine::new("AGUA", 3)], Tender::Card, true).await;

        let reports = fx.db.reports();
        let best = reports.best_sellers(DateRange::default(), 10).await.unwrap();
        assert_eq!(best[0].code, "AGUA");
        assert_eq!(best[0].quantity, 4);
        assert_eq!(best[0].transactions, 2);
        assert_eq!(best[1].revenue, Money::from_guaranies(10_000));

        let today = Utc::now().date_naive();
        let daily = reports
            .daily_sales(DateRange::new(Some(today), Some(today)))
            .await
            .unwrap();
        assert_eq!(daily.days.len(), 1);
        assert_eq!(daily.total_sales, 2);
        assert_eq!(daily.total_items, 6);
        assert_eq!(daily.total_revenue, Money::from_guaranies(20_000));
        assert_eq!(daily.best_day.unwrap().day, today.format("%Y-%m-%d").to_string());
    }

    #[tokio::test]
    async fn test_income_and_consumption() {
        let fx = fixture().await;
        sell(&fx, vec![CheckoutLine::new("EMP-01", 1)], cash(), false).await;
        sell(&fx, vec![CheckoutLine::new("EMP-01", 1), CheckoutLine::new("AGUA", 2)], Tender::Card, true).await;
        sell(&fx, vec![CheckoutLine::new("AGUA", 1)], Tender::Card, true).await;

        let reports = fx.db.reports();
        let income = reports.income_by_method(DateRange::default()).await.unwrap();
        assert_eq!(income[0].code, "saldo_virtual");
        assert_eq!(income[0].transactions, 2);
        assert_eq!(income[0].amount, Money::from_guaranies(12_500));
        assert_eq!(income[1].code, "efectivo");

        let consumption = reports
            .child_consumption(DateRange::default(), Some(&fx.child.id), None)
            .await
            .unwrap();
        assert_eq!(consumption.len(), 1);
        let c = &consumption[0];
        assert_eq!(c.purchases, 2);
        assert_eq!(c.card_purchases, 2);
        assert_eq!(c.total_spent, Money::from_guaranies(12_500));
        assert_eq!(c.favorites[0].name, "Agua mineral");
        assert_eq!(c.favorites[0].quantity, 3);
        assert_eq!(c.balance, Money::from_guaranies(7_500));

        let dashboard = reports.dashboard(Utc::now().date_naive()).await.unwrap();
        assert_eq!(dashboard.today.sales, 3);
        assert_eq!(dashboard.last_30_days.revenue, Money::from_guaranies(17_500));
        assert_eq!(dashboard.active_cards, 1);
    }

    #[tokio::test]
    async fn test_consumption_ignores_cancelled_sales() {
        let fx = fixture().await;
        let cancelled = fx
            .db
            .checkout(CheckoutRequest {
                station_code: fx.station.code.clone(),
                cashier_id: fx.cashier.id.clone(),
                child_id: Some(fx.child.id.clone()),
                customer_name: None,
                lines: vec![CheckoutLine::new("EMP-01", 1)],
                tender: Tender::Card,
                invoice: None,
                note: None,
            })
            .await
            .unwrap()
            .sale;
        sell(&fx, vec![CheckoutLine::new("AGUA", 1)], Tender::Card, true).await;
        fx.db
            .sales()
            .cancel(&cancelled.id, "error de carga", &fx.admin)
            .await
            .unwrap();

        let consumption = fx
            .db
            .reports()
            .child_consumption(DateRange::default(), Some(&fx.child.id), None)
            .await
            .unwrap();
        let c = &consumption[0];
        assert_eq!(c.purchases, 1);
        assert_eq!(c.card_purchases, 1);
        assert_eq!(c.total_spent, Money::from_guaranies(2_500));
        assert_eq!(c.balance, Money::from_guaranies(17_500));
    }

    #[tokio::test]
    async fn test_stock_report_and_alerts() {
        let fx = fixture().await;
        // EMP-01: stock 10, min 3. JUG-01: stock 4, min 5.
        sell(&fx, vec![CheckoutLine::new("JUG-01", 4)], cash(), false).await;
        sell(&fx, vec![CheckoutLine::new("EMP-01", 7)], cash(), false).await;

        let reports = fx.db.reports();
        let stock = reports.stock_report().await.unwrap();
        assert_eq!(stock.out.len(), 1);
        assert_eq!(stock.out[0].code, "JUG-01");
        assert_eq!(stock.low.len(), 1);
        assert_eq!(stock.low[0].code, "EMP-01");
        // 3 empanadas at Gs. 3.000 cost
        assert_eq!(stock.inventory_value, Money::from_guaranies(9_000));

        let alerts = reports.stock_alerts().await.unwrap();
        assert_eq!(alerts.critical.len(), 1);
        assert_eq!(alerts.important.len(), 1);
        assert_eq!(alerts.total(), 2);
    }
}
