//! # Product Repository
//!
//! Database operations for products, categories and stock movements.
//!
//! ## Register Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier types: "empa"                                                  │
//! │       │                                                                 │
//! │       ├── fewer than 2 chars? → []                                      │
//! │       ▼                                                                 │
//! │  code LIKE '%empa%' OR name LIKE '%empa%'   (case-insensitive, ASCII)   │
//! │  AND available = 1                                                      │
//! │  ORDER BY name LIMIT 15                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EMP-01 - Empanada de carne (Stock: 12)                                 │
//! │  EMP-02 - Empanada de pollo (Stock: 2 - BAJO)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Updates
//! Every change is a delta applied with a guard, so a product that
//! requires stock control can never go below zero:
//! ```text
//!   UPDATE products SET stock = stock + :delta
//!    WHERE id = :id AND (requires_stock = 0 OR stock + :delta >= 0)
//!   RETURNING stock
//! ```
//! and every change writes a `stock_movements` row with before/after.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use cantina_core::validation::{
    validate_name, validate_price, validate_product_code, validate_product_name,
    validate_search_query, validate_stock_bounds,
};
use cantina_core::{Category, CoreError, Money, Product, StockMovement, StockMovementKind};

use super::{like_pattern, new_id};
use crate::error::{DbError, DbResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, category_id, code, name, description, cost_cents, price_cents, \
     stock, min_stock, max_stock, requires_stock, available, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, kind, quantity, stock_before, stock_after, \
     reason, operator_id, sale_id, created_at";

/// Who and why, copied onto each stock movement.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MovementContext<'a> {
    pub reason: Option<&'a str>,
    pub operator_id: Option<&'a str>,
    pub sale_id: Option<&'a str>,
}

impl<'a> MovementContext<'a> {
    pub fn new(reason: Option<&'a str>, operator_id: Option<&'a str>) -> Self {
        MovementContext {
            reason,
            operator_id,
            sale_id: None,
        }
    }

    pub fn for_sale(mut self, sale_id: &'a str) -> Self {
        self.sale_id = Some(sale_id);
        self
    }
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: Option<String>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub cost: Money,
    pub price: Money,
    pub initial_stock: i64,
    pub min_stock: i64,
    pub max_stock: i64,
    pub requires_stock: bool,
}

impl NewProduct {
    pub fn new(code: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        NewProduct {
            category_id: None,
            code: code.into(),
            name: name.into(),
            description: None,
            cost: Money::zero(),
            price,
            initial_stock: 0,
            min_stock: 5,
            max_stock: 100,
            requires_stock: true,
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Register search by code or name. Only available products.
    ///
    /// Queries shorter than two characters return no rows.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let Some(query) = validate_search_query(query)? else {
            return Ok(Vec::new());
        };

        debug!(query = %query, limit = %limit, "Searching products");

        let sql = format!(
            r#"SELECT {PRODUCT_COLUMNS} FROM products
               WHERE available = 1
                 AND (code LIKE ?1 ESCAPE '\' OR name LIKE ?1 ESCAPE '\')
               ORDER BY name
               LIMIT ?2"#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(like_pattern(&query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Inserts a product. An initial stock is logged as an entry movement.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, new: NewProduct, operator_id: Option<&str>) -> DbResult<Product> {
        validate_product_code(&new.code)?;
        validate_product_name(&new.name)?;
        validate_price(new.price)?;
        validate_price(new.cost)?;
        validate_stock_bounds(new.min_stock, new.max_stock)?;
        if new.initial_stock < 0 {
            return Err(CoreError::invalid_amount("initial stock cannot be negative").into());
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            category_id: new.category_id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            cost_cents: new.cost.cents(),
            price_cents: new.price.cents(),
            stock: 0,
            min_stock: new.min_stock,
            max_stock: new.max_stock,
            requires_stock: new.requires_stock,
            available: true,
            created_at: now,
            updated_at: now,
        };

        debug!(code = %product.code, "Inserting product");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO products (
                id, category_id, code, name, description,
                cost_cents, price_cents, stock, min_stock, max_stock,
                requires_stock, available, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.requires_stock)
        .bind(product.available)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.code),
            other => other,
        })?;

        let mut product = product;
        if new.initial_stock > 0 {
            let movement = change_stock(
                &mut tx,
                &product.id,
                StockMovementKind::Entry,
                new.initial_stock,
                MovementContext::new(Some("initial stock"), operator_id),
            )
            .await?;
            product.stock = movement.stock_after;
        }
        tx.commit().await?;

        info!(code = %product.code, id = %product.id, "Product created");
        Ok(product)
    }

    /// Updates descriptive fields and prices. Stock is changed only
    /// through movements.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product_code(&product.code)?;
        validate_product_name(&product.name)?;
        validate_price(product.price())?;
        validate_price(product.cost())?;
        validate_stock_bounds(product.min_stock, product.max_stock)?;

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?2,
                code = ?3,
                name = ?4,
                description = ?5,
                cost_cents = ?6,
                price_cents = ?7,
                min_stock = ?8,
                max_stock = ?9,
                requires_stock = ?10,
                available = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.requires_stock)
        .bind(product.available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Shows or hides a product at the register.
    pub async fn set_available(&self, id: &str, available: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET available = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(available)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        info!(id = %id, available, "Product availability changed");
        Ok(())
    }

    /// Goods received.
    pub async fn restock(
        &self,
        product_id: &str,
        quantity: i64,
        reason: Option<&str>,
        operator_id: Option<&str>,
    ) -> DbResult<StockMovement> {
        if quantity <= 0 {
            return Err(CoreError::invalid_amount("restock quantity must be positive").into());
        }
        let mut tx = self.pool.begin().await?;
        let movement = change_stock(
            &mut tx,
            product_id,
            StockMovementKind::Entry,
            quantity,
            MovementContext::new(reason, operator_id),
        )
        .await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Signed change outside a sale: `Exit` for waste, `Return` for
    /// customer returns, `Adjustment` for count corrections.
    pub async fn record_movement(
        &self,
        product_id: &str,
        kind: StockMovementKind,
        delta: i64,
        reason: Option<&str>,
        operator_id: Option<&str>,
    ) -> DbResult<StockMovement> {
        if delta == 0 {
            return Err(CoreError::invalid_amount("stock change cannot be zero").into());
        }
        let delta = match kind {
            StockMovementKind::Entry | StockMovementKind::Return => delta.abs(),
            StockMovementKind::Exit | StockMovementKind::Sale => -delta.abs(),
            StockMovementKind::Adjustment => delta,
        };
        let mut tx = self.pool.begin().await?;
        let movement = change_stock(
            &mut tx,
            product_id,
            kind,
            delta,
            MovementContext::new(reason, operator_id),
        )
        .await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Sets stock to a counted value, logging the difference as an adjustment.
    pub async fn set_stock(
        &self,
        product_id: &str,
        counted: i64,
        reason: Option<&str>,
        operator_id: Option<&str>,
    ) -> DbResult<Option<StockMovement>> {
        if counted < 0 {
            return Err(CoreError::invalid_amount("counted stock cannot be negative").into());
        }

        let mut tx = self.pool.begin().await?;
        // Write first so the transaction holds the write lock before reading.
        let current: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET updated_at = ?1 WHERE id = ?2 RETURNING stock",
        )
        .bind(Utc::now())
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = current.ok_or_else(|| DbError::not_found("Product", product_id))?;

        let delta = counted - current;
        if delta == 0 {
            tx.commit().await?;
            return Ok(None);
        }
        let movement = change_stock(
            &mut tx,
            product_id,
            StockMovementKind::Adjustment,
            delta,
            MovementContext::new(reason, operator_id),
        )
        .await?;
        tx.commit().await?;
        Ok(Some(movement))
    }

    /// Stock-controlled products at or below their minimum.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE requires_stock = 1 AND stock <= min_stock \
             ORDER BY stock, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Every stock-controlled product, for the stock report.
    pub async fn list_stock_controlled(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE requires_stock = 1 ORDER BY name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn movements(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_category(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        validate_name("category name", name, 100)?;

        let category = Category {
            id: new_id(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.active)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, active, created_at FROM categories WHERE active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Counts available products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE available = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Statement-level helpers (run inside a caller's transaction)
// =============================================================================

pub(crate) async fn get_by_code_conn(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Applies a guarded stock delta and logs the movement.
///
/// ## Returns
/// * `Err(CoreError::InsufficientStock)` - the delta would take a
///   stock-controlled product below zero
/// * `Err(CoreError::ProductNotFound)` - no such product
pub(crate) async fn change_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    kind: StockMovementKind,
    delta: i64,
    ctx: MovementContext<'_>,
) -> DbResult<StockMovement> {
    let now = Utc::now();

    let after: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
           SET stock = stock + ?1, updated_at = ?2
         WHERE id = ?3 AND (requires_stock = 0 OR stock + ?1 >= 0)
        RETURNING stock
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(stock_after) = after else {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT code, stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(match row {
            None => CoreError::ProductNotFound(product_id.to_string()).into(),
            Some((code, stock)) => {
                warn!(code = %code, stock, requested = -delta, "Stock guard rejected change");
                CoreError::InsufficientStock {
                    code,
                    available: stock,
                    requested: -delta,
                }
                .into()
            }
        });
    };

    let movement = StockMovement {
        id: new_id(),
        product_id: product_id.to_string(),
        kind,
        quantity: delta,
        stock_before: stock_after - delta,
        stock_after,
        reason: ctx.reason.map(str::to_string),
        operator_id: ctx.operator_id.map(str::to_string),
        sale_id: ctx.sale_id.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, kind, quantity, stock_before, stock_after,
            reason, operator_id, sale_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.stock_before)
    .bind(movement.stock_after)
    .bind(&movement.reason)
    .bind(&movement.operator_id)
    .bind(&movement.sale_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        kind = ?kind,
        before = movement.stock_before,
        after = movement.stock_after,
        "Stock movement recorded"
    );
    Ok(movement)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use cantina_core::inventory::StockLevel;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn empanada() -> NewProduct {
        let mut p = NewProduct::new("EMP-01", "Empanada de carne", Money::from_guaranies(5_000));
        p.cost = Money::from_guaranies(3_000);
        p.initial_stock = 10;
        p.min_stock = 3;
        p
    }

    #[tokio::test]
    async fn test_insert_logs_initial_stock() {
        let db = setup().await;
        let repo = db.products();

        let product = repo.insert(empanada(), None).await.unwrap();
        assert_eq!(product.stock, 10);

        let movements = repo.movements(&product.id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, StockMovementKind::Entry);
        assert_eq!(movements[0].stock_before, 0);
        assert_eq!(movements[0].stock_after, 10);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(empanada(), None).await.unwrap();
        let err = repo.insert(empanada(), None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_search_by_code_and_name() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(empanada(), None).await.unwrap();
        repo.insert(
            NewProduct::new("JUG-01", "Jugo de naranja", Money::from_guaranies(3_000)),
            None,
        )
        .await
        .unwrap();

        assert_eq!(repo.search("empa", 15).await.unwrap().len(), 1);
        assert_eq!(repo.search("jug", 15).await.unwrap().len(), 1);
        assert_eq!(repo.search("de", 15).await.unwrap().len(), 2);
        assert!(repo.search("e", 15).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_skips_unavailable() {
        let db = setup().await;
        let repo = db.products();
        let p = repo.insert(empanada(), None).await.unwrap();
        repo.set_available(&p.id, false).await.unwrap();
        assert!(repo.search("EMP", 15).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_cannot_go_below_zero() {
        let db = setup().await;
        let repo = db.products();
        let p = repo.insert(empanada(), None).await.unwrap();

        let err = repo
            .record_movement(&p.id, StockMovementKind::Exit, 11, Some("waste"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            })
        ));

        let m = repo
            .record_movement(&p.id, StockMovementKind::Exit, 10, Some("waste"), None)
            .await
            .unwrap();
        assert_eq!(m.stock_after, 0);
        let p = repo.get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(p.stock_level(), StockLevel::Out);
    }

    #[tokio::test]
    async fn test_set_stock_logs_adjustment() {
        let db = setup().await;
        let repo = db.products();
        let p = repo.insert(empanada(), None).await.unwrap();

        let m = repo.set_stock(&p.id, 4, Some("count"), None).await.unwrap().unwrap();
        assert_eq!(m.kind, StockMovementKind::Adjustment);
        assert_eq!(m.quantity, -6);
        assert!(repo.set_stock(&p.id, 4, None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = setup().await;
        let repo = db.products();
        let p = repo.insert(empanada(), None).await.unwrap();
        assert!(repo.low_stock().await.unwrap().is_empty());

        repo.set_stock(&p.id, 3, None, None).await.unwrap();
        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].search_label(), "EMP-01 - Empanada de carne (Stock: 3 - BAJO)");
    }

    #[tokio::test]
    async fn test_categories() {
        let db = setup().await;
        let repo = db.products();
        let cat = repo.create_category("Bebidas", None).await.unwrap();

        let mut new = NewProduct::new("AGU-01", "Agua 500ml", Money::from_guaranies(2_500));
        new.category_id = Some(cat.id.clone());
        let p = repo.insert(new, None).await.unwrap();
        assert_eq!(p.category_id.as_deref(), Some(cat.id.as_str()));
        assert_eq!(repo.list_categories().await.unwrap().len(), 1);
    }
}
