//! # Station Repository
//!
//! Payment methods and cashier stations.
//!
//! Two payment methods are built in and always present: `saldo_virtual`
//! (the card balance) and `efectivo` (cash). Other methods such as
//! transfers or POS terminals are created by the administrator and may
//! carry a commission in basis points.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use cantina_core::validation::{validate_name, validate_product_code, validate_rate_bps};
use cantina_core::{
    CashierStation, CoreError, Operator, PaymentMethod, UserRole, ValidationError,
    CARD_BALANCE_METHOD, CASH_METHOD,
};

use super::new_id;
use crate::error::{DbError, DbResult};

const METHOD_COLUMNS: &str =
    "id, code, name, commission_bps, issues_invoice, active, sort_order";

const STATION_COLUMNS: &str = "id, code, name, location, current_cashier_id, active, created_at";

#[derive(Debug, Clone)]
pub struct NewPaymentMethod {
    pub code: String,
    pub name: String,
    pub commission_bps: u32,
    pub issues_invoice: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct StationRepository {
    pool: SqlitePool,
}

impl StationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StationRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Payment methods
    // -------------------------------------------------------------------------

    /// Active methods in display order.
    pub async fn list_payment_methods(&self) -> DbResult<Vec<PaymentMethod>> {
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE active = 1 ORDER BY sort_order, name"
        );
        let rows = sqlx::query_as::<_, PaymentMethod>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_payment_method(&self, code: &str) -> DbResult<Option<PaymentMethod>> {
        let mut conn = self.pool.acquire().await?;
        get_method_conn(&mut conn, code).await
    }

    pub async fn create_payment_method(&self, new: NewPaymentMethod) -> DbResult<PaymentMethod> {
        validate_product_code(&new.code)?;
        validate_name("method name", &new.name, 50)?;
        validate_rate_bps("commission", new.commission_bps)?;

        let method = PaymentMethod {
            id: new_id(),
            code: new.code.trim().to_lowercase(),
            name: new.name.trim().to_string(),
            commission_bps: new.commission_bps,
            issues_invoice: new.issues_invoice,
            active: true,
            sort_order: new.sort_order,
        };

        sqlx::query(
            "INSERT INTO payment_methods (id, code, name, commission_bps, issues_invoice, active, sort_order) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&method.id)
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.commission_bps)
        .bind(method.issues_invoice)
        .bind(method.active)
        .bind(method.sort_order)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_on("code") {
                DbError::duplicate("payment method code", &method.code)
            } else {
                err
            }
        })?;

        info!(code = %method.code, commission_bps = method.commission_bps, "Payment method created");
        Ok(method)
    }

    pub async fn set_payment_method_active(&self, code: &str, active: bool) -> DbResult<()> {
        if !active && (code == CARD_BALANCE_METHOD || code == CASH_METHOD) {
            return Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: vec!["non built-in methods".to_string()],
            }
            .into());
        }
        let result = sqlx::query("UPDATE payment_methods SET active = ?1 WHERE code = ?2")
            .bind(active)
            .bind(code)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::UnknownPaymentMethod(code.to_string()).into());
        }
        Ok(())
    }

    /// Re-creates the built-in methods if a database lost them.
    pub async fn ensure_builtin_methods(&self) -> DbResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO payment_methods (id, code, name, commission_bps, issues_invoice, active, sort_order)
            VALUES (?1, ?2, 'Saldo de tarjeta', 0, 0, 1, 0),
                   (?3, ?4, 'Efectivo', 0, 1, 1, 1)
            "#,
        )
        .bind(new_id())
        .bind(CARD_BALANCE_METHOD)
        .bind(new_id())
        .bind(CASH_METHOD)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(inserted, "Built-in payment methods restored");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cashier stations
    // -------------------------------------------------------------------------

    pub async fn create_station(
        &self,
        code: &str,
        name: &str,
        location: Option<&str>,
    ) -> DbResult<CashierStation> {
        validate_product_code(code)?;
        validate_name("station name", name, 100)?;

        let station = CashierStation {
            id: new_id(),
            code: code.trim().to_uppercase(),
            name: name.trim().to_string(),
            location: location.map(str::to_string),
            current_cashier_id: None,
            active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO cashier_stations (id, code, name, location, current_cashier_id, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
        )
        .bind(&station.id)
        .bind(&station.code)
        .bind(&station.name)
        .bind(&station.location)
        .bind(station.active)
        .bind(station.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_on("code") {
                DbError::duplicate("station code", &station.code)
            } else {
                err
            }
        })?;

        info!(code = %station.code, "Cashier station created");
        Ok(station)
    }

    pub async fn list_stations(&self) -> DbResult<Vec<CashierStation>> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM cashier_stations ORDER BY code");
        let rows = sqlx::query_as::<_, CashierStation>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_station(&self, code: &str) -> DbResult<Option<CashierStation>> {
        let mut conn = self.pool.acquire().await?;
        get_station_conn(&mut conn, code).await
    }

    /// Attaches a cashier to a station for the shift.
    pub async fn assign_cashier(&self, code: &str, cashier: &Operator) -> DbResult<CashierStation> {
        if cashier.role == UserRole::Guardian || !cashier.active {
            return Err(CoreError::Forbidden {
                role: cashier.role.to_string(),
                action: "operate a cashier station".to_string(),
            }
            .into());
        }

        let sql = format!(
            "UPDATE cashier_stations SET current_cashier_id = ?1 \
             WHERE code = ?2 AND active = 1 RETURNING {STATION_COLUMNS}"
        );
        let station = sqlx::query_as::<_, CashierStation>(&sql)
            .bind(&cashier.id)
            .bind(normalize_station_code(code))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NoActiveStation)?;

        info!(station = %station.code, cashier = %cashier.username, "Cashier assigned to station");
        Ok(station)
    }

    /// Detaches whoever is on the station.
    pub async fn release_station(&self, code: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE cashier_stations SET current_cashier_id = NULL WHERE code = ?1")
            .bind(normalize_station_code(code))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashierStation", code));
        }
        Ok(())
    }

    pub async fn set_station_active(&self, code: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE cashier_stations SET active = ?1, \
                 current_cashier_id = CASE WHEN ?1 THEN current_cashier_id ELSE NULL END \
             WHERE code = ?2",
        )
        .bind(active)
        .bind(normalize_station_code(code))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashierStation", code));
        }
        info!(station = %code, active, "Station status changed");
        Ok(())
    }
}

fn normalize_station_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub(crate) async fn get_method_conn(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<PaymentMethod>> {
    let sql = format!("SELECT {METHOD_COLUMNS} FROM payment_methods WHERE code = ?1");
    let row = sqlx::query_as::<_, PaymentMethod>(&sql)
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Active method or `UnknownPaymentMethod`.
pub(crate) async fn require_method_conn(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<PaymentMethod> {
    match get_method_conn(conn, code).await? {
        Some(method) if method.active => Ok(method),
        _ => Err(CoreError::UnknownPaymentMethod(code.to_string()).into()),
    }
}

pub(crate) async fn get_station_conn(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<CashierStation>> {
    let sql = format!("SELECT {STATION_COLUMNS} FROM cashier_stations WHERE code = ?1");
    let row = sqlx::query_as::<_, CashierStation>(&sql)
        .bind(normalize_station_code(code))
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[tokio::test]
    async fn test_builtin_methods_listed_first() {
        let fx = fixture().await;
        let stations = fx.db.stations();
        stations.ensure_builtin_methods().await.unwrap();

        stations
            .create_payment_method(NewPaymentMethod {
                code: "pos".to_string(),
                name: "POS Bancard".to_string(),
                commission_bps: 350,
                issues_invoice: true,
                sort_order: 5,
            })
            .await
            .unwrap();

        let codes: Vec<String> = stations
            .list_payment_methods()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.code)
            .collect();
        assert_eq!(codes, vec!["saldo_virtual", "efectivo", "pos"]);

        let pos = stations.get_payment_method("pos").await.unwrap().unwrap();
        assert_eq!(pos.commission_bps, 350);
    }

    #[tokio::test]
    async fn test_builtin_methods_cannot_be_disabled() {
        let fx = fixture().await;
        assert!(fx
            .db
            .stations()
            .set_payment_method_active(CASH_METHOD, false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_station_lifecycle() {
        let fx = fixture().await;
        let stations = fx.db.stations();

        let err = stations.create_station("caja-1", "Duplicada", None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let err = stations.assign_cashier("CAJA-1", &fx.guardian).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Forbidden { .. })));

        let station = stations.assign_cashier("caja-1", &fx.cashier).await.unwrap();
        assert_eq!(station.current_cashier_id.as_deref(), Some(fx.cashier.id.as_str()));

        stations.set_station_active("CAJA-1", false).await.unwrap();
        let station = stations.get_station("CAJA-1").await.unwrap().unwrap();
        assert!(!station.active);
        assert!(station.current_cashier_id.is_none());

        let err = stations.assign_cashier("CAJA-1", &fx.cashier).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NoActiveStation)));
    }
}
