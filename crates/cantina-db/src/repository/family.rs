//! # Family Repository
//!
//! Operators (guardians, cashiers, administrators) and the children whose
//! cards are used at the register.
//!
//! Card numbers and balances are read here but only ever written by
//! [`CardRepository`](super::card::CardRepository).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use cantina_core::card::normalize_card_number;
use cantina_core::validation::{validate_name, validate_phone, validate_search_query};
use cantina_core::{Child, CoreError, Money, Operator, UserRole, ValidationError};

use super::{like_pattern, new_id};
use crate::error::{DbError, DbResult};

pub(crate) const CHILD_COLUMNS: &str = "id, guardian_id, full_name, grade, section, card_number, \
     security_code, card_active, card_assigned_at, balance_cents, allow_negative, \
     negative_limit_cents, active, created_at, updated_at";

const OPERATOR_COLUMNS: &str =
    "id, username, full_name, role, phone, national_id, active, created_at";

#[derive(Debug, Clone)]
pub struct NewOperator {
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub national_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewChild {
    pub guardian_id: String,
    pub full_name: String,
    pub grade: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FamilyRepository {
    pool: SqlitePool,
}

impl FamilyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FamilyRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------

    pub async fn create_operator(&self, new: NewOperator) -> DbResult<Operator> {
        validate_name("username", &new.username, 50)?;
        validate_name("full name", &new.full_name, 150)?;
        if let Some(phone) = &new.phone {
            validate_phone(phone)?;
        }

        let operator = Operator {
            id: new_id(),
            username: new.username.trim().to_string(),
            full_name: new.full_name.trim().to_string(),
            role: new.role,
            phone: new.phone,
            national_id: new.national_id,
            active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO operators (id, username, full_name, role, phone, national_id, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&operator.id)
        .bind(&operator.username)
        .bind(&operator.full_name)
        .bind(operator.role)
        .bind(&operator.phone)
        .bind(&operator.national_id)
        .bind(operator.active)
        .bind(operator.created_at)
        .execute(&self.pool)
        .await?;

        info!(username = %operator.username, role = %operator.role, "Operator created");
        Ok(operator)
    }

    pub async fn get_operator(&self, id: &str) -> DbResult<Option<Operator>> {
        let sql = format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = ?1");
        let row = sqlx::query_as::<_, Operator>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Looks an operator up by id or username; active operators only.
    pub async fn find_active_operator(&self, id_or_username: &str) -> DbResult<Operator> {
        let sql = format!(
            "SELECT {OPERATOR_COLUMNS} FROM operators WHERE (id = ?1 OR username = ?1) AND active = 1"
        );
        sqlx::query_as::<_, Operator>(&sql)
            .bind(id_or_username.trim())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Operator", id_or_username))
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    pub async fn create_child(&self, new: NewChild) -> DbResult<Child> {
        validate_name("child name", &new.full_name, 150)?;

        let guardian = self
            .get_operator(&new.guardian_id)
            .await?
            .ok_or_else(|| DbError::not_found("Guardian", &new.guardian_id))?;
        if guardian.role != UserRole::Guardian {
            return Err(ValidationError::NotAllowed {
                field: "guardian role".to_string(),
                allowed: vec![UserRole::Guardian.to_string()],
            }
            .into());
        }

        let now = Utc::now();
        let child = Child {
            id: new_id(),
            guardian_id: new.guardian_id,
            full_name: new.full_name.trim().to_string(),
            grade: new.grade,
            section: new.section,
            card_number: None,
            security_code: None,
            card_active: false,
            card_assigned_at: None,
            balance_cents: 0,
            allow_negative: false,
            negative_limit_cents: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO children (
                id, guardian_id, full_name, grade, section,
                card_active, balance_cents, allow_negative, negative_limit_cents,
                active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, 0, 1, ?6, ?6)
            "#,
        )
        .bind(&child.id)
        .bind(&child.guardian_id)
        .bind(&child.full_name)
        .bind(&child.grade)
        .bind(&child.section)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(child_id = %child.id, guardian_id = %child.guardian_id, "Child registered");
        Ok(child)
    }

    pub async fn get_child(&self, id: &str) -> DbResult<Option<Child>> {
        let sql = format!("SELECT {CHILD_COLUMNS} FROM children WHERE id = ?1");
        let row = sqlx::query_as::<_, Child>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Accepts formatted (`5555-1234-...`) or plain card numbers.
    pub async fn get_child_by_card(&self, card_number: &str) -> DbResult<Option<Child>> {
        let sql = format!("SELECT {CHILD_COLUMNS} FROM children WHERE card_number = ?1");
        let row = sqlx::query_as::<_, Child>(&sql)
            .bind(normalize_card_number(card_number))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn children_of(&self, guardian_id: &str) -> DbResult<Vec<Child>> {
        let sql = format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE guardian_id = ?1 AND active = 1 ORDER BY full_name"
        );
        let rows = sqlx::query_as::<_, Child>(&sql)
            .bind(guardian_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Register lookup by card number or child name. Active cards only.
    ///
    /// Queries shorter than two characters return no rows.
    pub async fn search_cards(&self, query: &str, limit: u32) -> DbResult<Vec<Child>> {
        let Some(query) = validate_search_query(query)? else {
            return Ok(Vec::new());
        };

        debug!(query = %query, limit, "Searching cards");

        let card_digits = normalize_card_number(&query);
        let sql = format!(
            r#"SELECT {CHILD_COLUMNS} FROM children
               WHERE active = 1 AND card_active = 1 AND card_number IS NOT NULL
                 AND (card_number LIKE ?1 ESCAPE '\' OR full_name LIKE ?2 ESCAPE '\')
               ORDER BY full_name
               LIMIT ?3"#
        );
        let rows = sqlx::query_as::<_, Child>(&sql)
            .bind(like_pattern(&card_digits))
            .bind(like_pattern(&query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Sets the overdraft policy for a child's card.
    pub async fn set_overdraft(&self, child_id: &str, allow: bool, limit: Money) -> DbResult<Child> {
        if limit.is_negative() {
            return Err(CoreError::invalid_amount("overdraft limit cannot be negative").into());
        }
        let limit_cents = if allow { limit.cents() } else { 0 };

        let sql = format!(
            "UPDATE children SET allow_negative = ?1, negative_limit_cents = ?2, updated_at = ?3 \
             WHERE id = ?4 RETURNING {CHILD_COLUMNS}"
        );
        let child = sqlx::query_as::<_, Child>(&sql)
            .bind(allow)
            .bind(limit_cents)
            .bind(Utc::now())
            .bind(child_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ChildNotFound(child_id.to_string()))?;

        info!(child_id = %child_id, allow, limit = %limit, "Overdraft policy updated");
        Ok(child)
    }

    /// Removes a child from the register. The card stops working too.
    pub async fn deactivate_child(&self, child_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE children SET active = 0, card_active = 0, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(child_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ChildNotFound(child_id.to_string()).into());
        }
        info!(child_id = %child_id, "Child deactivated");
        Ok(())
    }
}

pub(crate) async fn get_child_conn(
    conn: &mut SqliteConnection,
    child_id: &str,
) -> DbResult<Child> {
    let sql = format!("SELECT {CHILD_COLUMNS} FROM children WHERE id = ?1");
    sqlx::query_as::<_, Child>(&sql)
        .bind(child_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::ChildNotFound(child_id.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn guardian(db: &Database) -> Operator {
        db.families()
            .create_operator(NewOperator {
                username: "mgomez".to_string(),
                full_name: "María Gómez".to_string(),
                role: UserRole::Guardian,
                phone: Some("+595981123456".to_string()),
                national_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_child_requires_guardian_role() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let families = db.families();

        let cashier = families
            .create_operator(NewOperator {
                username: "caja1".to_string(),
                full_name: "Caja Uno".to_string(),
                role: UserRole::Cashier,
                phone: None,
                national_id: None,
            })
            .await
            .unwrap();

        let err = families
            .create_child(NewChild {
                guardian_id: cashier.id,
                full_name: "Ana".to_string(),
                grade: None,
                section: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));

        let g = guardian(&db).await;
        let child = families
            .create_child(NewChild {
                guardian_id: g.id.clone(),
                full_name: "Ana Gómez".to_string(),
                grade: Some("3".to_string()),
                section: Some("B".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(child.balance(), Money::zero());
        assert!(!child.card_usable());
        assert_eq!(families.children_of(&g.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_phone_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .families()
            .create_operator(NewOperator {
                username: "x".to_string(),
                full_name: "X".to_string(),
                role: UserRole::Guardian,
                phone: Some("12-34".to_string()),
                national_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overdraft_policy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let g = guardian(&db).await;
        let child = db
            .families()
            .create_child(NewChild {
                guardian_id: g.id,
                full_name: "Luis".to_string(),
                grade: None,
                section: None,
            })
            .await
            .unwrap();

        let updated = db
            .families()
            .set_overdraft(&child.id, true, Money::from_guaranies(10_000))
            .await
            .unwrap();
        assert_eq!(updated.balance_policy().available(), Money::from_guaranies(10_000));

        let off = db
            .families()
            .set_overdraft(&child.id, false, Money::from_guaranies(10_000))
            .await
            .unwrap();
        assert_eq!(off.negative_limit_cents, 0);
    }
}
