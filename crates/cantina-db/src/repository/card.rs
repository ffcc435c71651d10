//! # Card Repository
//!
//! Family-card issuing and the stored-value ledger.
//!
//! ## Ledger Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every balance change is ONE transaction containing:                    │
//! │                                                                         │
//! │   1. UPDATE children SET balance_cents = balance_cents + :amount        │
//! │       WHERE id = :child AND <guard>                                     │
//! │      RETURNING balance_cents              ← after                       │
//! │                                                                         │
//! │   2. INSERT INTO card_transactions (..., before, amount, after)         │
//! │      before = after - amount              ← derived, never re-read      │
//! │      CHECK (after = before + amount)      ← enforced by the schema      │
//! │                                                                         │
//! │  The guard for purchases is                                             │
//! │    active AND card_active AND balance - amount >= floor                 │
//! │  so two registers racing on one card cannot both pass: the second       │
//! │  UPDATE sees the first one's result and matches zero rows.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Card administration (assign, regenerate, activate, deactivate) writes a
//! zero-amount `adjustment` row so the card's history shows it.

use chrono::Utc;
use rand::thread_rng;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use cantina_core::account::BalanceChange;
use cantina_core::card::{
    generate_card_number, generate_security_code, mask_card_number, validate_card_number,
    validate_security_code,
};
use cantina_core::permissions::{self, Action};
use cantina_core::validation::validate_recharge_amount;
use cantina_core::{
    CardTransaction, CardTransactionKind, Child, CoreError, Money, Operator, Recharge,
    TransactionStatus, UserRole,
};

use super::family::{get_child_conn, CHILD_COLUMNS};
use super::new_id;
use crate::error::{DbError, DbResult};

/// Attempts before giving up on a random card number.
const CARD_NUMBER_ATTEMPTS: usize = 5;

/// Stored on ledger rows for children who never had a card.
const NO_CARD: &str = "N/A";

const TRANSACTION_COLUMNS: &str = "id, child_id, card_number, kind, amount_cents, \
     balance_before_cents, balance_after_cents, status, operator_id, station_code, \
     sale_id, note, created_at";

/// Who and where, copied onto each ledger row.
#[derive(Debug, Clone, Default)]
pub struct LedgerContext {
    pub operator_id: Option<String>,
    pub station_code: Option<String>,
    pub sale_id: Option<String>,
    pub note: Option<String>,
}

impl LedgerContext {
    pub fn by(operator: &Operator) -> Self {
        LedgerContext {
            operator_id: Some(operator.id.clone()),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of a recharge: the top-up row and its ledger row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RechargeReceipt {
    pub recharge: Recharge,
    pub transaction: CardTransaction,
}

#[derive(Debug, Clone)]
pub struct CardRepository {
    pool: SqlitePool,
}

impl CardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CardRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Card administration
    // -------------------------------------------------------------------------

    /// Gives a child a card. Number and code are generated unless supplied.
    ///
    /// ## Returns
    /// * `Err(CoreError::CardAlreadyAssigned)` - child already holds a card
    /// * `Err(CoreError::CardNumberInUse)` - manual number taken
    pub async fn assign_card(
        &self,
        child_id: &str,
        manual_number: Option<&str>,
        manual_code: Option<&str>,
        actor: &Operator,
    ) -> DbResult<Child> {
        permissions::require(actor.role, Action::AssignCard)?;

        let manual_number = manual_number.map(validate_card_number).transpose()?;
        if let Some(code) = manual_code {
            validate_security_code(code)?;
        }

        let child = self.load_child(child_id).await?;
        ensure_guardian_owns(actor, &child)?;
        if child.card_number.is_some() {
            return Err(CoreError::CardAlreadyAssigned {
                child: child.full_name,
            }
            .into());
        }

        for attempt in 1..=CARD_NUMBER_ATTEMPTS {
            let (number, code) = {
                let mut rng = thread_rng();
                (
                    manual_number
                        .clone()
                        .unwrap_or_else(|| generate_card_number(&mut rng)),
                    manual_code
                        .map(|c| c.trim().to_string())
                        .unwrap_or_else(|| generate_security_code(&mut rng)),
                )
            };

            match self.try_assign(child_id, &number, &code, actor).await {
                Ok(child) => {
                    info!(
                        child_id = %child_id,
                        card = %mask_card_number(&number),
                        "Card assigned"
                    );
                    return Ok(child);
                }
                Err(e) if e.is_unique_on("card_number") => {
                    if manual_number.is_some() {
                        return Err(CoreError::CardNumberInUse(number).into());
                    }
                    warn!(attempt, "Generated card number collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Internal(
            "could not generate a unique card number".to_string(),
        ))
    }

    async fn try_assign(
        &self,
        child_id: &str,
        number: &str,
        code: &str,
        actor: &Operator,
    ) -> DbResult<Child> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE children SET card_number = ?1, security_code = ?2, card_active = 1, \
                 card_assigned_at = ?3, updated_at = ?3 \
             WHERE id = ?4 AND card_number IS NULL AND active = 1 \
             RETURNING {CHILD_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Child>(&sql)
            .bind(number)
            .bind(code)
            .bind(now)
            .bind(child_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(child) = updated else {
            let child = get_child_conn(&mut tx, child_id).await?;
            return Err(if !child.active {
                CoreError::CardInactive
            } else {
                CoreError::CardAlreadyAssigned {
                    child: child.full_name,
                }
            }
            .into());
        };

        let ctx = LedgerContext::by(actor).with_note(format!(
            "Card assigned: {}",
            mask_card_number(number)
        ));
        record_marker(&mut tx, &child, &ctx).await?;
        tx.commit().await?;
        Ok(child)
    }

    /// Issues a new number and security code for a lost or compromised card.
    /// The balance stays with the child.
    pub async fn regenerate_card(&self, child_id: &str, actor: &Operator) -> DbResult<Child> {
        permissions::require(actor.role, Action::RegenerateCard)?;

        for attempt in 1..=CARD_NUMBER_ATTEMPTS {
            let (number, code) = {
                let mut rng = thread_rng();
                (generate_card_number(&mut rng), generate_security_code(&mut rng))
            };

            match self.try_regenerate(child_id, &number, &code, actor).await {
                Ok(child) => return Ok(child),
                Err(e) if e.is_unique_on("card_number") => {
                    warn!(attempt, "Generated card number collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Internal(
            "could not generate a unique card number".to_string(),
        ))
    }

    async fn try_regenerate(
        &self,
        child_id: &str,
        number: &str,
        code: &str,
        actor: &Operator,
    ) -> DbResult<Child> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Write first: takes the lock and hands back the old number.
        let old: Option<Option<String>> = sqlx::query_scalar(
            "UPDATE children SET updated_at = ?1 WHERE id = ?2 RETURNING card_number",
        )
        .bind(now)
        .bind(child_id)
        .fetch_optional(&mut *tx)
        .await?;
        let old_number = match old {
            None => return Err(CoreError::ChildNotFound(child_id.to_string()).into()),
            Some(None) => return Err(CoreError::CardInactive.into()),
            Some(Some(n)) => n,
        };

        let sql = format!(
            "UPDATE children SET card_number = ?1, security_code = ?2, card_assigned_at = ?3 \
             WHERE id = ?4 RETURNING {CHILD_COLUMNS}"
        );
        let child = sqlx::query_as::<_, Child>(&sql)
            .bind(number)
            .bind(code)
            .bind(now)
            .bind(child_id)
            .fetch_one(&mut *tx)
            .await?;

        let ctx = LedgerContext::by(actor).with_note(format!(
            "Card regenerated: {} replaced by {}",
            mask_card_number(&old_number),
            mask_card_number(number)
        ));
        record_marker(&mut tx, &child, &ctx).await?;
        tx.commit().await?;

        info!(
            child_id = %child_id,
            old = %mask_card_number(&old_number),
            new = %mask_card_number(number),
            "Card regenerated"
        );
        Ok(child)
    }

    /// Turns a card on or off. Administrators only.
    pub async fn set_card_active(
        &self,
        child_id: &str,
        active: bool,
        actor: &Operator,
    ) -> DbResult<Child> {
        permissions::require(actor.role, Action::ToggleCard)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE children SET card_active = ?1, updated_at = ?2 \
             WHERE id = ?3 AND card_number IS NOT NULL RETURNING {CHILD_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Child>(&sql)
            .bind(active)
            .bind(Utc::now())
            .bind(child_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(child) = updated else {
            // Not found, or no card to toggle.
            get_child_conn(&mut tx, child_id).await?;
            return Err(CoreError::CardInactive.into());
        };

        let note = if active { "Card activated" } else { "Card deactivated" };
        record_marker(&mut tx, &child, &LedgerContext::by(actor).with_note(note)).await?;
        tx.commit().await?;

        info!(child_id = %child_id, active, "Card status changed");
        Ok(child)
    }

    // -------------------------------------------------------------------------
    // Balance movements
    // -------------------------------------------------------------------------

    /// Tops up a card. Minimum Gs. 1.000.
    ///
    /// Works on a deactivated card (parents may fund it before it is
    /// re-enabled) but not on a child without a card.
    pub async fn recharge(
        &self,
        child_id: &str,
        amount: Money,
        actor: &Operator,
        note: Option<&str>,
    ) -> DbResult<RechargeReceipt> {
        permissions::require(actor.role, Action::Recharge)?;
        validate_recharge_amount(amount)?;

        let child = self.load_child(child_id).await?;
        ensure_guardian_owns(actor, &child)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            UPDATE children
               SET balance_cents = balance_cents + ?1, updated_at = ?2
             WHERE id = ?3 AND active = 1 AND card_number IS NOT NULL
            RETURNING balance_cents, card_number
            "#,
        )
        .bind(amount.cents())
        .bind(now)
        .bind(child_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((after, card_number)) = row else {
            return Err(CoreError::CardInactive.into());
        };

        let recharge = Recharge {
            id: new_id(),
            child_id: child_id.to_string(),
            amount_cents: amount.cents(),
            operator_id: Some(actor.id.clone()),
            note: note.map(str::to_string),
            created_at: now,
        };
        sqlx::query(
            "INSERT INTO recharges (id, child_id, amount_cents, operator_id, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&recharge.id)
        .bind(&recharge.child_id)
        .bind(recharge.amount_cents)
        .bind(&recharge.operator_id)
        .bind(&recharge.note)
        .bind(recharge.created_at)
        .execute(&mut *tx)
        .await?;

        let change = BalanceChange::from_after(Money::from_cents(after), amount);
        let ctx = LedgerContext {
            operator_id: Some(actor.id.clone()),
            note: Some(note.map(str::to_string).unwrap_or_else(|| "Recharge".to_string())),
            ..Default::default()
        };
        let transaction = insert_transaction(
            &mut tx,
            child_id,
            &card_number,
            CardTransactionKind::Recharge,
            change,
            &ctx,
        )
        .await?;
        tx.commit().await?;

        info!(
            child_id = %child_id,
            amount = %amount,
            balance = %change.after,
            "Card recharged"
        );
        Ok(RechargeReceipt {
            recharge,
            transaction,
        })
    }

    /// Manual correction, positive or negative. Not floor-guarded.
    pub async fn adjust(
        &self,
        child_id: &str,
        amount: Money,
        note: &str,
        actor: &Operator,
    ) -> DbResult<CardTransaction> {
        permissions::require(actor.role, Action::AdjustBalance)?;
        if amount.is_zero() {
            return Err(CoreError::invalid_amount("adjustment cannot be zero").into());
        }
        if note.trim().is_empty() {
            return Err(cantina_core::ValidationError::Required {
                field: "note".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let tx_row = credit(
            &mut tx,
            child_id,
            amount,
            CardTransactionKind::Adjustment,
            &LedgerContext::by(actor).with_note(note.trim()),
        )
        .await?;
        tx.commit().await?;

        info!(child_id = %child_id, amount = %amount, "Balance adjusted");
        Ok(tx_row)
    }

    /// Returns money to the card, optionally linked to a sale.
    pub async fn refund(
        &self,
        child_id: &str,
        amount: Money,
        sale_id: Option<&str>,
        actor: &Operator,
    ) -> DbResult<CardTransaction> {
        permissions::require(actor.role, Action::AdjustBalance)?;
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount("refund must be positive").into());
        }

        let mut tx = self.pool.begin().await?;
        let ctx = LedgerContext {
            operator_id: Some(actor.id.clone()),
            sale_id: sale_id.map(str::to_string),
            note: Some("Refund".to_string()),
            ..Default::default()
        };
        let row = credit(&mut tx, child_id, amount, CardTransactionKind::Refund, &ctx).await?;
        tx.commit().await?;

        info!(child_id = %child_id, amount = %amount, "Card refunded");
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// Newest first.
    pub async fn transactions(&self, child_id: &str, limit: u32) -> DbResult<Vec<CardTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM card_transactions \
             WHERE child_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, CardTransaction>(&sql)
            .bind(child_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Newest first.
    pub async fn recharges(&self, child_id: &str, limit: u32) -> DbResult<Vec<Recharge>> {
        let rows = sqlx::query_as::<_, Recharge>(
            "SELECT id, child_id, amount_cents, operator_id, note, created_at FROM recharges \
             WHERE child_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(child_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// True when the ledger replays to the stored balance and every row
    /// satisfies `after = before + amount`.
    pub async fn ledger_is_consistent(&self, child_id: &str) -> DbResult<bool> {
        let (balance, sum, bad_rows): (Option<i64>, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT balance_cents FROM children WHERE id = ?1),
                COALESCE((SELECT SUM(amount_cents) FROM card_transactions
                           WHERE child_id = ?1 AND status = 'succeeded'), 0),
                (SELECT COUNT(*) FROM card_transactions
                  WHERE child_id = ?1
                    AND balance_after_cents != balance_before_cents + amount_cents)
            "#,
        )
        .bind(child_id)
        .fetch_one(&self.pool)
        .await?;

        let balance = balance.ok_or_else(|| CoreError::ChildNotFound(child_id.to_string()))?;
        Ok(balance == sum && bad_rows == 0)
    }

    async fn load_child(&self, child_id: &str) -> DbResult<Child> {
        let mut conn = self.pool.acquire().await?;
        get_child_conn(&mut conn, child_id).await
    }
}

// =============================================================================
// Statement-level helpers (run inside a caller's transaction)
// =============================================================================

/// Debits a purchase with the overdraft guard.
///
/// ## Returns
/// * `Err(CoreError::InsufficientBalance)` - would cross the floor
/// * `Err(CoreError::CardInactive)` - card off, missing, or child inactive
/// * `Err(CoreError::ChildNotFound)`
pub(crate) async fn charge(
    conn: &mut SqliteConnection,
    child_id: &str,
    amount: Money,
    ctx: &LedgerContext,
) -> DbResult<CardTransaction> {
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount("purchase amount must be positive").into());
    }

    let row: Option<(i64, String)> = sqlx::query_as(
        r#"
        UPDATE children
           SET balance_cents = balance_cents - ?1, updated_at = ?2
         WHERE id = ?3
           AND active = 1
           AND card_active = 1
           AND card_number IS NOT NULL
           AND balance_cents - ?1 >= CASE WHEN allow_negative = 1
                                          THEN -negative_limit_cents
                                          ELSE 0 END
        RETURNING balance_cents, card_number
        "#,
    )
    .bind(amount.cents())
    .bind(Utc::now())
    .bind(child_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((after, card_number)) = row else {
        let child = get_child_conn(conn, child_id).await?;
        let policy = child.balance_policy();
        let rejection = policy
            .authorize_purchase(child.card_active && child.card_number.is_some(), child.active, amount)
            .err()
            .unwrap_or(CoreError::InsufficientBalance {
                available: policy.available(),
                required: amount,
            });
        warn!(child_id = %child_id, amount = %amount, reason = %rejection, "Card charge rejected");
        return Err(rejection.into());
    };

    let change = BalanceChange::from_after(Money::from_cents(after), -amount);
    let row = insert_transaction(
        conn,
        child_id,
        &card_number,
        CardTransactionKind::Purchase,
        change,
        ctx,
    )
    .await?;

    debug!(child_id = %child_id, amount = %amount, balance = %change.after, "Card charged");
    Ok(row)
}

/// Unguarded signed change (adjustments and refunds).
pub(crate) async fn credit(
    conn: &mut SqliteConnection,
    child_id: &str,
    amount: Money,
    kind: CardTransactionKind,
    ctx: &LedgerContext,
) -> DbResult<CardTransaction> {
    let row: Option<(i64, Option<String>)> = sqlx::query_as(
        "UPDATE children SET balance_cents = balance_cents + ?1, updated_at = ?2 \
         WHERE id = ?3 RETURNING balance_cents, card_number",
    )
    .bind(amount.cents())
    .bind(Utc::now())
    .bind(child_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (after, card_number) =
        row.ok_or_else(|| CoreError::ChildNotFound(child_id.to_string()))?;
    let change = BalanceChange::from_after(Money::from_cents(after), amount);
    insert_transaction(
        conn,
        child_id,
        card_number.as_deref().unwrap_or(NO_CARD),
        kind,
        change,
        ctx,
    )
    .await
}

/// Zero-amount adjustment row marking a card administration event.
async fn record_marker(
    conn: &mut SqliteConnection,
    child: &Child,
    ctx: &LedgerContext,
) -> DbResult<CardTransaction> {
    insert_transaction(
        conn,
        &child.id,
        child.card_number.as_deref().unwrap_or(NO_CARD),
        CardTransactionKind::Adjustment,
        BalanceChange::apply(child.balance(), Money::zero()),
        ctx,
    )
    .await
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    child_id: &str,
    card_number: &str,
    kind: CardTransactionKind,
    change: BalanceChange,
    ctx: &LedgerContext,
) -> DbResult<CardTransaction> {
    let row = CardTransaction {
        id: new_id(),
        child_id: child_id.to_string(),
        card_number: card_number.to_string(),
        kind,
        amount_cents: change.amount.cents(),
        balance_before_cents: change.before.cents(),
        balance_after_cents: change.after.cents(),
        status: TransactionStatus::Succeeded,
        operator_id: ctx.operator_id.clone(),
        station_code: ctx.station_code.clone(),
        sale_id: ctx.sale_id.clone(),
        note: ctx.note.clone(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO card_transactions (
            id, child_id, card_number, kind, amount_cents,
            balance_before_cents, balance_after_cents, status,
            operator_id, station_code, sale_id, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&row.id)
    .bind(&row.child_id)
    .bind(&row.card_number)
    .bind(row.kind)
    .bind(row.amount_cents)
    .bind(row.balance_before_cents)
    .bind(row.balance_after_cents)
    .bind(row.status)
    .bind(&row.operator_id)
    .bind(&row.station_code)
    .bind(&row.sale_id)
    .bind(&row.note)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(row)
}

/// Guardians act on their own children only.
fn ensure_guardian_owns(actor: &Operator, child: &Child) -> DbResult<()> {
    if actor.role == UserRole::Guardian && actor.id != child.guardian_id {
        return Err(CoreError::Forbidden {
            role: actor.role.to_string(),
            action: format!("manage the card of {}", child.full_name),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
