//! # Gift Card Repository
//!
//! Card rows and their append-only transaction ledger.
//!
//! The balance column is only ever moved by [`GiftCardRepository::compare_and_debit`],
//! which refuses to write unless the balance is still the value the caller read.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use orderly_core::discount::normalize_code;
use orderly_core::validation::{validate_code, validate_gift_card_value};
use orderly_core::{GiftCard, GiftCardStatus, GiftCardTransaction};

use crate::error::{DbError, DbResult};

/// Repository for gift card database operations.
#[derive(Debug, Clone)]
pub struct GiftCardRepository {
    pool: SqlitePool,
}

impl GiftCardRepository {
    /// Creates a new GiftCardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GiftCardRepository { pool }
    }

    /// Case-insensitive lookup.
    pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<GiftCard>> {
        let card = sqlx::query_as::<_, GiftCard>("SELECT * FROM gift_cards WHERE code = ?1")
            .bind(normalize_code(code))
            .fetch_optional(&mut *conn)
            .await?;
        Ok(card)
    }

    /// Debits `amount` only if the balance still equals `observed`.
    ///
    /// Returns `false` when another writer got there first.
    pub async fn compare_and_debit(
        conn: &mut SqliteConnection,
        card_id: &str,
        observed: i64,
        amount: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE gift_cards
            SET balance_cents = balance_cents - ?3
            WHERE id = ?1 AND balance_cents = ?2 AND balance_cents >= ?3
            "#,
        )
        .bind(card_id)
        .bind(observed)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        transaction: &GiftCardTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gift_card_transactions (id, gift_card_id, kind, amount_cents, order_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.gift_card_id)
        .bind(transaction.kind)
        .bind(transaction.amount_cents)
        .bind(&transaction.order_id)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn transactions_for(
        conn: &mut SqliteConnection,
        gift_card_id: &str,
    ) -> DbResult<Vec<GiftCardTransaction>> {
        let rows = sqlx::query_as::<_, GiftCardTransaction>(
            "SELECT * FROM gift_card_transactions WHERE gift_card_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(gift_card_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Pool operations
    // -------------------------------------------------------------------------

    /// Issues a new active card with its full value as balance.
    pub async fn insert(
        &self,
        code: &str,
        initial_value_cents: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<GiftCard> {
        validate_code("gift_card_code", code)?;
        validate_gift_card_value(initial_value_cents)?;

        let card = GiftCard {
            id: Uuid::new_v4().to_string(),
            code: normalize_code(code),
            initial_value_cents,
            balance_cents: initial_value_cents,
            status: GiftCardStatus::Active,
            expires_at,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO gift_cards (id, code, initial_value_cents, balance_cents, status, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&card.id)
        .bind(&card.code)
        .bind(card.initial_value_cents)
        .bind(card.balance_cents)
        .bind(card.status)
        .bind(card.expires_at)
        .bind(card.created_at)
        .execute(&self.pool)
        .await?;

        Ok(card)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<GiftCard>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_code(&mut conn, code).await
    }

    pub async fn transactions(&self, gift_card_id: &str) -> DbResult<Vec<GiftCardTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::transactions_for(&mut conn, gift_card_id).await
    }

    pub async fn set_status(&self, code: &str, status: GiftCardStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE gift_cards SET status = ?2 WHERE code = ?1")
            .bind(normalize_code(code))
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("GiftCard", code));
        }
        Ok(())
    }
}
