//! # Discount Repository
//!
//! Discount rows plus their product and collection scopes.
//!
//! Codes are stored normalized (trimmed, upper-case) so lookups are exact
//! matches on the unique index.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use orderly_core::discount::normalize_code;
use orderly_core::validation::validate_discount;
use orderly_core::{CollectionIndex, Discount, DiscountMethod, DiscountType};

use crate::error::{DbError, DbResult};

#[derive(sqlx::FromRow)]
struct DiscountRow {
    id: String,
    title: String,
    code: Option<String>,
    method: DiscountMethod,
    discount_type: DiscountType,
    amount_cents: Option<i64>,
    percent: Option<i64>,
    buy_x_quantity: Option<i64>,
    get_y_quantity: Option<i64>,
    min_purchase_amount_cents: Option<i64>,
    applies_to_all_products: bool,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl DiscountRow {
    fn into_discount(self, product_ids: BTreeSet<String>, collection_ids: BTreeSet<String>) -> Discount {
        Discount {
            id: self.id,
            title: self.title,
            code: self.code,
            method: self.method,
            discount_type: self.discount_type,
            amount_cents: self.amount_cents,
            percent: self.percent,
            buy_x_quantity: self.buy_x_quantity,
            get_y_quantity: self.get_y_quantity,
            min_purchase_amount_cents: self.min_purchase_amount_cents,
            applies_to_all_products: self.applies_to_all_products,
            product_ids,
            collection_ids,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: self.is_active,
        }
    }
}

/// Repository for discount database operations.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    /// Creates a new DiscountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Active discounts a checkout could apply, in creation order.
    ///
    /// Returns every active AUTOMATIC discount plus the CODE discount whose
    /// code equals `code` (normalized). Rows outside their validity window
    /// at `now` are dropped; minimum purchase is left to the engine.
    pub async fn list_active(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
        code: Option<&str>,
    ) -> DbResult<Vec<Discount>> {
        let code = code.map(normalize_code).filter(|c| !c.is_empty());

        let rows = sqlx::query_as::<_, DiscountRow>(
            r#"
            SELECT
                id, title, code, method, discount_type, amount_cents, percent,
                buy_x_quantity, get_y_quantity, min_purchase_amount_cents,
                applies_to_all_products, starts_at, ends_at, is_active
            FROM discounts
            WHERE is_active = 1
              AND (method = 'automatic' OR (method = 'code' AND code = ?1))
            ORDER BY created_at, rowid
            "#,
        )
        .bind(code)
        .fetch_all(&mut *conn)
        .await?;

        let mut discounts = Vec::with_capacity(rows.len());
        for row in rows {
            let product_ids = Self::product_ids(&mut *conn, &row.id).await?;
            let collection_ids = Self::collection_ids(&mut *conn, &row.id).await?;
            let discount = row.into_discount(product_ids, collection_ids);
            if discount.in_window(now) {
                discounts.push(discount);
            }
        }

        debug!(count = discounts.len(), "Active discounts loaded");
        Ok(discounts)
    }

    /// Product membership for each requested collection.
    pub async fn collection_index(
        conn: &mut SqliteConnection,
        collection_ids: &BTreeSet<String>,
    ) -> DbResult<CollectionIndex> {
        let mut index = CollectionIndex::new();
        for collection_id in collection_ids {
            let products: Vec<String> = sqlx::query_scalar(
                "SELECT product_id FROM collection_products WHERE collection_id = ?1",
            )
            .bind(collection_id)
            .fetch_all(&mut *conn)
            .await?;
            index.insert(collection_id.clone(), products.into_iter().collect());
        }
        Ok(index)
    }

    async fn product_ids(conn: &mut SqliteConnection, discount_id: &str) -> DbResult<BTreeSet<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT product_id FROM discount_products WHERE discount_id = ?1")
                .bind(discount_id)
                .fetch_all(&mut *conn)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn collection_ids(
        conn: &mut SqliteConnection,
        discount_id: &str,
    ) -> DbResult<BTreeSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT collection_id FROM discount_collections WHERE discount_id = ?1",
        )
        .bind(discount_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids.into_iter().collect())
    }

    // -------------------------------------------------------------------------
    // Admin
    // -------------------------------------------------------------------------

    /// Validates and stores a discount with its scopes.
    ///
    /// Fails with `UniqueViolation` when the code is taken.
    pub async fn insert(&self, discount: &Discount) -> DbResult<Discount> {
        validate_discount(discount)?;

        let mut discount = discount.clone();
        discount.code = discount.code.as_deref().map(normalize_code);

        let mut tx = crate::pool::begin_immediate(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, title, code, method, discount_type, amount_cents, percent,
                buy_x_quantity, get_y_quantity, min_purchase_amount_cents,
                applies_to_all_products, starts_at, ends_at, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.title)
        .bind(&discount.code)
        .bind(discount.method)
        .bind(discount.discount_type)
        .bind(discount.amount_cents)
        .bind(discount.percent)
        .bind(discount.buy_x_quantity)
        .bind(discount.get_y_quantity)
        .bind(discount.min_purchase_amount_cents)
        .bind(discount.applies_to_all_products)
        .bind(discount.starts_at)
        .bind(discount.ends_at)
        .bind(discount.is_active)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        for product_id in &discount.product_ids {
            sqlx::query("INSERT INTO discount_products (discount_id, product_id) VALUES (?1, ?2)")
                .bind(&discount.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        for collection_id in &discount.collection_ids {
            sqlx::query(
                "INSERT INTO discount_collections (discount_id, collection_id) VALUES (?1, ?2)",
            )
            .bind(&discount.id)
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(id = %discount.id, code = ?discount.code, "Discount stored");
        Ok(discount)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, DiscountRow>(
            r#"
            SELECT
                id, title, code, method, discount_type, amount_cents, percent,
                buy_x_quantity, get_y_quantity, min_purchase_amount_cents,
                applies_to_all_products, starts_at, ends_at, is_active
            FROM discounts WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let product_ids = Self::product_ids(&mut conn, &row.id).await?;
                let collection_ids = Self::collection_ids(&mut conn, &row.id).await?;
                Ok(Some(row.into_discount(product_ids, collection_ids)))
            }
            None => Ok(None),
        }
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE discounts SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", id));
        }
        Ok(())
    }
}
