//! # Inventory Repository
//!
//! Stock counters on `variants` / `products` and the `inventory_transactions`
//! ledger behind them. Callers go through
//! [`InventoryLedger`](crate::service::inventory::InventoryLedger), which keeps
//! the two in step inside one transaction.
//!
//! ## Conditional Update
//! ```text
//! UPDATE variants SET stock = stock + :delta
//! WHERE id = :id AND stock + :delta >= 0
//!
//! rows_affected = 1  →  applied
//! rows_affected = 0  →  missing row or not enough stock
//! ```
//! The check and the write are one statement, so two checkouts can never
//! both take the last unit.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use orderly_core::{InventoryTransaction, StockTarget};

use crate::error::DbResult;

/// Repository for stock counters and the inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

fn stock_table(target: &StockTarget) -> &'static str {
    match target {
        StockTarget::Variant(_) => "variants",
        StockTarget::Product(_) => "products",
    }
}

fn ledger_column(target: &StockTarget) -> &'static str {
    match target {
        StockTarget::Variant(_) => "variant_id",
        StockTarget::Product(_) => "product_id",
    }
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Current counter value, `None` if the target does not exist.
    pub async fn stock_level(conn: &mut SqliteConnection, target: &StockTarget) -> DbResult<Option<i64>> {
        let sql = format!("SELECT stock FROM {} WHERE id = ?1", stock_table(target));
        let stock: Option<i64> = sqlx::query_scalar(&sql)
            .bind(target.id())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(stock)
    }

    /// Moves the counter by `delta` unless that would take it below zero.
    pub async fn apply_change(conn: &mut SqliteConnection, target: &StockTarget, delta: i64) -> DbResult<bool> {
        let sql = format!(
            "UPDATE {} SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1 AND stock + ?2 >= 0",
            stock_table(target)
        );
        let result = sqlx::query(&sql)
            .bind(target.id())
            .bind(delta)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        transaction: &InventoryTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, variant_id, product_id, change, reason, order_id, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.variant_id)
        .bind(&transaction.product_id)
        .bind(transaction.change)
        .bind(transaction.reason)
        .bind(&transaction.order_id)
        .bind(&transaction.notes)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Σ change over every ledger row for `target`.
    pub async fn ledger_sum(conn: &mut SqliteConnection, target: &StockTarget) -> DbResult<i64> {
        let sql = format!(
            "SELECT COALESCE(SUM(change), 0) FROM inventory_transactions WHERE {} = ?1",
            ledger_column(target)
        );
        let sum: i64 = sqlx::query_scalar(&sql)
            .bind(target.id())
            .fetch_one(&mut *conn)
            .await?;
        Ok(sum)
    }

    pub async fn transactions_for_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<InventoryTransaction>> {
        let rows = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT * FROM inventory_transactions WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Pool reads
    // -------------------------------------------------------------------------

    pub async fn stock(&self, target: &StockTarget) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::stock_level(&mut conn, target).await
    }

    /// Ledger rows for one target, oldest first.
    pub async fn history(&self, target: &StockTarget) -> DbResult<Vec<InventoryTransaction>> {
        let sql = format!(
            "SELECT * FROM inventory_transactions WHERE {} = ?1 ORDER BY created_at, rowid",
            ledger_column(target)
        );
        let rows = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(target.id())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<InventoryTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::transactions_for_order(&mut conn, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product_level, seed_variant, setup};

    #[tokio::test]
    async fn test_apply_change_refuses_negative_stock() {
        let db = setup().await;
        let seeded = seed_variant(&db, 1000, 2).await;
        let target = StockTarget::Variant(seeded.variant_id.clone());

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!InventoryRepository::apply_change(&mut conn, &target, -3).await.unwrap());
        assert!(InventoryRepository::apply_change(&mut conn, &target, -2).await.unwrap());
        assert_eq!(InventoryRepository::stock_level(&mut conn, &target).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_product_level_counter() {
        let db = setup().await;
        let seeded = seed_product_level(&db, 1000, 4).await;
        let target = StockTarget::Product(seeded.product_id.clone());

        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(4));
        assert_eq!(db.inventory().history(&target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_target() {
        let db = setup().await;
        let target = StockTarget::Variant("nope".into());

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(InventoryRepository::stock_level(&mut conn, &target).await.unwrap(), None);
        assert!(!InventoryRepository::apply_change(&mut conn, &target, 1).await.unwrap());
        assert_eq!(InventoryRepository::ledger_sum(&mut conn, &target).await.unwrap(), 0);
    }
}
