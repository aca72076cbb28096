//! # Inventory Ledger
//!
//! Every stock movement is a counter update plus a ledger row, written
//! together on the same connection.
//!
//! ## Invariant
//! ```text
//! variants.stock (or products.stock) == Σ inventory_transactions.change
//! ```
//! [`InventoryLedger::verify`] recomputes both sides.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orderly_core::validation::validate_quantity;
use orderly_core::{CoreError, InventoryReason, InventoryTransaction, StockTarget, ValidationError};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::inventory::InventoryRepository;

/// Counter vs ledger for one stock target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockCheck {
    pub target: StockTarget,
    pub stock: i64,
    pub ledger_sum: i64,
}

impl StockCheck {
    pub fn is_consistent(&self) -> bool {
        self.stock == self.ledger_sum
    }
}

/// Stock mutations and audits.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

fn not_found(target: &StockTarget) -> DbError {
    match target {
        StockTarget::Variant(id) => DbError::not_found("Variant", id.as_str()),
        StockTarget::Product(id) => DbError::not_found("Product", id.as_str()),
    }
}

fn ledger_row(
    target: &StockTarget,
    change: i64,
    reason: InventoryReason,
    order_id: Option<&str>,
    notes: Option<&str>,
) -> InventoryTransaction {
    let (variant_id, product_id) = match target {
        StockTarget::Variant(id) => (Some(id.clone()), None),
        StockTarget::Product(id) => (None, Some(id.clone())),
    };
    InventoryTransaction {
        id: Uuid::new_v4().to_string(),
        variant_id,
        product_id,
        change,
        reason,
        order_id: order_id.map(str::to_string),
        notes: notes.map(str::to_string),
        created_at: Utc::now(),
    }
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    // -------------------------------------------------------------------------
    // Transactional moves
    // -------------------------------------------------------------------------

    /// Takes `quantity` units out of stock.
    ///
    /// ## Errors
    /// - `NotFound` if the target does not exist
    /// - `InsufficientStock` if fewer than `quantity` units are available;
    ///   nothing is written
    pub async fn decrement(
        conn: &mut SqliteConnection,
        target: &StockTarget,
        quantity: i64,
        reason: InventoryReason,
        order_id: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<InventoryTransaction> {
        validate_quantity(quantity)?;

        if !InventoryRepository::apply_change(&mut *conn, target, -quantity).await? {
            let available = InventoryRepository::stock_level(&mut *conn, target)
                .await?
                .ok_or_else(|| not_found(target))?;

            warn!(%target, available, requested = quantity, "Insufficient stock");
            return Err(CoreError::InsufficientStock {
                target: target.to_string(),
                available,
                requested: quantity,
            }
            .into());
        }

        let row = ledger_row(target, -quantity, reason, order_id, notes);
        InventoryRepository::insert_transaction(&mut *conn, &row).await?;

        debug!(%target, change = row.change, reason = ?reason, "Stock decremented");
        Ok(row)
    }

    /// Puts `quantity` units back into stock.
    pub async fn increment(
        conn: &mut SqliteConnection,
        target: &StockTarget,
        quantity: i64,
        reason: InventoryReason,
        order_id: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<InventoryTransaction> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if !InventoryRepository::apply_change(&mut *conn, target, quantity).await? {
            return Err(not_found(target));
        }

        let row = ledger_row(target, quantity, reason, order_id, notes);
        InventoryRepository::insert_transaction(&mut *conn, &row).await?;

        debug!(%target, change = row.change, reason = ?reason, "Stock incremented");
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Standalone operations
    // -------------------------------------------------------------------------

    /// Receives goods.
    pub async fn restock(
        &self,
        target: &StockTarget,
        quantity: i64,
        notes: Option<&str>,
    ) -> DbResult<InventoryTransaction> {
        let mut tx = self.db.begin().await?;
        let row = Self::increment(&mut *tx, target, quantity, InventoryReason::Restock, None, notes).await?;
        tx.commit().await?;

        info!(%target, quantity, "Restocked");
        Ok(row)
    }

    /// Manual correction by a signed `delta`; cannot take stock below zero.
    pub async fn adjust(
        &self,
        target: &StockTarget,
        delta: i64,
        notes: &str,
    ) -> DbResult<InventoryTransaction> {
        if delta == 0 {
            return Err(CoreError::InvalidInput("adjustment must be non-zero".to_string()).into());
        }

        let mut tx = self.db.begin().await?;
        let row = match delta {
            d if d > 0 => {
                Self::increment(&mut *tx, target, d, InventoryReason::Adjustment, None, Some(notes))
                    .await?
            }
            d => {
                Self::decrement(&mut *tx, target, -d, InventoryReason::Adjustment, None, Some(notes))
                    .await?
            }
        };
        tx.commit().await?;

        info!(%target, delta, notes, "Stock adjusted");
        Ok(row)
    }

    /// Compares the counter with the ledger sum.
    pub async fn verify(&self, target: &StockTarget) -> DbResult<StockCheck> {
        let mut conn = self.db.pool().acquire().await?;

        let stock = InventoryRepository::stock_level(&mut conn, target)
            .await?
            .ok_or_else(|| not_found(target))?;
        let ledger_sum = InventoryRepository::ledger_sum(&mut conn, target).await?;

        let check = StockCheck {
            target: target.clone(),
            stock,
            ledger_sum,
        };
        if !check.is_consistent() {
            warn!(%target, stock, ledger_sum, "Stock counter disagrees with ledger");
        }
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product_level, seed_variant, setup};
    use orderly_core::ErrorKind;

    #[tokio::test]
    async fn test_decrement_writes_sale_row() {
        let db = setup().await;
        let seeded = seed_variant(&db, 1000, 5).await;
        let target = StockTarget::Variant(seeded.variant_id.clone());

        let mut tx = db.begin().await.unwrap();
        let row = InventoryLedger::decrement(&mut *tx, &target, 2, InventoryReason::Sale, Some("o-1"), None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(row.change, -2);
        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(3));

        let check = InventoryLedger::new(db.clone()).verify(&target).await.unwrap();
        assert!(check.is_consistent());
        assert_eq!(check.ledger_sum, 3);
    }

    #[tokio::test]
    async fn test_decrement_insufficient_reports_available() {
        let db = setup().await;
        let seeded = seed_product_level(&db, 1000, 1).await;
        let target = StockTarget::Product(seeded.product_id.clone());

        let mut tx = db.begin().await.unwrap();
        let err = InventoryLedger::decrement(&mut *tx, &target, 2, InventoryReason::Sale, None, None)
            .await
            .unwrap_err();
        drop(tx);

        match err {
            DbError::Domain(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let db = setup().await;
        let target = StockTarget::Variant("missing".into());

        let mut tx = db.begin().await.unwrap();
        let err = InventoryLedger::decrement(&mut *tx, &target, 1, InventoryReason::Sale, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_adjust_both_directions() {
        let db = setup().await;
        let seeded = seed_variant(&db, 1000, 5).await;
        let target = StockTarget::Variant(seeded.variant_id.clone());
        let ledger = InventoryLedger::new(db.clone());

        ledger.adjust(&target, -2, "damaged in storage").await.unwrap();
        ledger.adjust(&target, 1, "found one").await.unwrap();
        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(4));

        let err = ledger.adjust(&target, -10, "miscount").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(ledger.adjust(&target, 0, "noop").await.is_err());

        let history = db.inventory().history(&target).await.unwrap();
        let reasons: Vec<_> = history.iter().map(|t| t.reason).collect();
        assert_eq!(
            reasons,
            vec![
                InventoryReason::Restock,
                InventoryReason::Adjustment,
                InventoryReason::Adjustment
            ]
        );
        assert!(ledger.verify(&target).await.unwrap().is_consistent());
    }
}
