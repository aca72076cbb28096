//! # Order Repository
//!
//! Orders and every row an order owns.
//!
//! ## Ownership
//! ```text
//! orders
//!   ├── order_items
//!   ├── order_discounts
//!   │     └── order_discount_items ──► order_items
//!   ├── order_events          (append-only)
//!   ├── order_cancellations   (at most one)
//!   └── order_payments
//! ```
//!
//! Status and payment updates are compare-and-set on the previous value so a
//! concurrent transition cannot be silently overwritten.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use orderly_core::{
    Address, Order, OrderCancellation, OrderDiscount, OrderDiscountItem, OrderEvent, OrderItem,
    OrderPayment, OrderStatus, PaymentStatus,
};

use crate::error::DbResult;

/// Result of re-checking a stored order's money invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsCheck {
    /// `total = subtotal + shipping + vat - discount - gift_card`, `total >= 0`.
    pub total_matches: bool,
    /// `discount_cents = Σ order_discounts.amount_cents`.
    pub discounts_match: bool,
    /// Every discount's allocation rows sum to its amount.
    pub allocations_match: bool,
}

impl TotalsCheck {
    pub fn is_consistent(&self) -> bool {
        self.total_matches && self.discounts_match && self.allocations_match
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes (transaction)
    // =========================================================================

    /// Inserts the order row.
    ///
    /// A duplicate `order_number` surfaces as `UniqueViolation` on
    /// `orders.order_number`; SQLite aborts only this statement, so the
    /// caller may retry with a fresh number inside the same transaction.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, email, status, payment_status,
                subtotal_cents, shipping_cents, vat_rate_bps, vat_cents,
                discount_cents, gift_card_code, gift_card_amount_cents, total_cents,
                shipping_address, billing_address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(&order.email)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.shipping_cents)
        .bind(order.vat_rate_bps)
        .bind(order.vat_cents)
        .bind(order.discount_cents)
        .bind(&order.gift_card_code)
        .bind(order.gift_card_amount_cents)
        .bind(order.total_cents)
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the discount and gift card portion of the totals.
    pub async fn update_totals(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE orders SET
                discount_cents = ?2,
                gift_card_code = ?3,
                gift_card_amount_cents = ?4,
                total_cents = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(order.discount_cents)
        .bind(&order.gift_card_code)
        .bind(order.gift_card_amount_cents)
        .bind(order.total_cents)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Moves `status` from `expected` to `next`. `false` if it was no longer `expected`.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(order_id)
        .bind(expected)
        .bind(next)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_payment_status(
        conn: &mut SqliteConnection,
        order_id: &str,
        expected: PaymentStatus,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = ?3, updated_at = ?4 WHERE id = ?1 AND payment_status = ?2",
        )
        .bind(order_id)
        .bind(expected)
        .bind(next)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_addresses(
        conn: &mut SqliteConnection,
        order_id: &str,
        shipping: &Address,
        billing: &Address,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE orders SET shipping_address = ?2, billing_address = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(order_id)
        .bind(Json(shipping))
        .bind(Json(billing))
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, source_kind, variant_id, product_id, vendor_id,
                sku_snapshot, title_snapshot, attributes_snapshot,
                unit_price_cents, quantity, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(item.source_kind)
        .bind(&item.variant_id)
        .bind(&item.product_id)
        .bind(&item.vendor_id)
        .bind(&item.sku_snapshot)
        .bind(&item.title_snapshot)
        .bind(Json(&item.attributes_snapshot))
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Inserts a discount row and its per-item allocations.
    pub async fn insert_discount(conn: &mut SqliteConnection, discount: &OrderDiscount) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_discounts (id, order_id, discount_id, code, description, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.order_id)
        .bind(&discount.discount_id)
        .bind(&discount.code)
        .bind(&discount.description)
        .bind(discount.amount_cents)
        .bind(discount.created_at)
        .execute(&mut *conn)
        .await?;

        for item in &discount.items {
            sqlx::query(
                r#"
                INSERT INTO order_discount_items (id, order_discount_id, order_item_id, amount_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_discount_id)
            .bind(&item.order_item_id)
            .bind(item.amount_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn insert_event(conn: &mut SqliteConnection, event: &OrderEvent) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_events (id, order_id, status, payment_status, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&event.id)
        .bind(&event.order_id)
        .bind(event.status)
        .bind(event.payment_status)
        .bind(&event.description)
        .bind(event.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn insert_cancellation(
        conn: &mut SqliteConnection,
        cancellation: &OrderCancellation,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_cancellations (id, order_id, reason, cancelled_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&cancellation.id)
        .bind(&cancellation.order_id)
        .bind(&cancellation.reason)
        .bind(&cancellation.cancelled_by)
        .bind(cancellation.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &OrderPayment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_payments (id, order_id, amount_cents, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Removes the order and everything it owns.
    ///
    /// Ledger rows (inventory, gift card) and outbox rows are kept.
    pub async fn delete(conn: &mut SqliteConnection, order_id: &str) -> DbResult<bool> {
        sqlx::query(
            r#"
            DELETE FROM order_discount_items
            WHERE order_discount_id IN (SELECT id FROM order_discounts WHERE order_id = ?1)
            "#,
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        for table in [
            "order_discounts",
            "order_items",
            "order_events",
            "order_cancellations",
            "order_payments",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE order_id = ?1", table))
                .bind(order_id)
                .execute(&mut *conn)
                .await?;
        }

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Reads (transaction)
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    pub async fn find_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }

    pub async fn find_discounts(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderDiscount>> {
        let mut discounts = sqlx::query_as::<_, OrderDiscount>(
            "SELECT * FROM order_discounts WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        for discount in &mut discounts {
            discount.items = sqlx::query_as::<_, OrderDiscountItem>(
                "SELECT * FROM order_discount_items WHERE order_discount_id = ?1 ORDER BY rowid",
            )
            .bind(&discount.id)
            .fetch_all(&mut *conn)
            .await?;
        }

        Ok(discounts)
    }

    // =========================================================================
    // Reads (pool)
    // =========================================================================

    pub async fn get_by_id(&self, order_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, order_id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_items(&mut conn, order_id).await
    }

    /// Discounts with their allocations loaded.
    pub async fn discounts(&self, order_id: &str) -> DbResult<Vec<OrderDiscount>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_discounts(&mut conn, order_id).await
    }

    /// Event history, oldest first.
    pub async fn events(&self, order_id: &str) -> DbResult<Vec<OrderEvent>> {
        let events = sqlx::query_as::<_, OrderEvent>(
            "SELECT * FROM order_events WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn cancellation(&self, order_id: &str) -> DbResult<Option<OrderCancellation>> {
        let cancellation = sqlx::query_as::<_, OrderCancellation>(
            "SELECT * FROM order_cancellations WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cancellation)
    }

    pub async fn payments(&self, order_id: &str) -> DbResult<Vec<OrderPayment>> {
        let payments = sqlx::query_as::<_, OrderPayment>(
            "SELECT * FROM order_payments WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Most recent first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(customer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Re-derives the stored totals. `None` if the order does not exist.
    pub async fn verify_totals(&self, order_id: &str) -> DbResult<Option<TotalsCheck>> {
        let mut conn = self.pool.acquire().await?;

        let Some(order) = Self::find(&mut conn, order_id).await? else {
            return Ok(None);
        };
        let discounts = Self::find_discounts(&mut conn, order_id).await?;

        let discount_sum: i64 = discounts.iter().map(|d| d.amount_cents).sum();
        let allocations_match = discounts
            .iter()
            .all(|d| d.items.iter().map(|i| i.amount_cents).sum::<i64>() == d.amount_cents);

        Ok(Some(TotalsCheck {
            total_matches: order.totals_consistent(),
            discounts_match: discount_sum == order.discount_cents,
            allocations_match,
        }))
    }
}
