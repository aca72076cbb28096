//! # Order Lifecycle
//!
//! Post-creation mutations. Each one runs in its own transaction, appends
//! an event, and commits before any notification is attempted.
//!
//! ## Status Machine
//! ```text
//! pending ──► processing ──► shipped ──► fulfilled
//!    │            │             │
//!    └────────────┴─────────────┴──► cancelled   (restores stock)
//! ```
//!
//! ## Compensation
//! Cancelling returns every item's quantity to the counter it came from, as
//! RETURN ledger rows tied to the order. Gift card redemptions are not
//! reversed. Hard-deleting a live order restores stock the same way; a
//! cancelled order was already restored and is deleted as-is.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use orderly_core::lifecycle::{
    check_payment_transition, check_transition, payment_description, status_description,
    status_notifications,
};
use orderly_core::validation::validate_country;
use orderly_core::{
    Address, CoreError, InventoryReason, NotificationIntent, NotificationKind, Order,
    OrderCancellation, OrderEvent, OrderPayment, OrderStatus, PaymentStatus,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::order::OrderRepository;
use crate::repository::outbox::OutboxRepository;
use crate::service::inventory::InventoryLedger;
use crate::service::notify::{DeliveryReport, NotificationDispatcher};
use crate::service::OrderOutcome;

/// What a hard delete removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedOrder {
    pub order_id: String,
    pub order_number: String,
    /// Units returned to stock by the delete itself.
    pub restored_units: i64,
}

#[derive(Debug, Clone)]
pub struct LifecycleService {
    db: Database,
    dispatcher: NotificationDispatcher,
}

async fn load(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    OrderRepository::find(&mut *conn, order_id)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

async fn append_event(
    conn: &mut SqliteConnection,
    order: &Order,
    description: impl Into<String>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    OrderRepository::insert_event(
        &mut *conn,
        &OrderEvent {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            status: order.status,
            payment_status: order.payment_status,
            description: description.into(),
            created_at: now,
        },
    )
    .await
}

/// Returns each item's quantity to stock. Returns the number of units moved.
async fn restore_stock(conn: &mut SqliteConnection, order_id: &str, notes: &str) -> DbResult<i64> {
    let items = OrderRepository::find_items(&mut *conn, order_id).await?;
    let mut restored = 0;
    for item in &items {
        InventoryLedger::increment(
            &mut *conn,
            &item.stock_target(),
            item.quantity,
            InventoryReason::Return,
            Some(order_id),
            Some(notes),
        )
        .await?;
        restored += item.quantity;
    }
    Ok(restored)
}

fn status_message(order: &Order) -> String {
    format!("Order {} is now {}", order.order_number, order.status)
}

impl LifecycleService {
    pub fn new(db: Database, dispatcher: NotificationDispatcher) -> Self {
        LifecycleService { db, dispatcher }
    }

    /// Moves an order one step forward: pending → processing → shipped → fulfilled.
    ///
    /// Cancellation needs a reason and an actor; use [`Self::cancel`].
    #[instrument(skip(self))]
    pub async fn transition(&self, order_id: &str, to: OrderStatus) -> DbResult<OrderOutcome> {
        if to == OrderStatus::Cancelled {
            return Err(CoreError::InvalidInput(
                "cancellation requires a reason; use cancel".to_string(),
            )
            .into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = load(&mut *tx, order_id).await?;
        let from = order.status;
        check_transition(&order.id, from, to)?;

        if !OrderRepository::update_status(&mut *tx, &order.id, from, to, now).await? {
            return Err(DbError::conflict(format!("order {} changed concurrently", order.id)));
        }
        order.status = to;
        order.updated_at = now;

        append_event(&mut *tx, &order, status_description(to), now).await?;

        let notifications: Vec<NotificationIntent> = status_notifications(to)
            .into_iter()
            .map(|kind| match kind {
                NotificationKind::VendorsStatusChange => {
                    NotificationIntent::new(kind, &order).with_message(status_message(&order))
                }
                _ => NotificationIntent::new(kind, &order),
            })
            .collect();
        let mut entries = Vec::with_capacity(notifications.len());
        for intent in &notifications {
            entries.push(OutboxRepository::enqueue(&mut *tx, intent, now).await?);
        }

        tx.commit().await?;
        info!(order_number = %order.order_number, %from, %to, "Order status changed");

        let delivery = self.dispatcher.deliver(&entries).await;
        Ok(OrderOutcome {
            order,
            notifications,
            delivery,
        })
    }

    /// Cancels a non-terminal order and puts its stock back.
    #[instrument(skip(self, reason))]
    pub async fn cancel(&self, order_id: &str, reason: &str, cancelled_by: &str) -> DbResult<OrderOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::InvalidInput("cancellation reason is required".to_string()).into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = load(&mut *tx, order_id).await?;
        let from = order.status;
        check_transition(&order.id, from, OrderStatus::Cancelled)?;

        if !OrderRepository::update_status(&mut *tx, &order.id, from, OrderStatus::Cancelled, now).await? {
            return Err(DbError::conflict(format!("order {} changed concurrently", order.id)));
        }
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;

        let restored = restore_stock(&mut *tx, &order.id, "Order cancelled").await?;

        OrderRepository::insert_cancellation(
            &mut *tx,
            &OrderCancellation {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                reason: reason.to_string(),
                cancelled_by: cancelled_by.to_string(),
                created_at: now,
            },
        )
        .await?;

        append_event(&mut *tx, &order, format!("Order cancelled: {}", reason), now).await?;

        let notifications = vec![NotificationIntent::new(NotificationKind::VendorsStatusChange, &order)
            .with_message(status_message(&order))];
        let mut entries = Vec::with_capacity(notifications.len());
        for intent in &notifications {
            entries.push(OutboxRepository::enqueue(&mut *tx, intent, now).await?);
        }

        tx.commit().await?;
        info!(order_number = %order.order_number, %from, restored, cancelled_by, "Order cancelled");

        let delivery = self.dispatcher.deliver(&entries).await;
        Ok(OrderOutcome {
            order,
            notifications,
            delivery,
        })
    }

    /// Records a payment status change. Entering `Paid` writes an
    /// `order_payments` row for the order total.
    #[instrument(skip(self))]
    pub async fn set_payment_status(
        &self,
        order_id: &str,
        to: PaymentStatus,
        reference: Option<&str>,
    ) -> DbResult<Order> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = load(&mut *tx, order_id).await?;
        let from = order.payment_status;
        check_payment_transition(&order.id, from, to)?;

        if !OrderRepository::update_payment_status(&mut *tx, &order.id, from, to, now).await? {
            return Err(DbError::conflict(format!("order {} changed concurrently", order.id)));
        }
        order.payment_status = to;
        order.updated_at = now;

        if to == PaymentStatus::Paid {
            OrderRepository::insert_payment(
                &mut *tx,
                &OrderPayment {
                    id: Uuid::new_v4().to_string(),
                    order_id: order.id.clone(),
                    amount_cents: order.total_cents,
                    reference: reference.map(str::to_string),
                    created_at: now,
                },
            )
            .await?;
        }

        append_event(&mut *tx, &order, payment_description(to), now).await?;

        tx.commit().await?;
        info!(order_number = %order.order_number, %from, %to, "Payment status changed");
        Ok(order)
    }

    /// Corrects addresses while the order has not shipped.
    ///
    /// `billing = None` keeps the current billing address. Totals are not
    /// recomputed; the VAT rate stays the one fixed at checkout.
    pub async fn update_addresses(
        &self,
        order_id: &str,
        shipping: Address,
        billing: Option<Address>,
    ) -> DbResult<Order> {
        validate_country(&shipping.country)?;
        if let Some(billing) = &billing {
            validate_country(&billing.country)?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = load(&mut *tx, order_id).await?;
        if !order.status.allows_address_change() {
            return Err(CoreError::InvalidInput(format!(
                "addresses cannot change once an order is {}",
                order.status
            ))
            .into());
        }

        order.shipping_address = shipping;
        if let Some(billing) = billing {
            order.billing_address = billing;
        }
        order.updated_at = now;

        OrderRepository::update_addresses(
            &mut *tx,
            &order.id,
            &order.shipping_address,
            &order.billing_address,
            now,
        )
        .await?;
        append_event(&mut *tx, &order, "Addresses updated", now).await?;

        tx.commit().await?;
        info!(order_number = %order.order_number, "Order addresses updated");
        Ok(order)
    }

    /// Removes an order and everything it owns.
    ///
    /// Ledger and outbox rows survive the delete.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: &str, deleted_by: &str) -> DbResult<DeletedOrder> {
        let mut tx = self.db.begin().await?;

        let order = load(&mut *tx, order_id).await?;
        let restored_units = if order.status == OrderStatus::Cancelled {
            0
        } else {
            restore_stock(&mut *tx, &order.id, "Order deleted").await?
        };

        OrderRepository::delete(&mut *tx, &order.id).await?;
        tx.commit().await?;

        info!(order_number = %order.order_number, restored_units, deleted_by, "Order deleted");
        Ok(DeletedOrder {
            order_id: order.id,
            order_number: order.order_number,
            restored_units,
        })
    }

    /// Retries every pending notification once.
    pub async fn flush_notifications(&self) -> DbResult<DeliveryReport> {
        self.dispatcher.dispatch_pending().await
    }
}
