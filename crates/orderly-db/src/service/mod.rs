//! # Services
//!
//! Multi-repository operations that own a transaction.
//!
//! ```text
//! OrderService::create_order ─┐
//! LifecycleService::*         ├─► db.begin() ─► repositories(&mut *tx) ─► commit
//!                             │                                             │
//!                             └───────────── NotificationDispatcher ◄───────┘
//!                                            (post-commit, best effort)
//! ```
//!
//! [`InventoryLedger`](inventory::InventoryLedger) and
//! [`GiftCardLedger`](gift_card::GiftCardLedger) expose their mutations as
//! associated functions taking a connection, so they join the caller's
//! transaction instead of opening their own.

pub mod checkout;
pub mod gift_card;
pub mod inventory;
pub mod lifecycle;
pub mod notify;

use serde::Serialize;

use orderly_core::{NotificationIntent, Order};

use notify::DeliveryReport;

/// What a committed order operation hands back.
///
/// `notifications` were persisted in the same transaction as `order`;
/// `delivery` reports the immediate post-commit attempt. Undelivered rows
/// stay in the outbox for [`NotificationDispatcher::dispatch_pending`](notify::NotificationDispatcher::dispatch_pending).
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub order: Order,
    pub notifications: Vec<NotificationIntent>,
    pub delivery: DeliveryReport,
}

/// Result of a successful checkout.
pub type CheckoutOutcome = OrderOutcome;
