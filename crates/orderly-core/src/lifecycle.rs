//! # Order Lifecycle
//!
//! State machine for order status and payment status.
//!
//! ## Order Status
//! ```text
//!   PENDING ──► PROCESSING ──► SHIPPED ──► FULFILLED
//!      │             │            │
//!      └─────────────┴────────────┴──────► CANCELLED
//!
//!   FULFILLED and CANCELLED are terminal.
//! ```
//!
//! ## Payment Status
//! ```text
//!   INITIATED ──► PAID ──► REFUNDED
//!       │          ▲
//!       ▼          │
//!     FAILED ──────┘
//! ```
//!
//! Storage-side effects (events, stock reversal, cancellation rows) are the
//! lifecycle service's job in `orderly-db`; this module only answers
//! "is this move legal" and "who must be told".

use crate::error::{CoreError, CoreResult};
use crate::types::{NotificationKind, OrderStatus, PaymentStatus};

impl OrderStatus {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    /// Addresses may be corrected until the parcel leaves.
    pub fn allows_address_change(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}

/// Whether `from → to` is a legal status move.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Processing) | (Processing, Shipped) | (Shipped, Fulfilled) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

pub fn check_transition(order_id: &str, from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Whether `from → to` is a legal payment move.
pub fn can_transition_payment(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Initiated, Paid) | (Initiated, Failed) | (Failed, Paid) | (Paid, Refunded)
    )
}

pub fn check_payment_transition(
    order_id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> CoreResult<()> {
    if can_transition_payment(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from: format!("payment {}", from),
            to: format!("payment {}", to),
        })
    }
}

/// Notifications owed after the order enters `status`.
pub fn status_notifications(status: OrderStatus) -> Vec<NotificationKind> {
    let mut kinds = vec![NotificationKind::VendorsStatusChange];
    match status {
        OrderStatus::Shipped => kinds.push(NotificationKind::CustomerShipped),
        OrderStatus::Fulfilled => kinds.push(NotificationKind::CustomerDelivered),
        _ => {}
    }
    kinds
}

/// Event log text for entering `status`.
pub fn status_description(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Order created",
        OrderStatus::Processing => "Order is being processed",
        OrderStatus::Shipped => "Order shipped",
        OrderStatus::Fulfilled => "Order delivered",
        OrderStatus::Cancelled => "Order cancelled",
    }
}

pub fn payment_description(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Initiated => "Payment initiated",
        PaymentStatus::Paid => "Payment received",
        PaymentStatus::Failed => "Payment failed",
        PaymentStatus::Refunded => "Payment refunded",
    }
}
