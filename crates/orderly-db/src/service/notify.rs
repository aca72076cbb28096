//! # Notification Delivery
//!
//! ```text
//!         ┌────────────────────┐
//!         │   Notifier trait   │  ◄── pluggable delivery
//!         └────────┬───────────┘
//!                  │
//!       ┌──────────┴──────────┐
//!       ▼                     ▼
//!  LogNotifier          (email, webhook, queue ...
//!  (tracing only)        supplied by the embedding app)
//! ```
//!
//! The dispatcher reads outbox rows, hands each to the notifier and records
//! the result on the row. A failed delivery never affects the order that
//! produced it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use orderly_core::{NotificationIntent, NotificationKind, OutboxEntry};

use crate::config::NotificationSettings;
use crate::error::DbResult;
use crate::pool::Database;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers one notification. Implementations must be idempotent enough to
/// tolerate a retry after a crash between delivery and bookkeeping.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), NotifyError>;
}

/// Writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), NotifyError> {
        let audience = match intent.kind {
            NotificationKind::VendorsNewOrder | NotificationKind::VendorsStatusChange => "vendors",
            NotificationKind::CustomerOrderConfirmed
            | NotificationKind::CustomerShipped
            | NotificationKind::CustomerDelivered => "customer",
        };
        info!(
            kind = ?intent.kind,
            audience,
            order_number = %intent.order_number,
            message = intent.message.as_deref().unwrap_or(""),
            "Notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    pub entry_id: String,
    pub kind: NotificationKind,
    pub error: String,
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Outbox ids delivered in this pass.
    pub delivered: Vec<String>,
    pub failed: Vec<FailedDelivery>,
    /// Rows left pending because they reached the attempt limit.
    pub exhausted: i64,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drains outbox rows through a [`Notifier`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: Database,
    notifier: Arc<dyn Notifier>,
    settings: NotificationSettings,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, settings: NotificationSettings) -> Self {
        NotificationDispatcher {
            db,
            notifier,
            settings,
        }
    }

    /// Delivers specific rows, typically the ones a transaction just committed.
    ///
    /// Never fails: errors are recorded on the rows and in the report.
    pub async fn deliver(&self, entries: &[OutboxEntry]) -> DeliveryReport {
        let outbox = self.db.outbox();
        let mut report = DeliveryReport::default();

        for entry in entries {
            let result = match serde_json::from_str::<NotificationIntent>(&entry.payload) {
                Ok(intent) => self.notifier.notify(&intent).await,
                Err(e) => Err(NotifyError(format!("unreadable payload: {}", e))),
            };

            let bookkeeping = match &result {
                Ok(()) => outbox.mark_delivered(&entry.id).await,
                Err(e) => {
                    warn!(id = %entry.id, kind = ?entry.kind, error = %e, "Notification failed");
                    outbox.mark_failed(&entry.id, &e.0).await
                }
            };
            if let Err(e) = bookkeeping {
                error!(id = %entry.id, error = %e, "Failed to record notification outcome");
            }

            match result {
                Ok(()) => report.delivered.push(entry.id.clone()),
                Err(e) => report.failed.push(FailedDelivery {
                    entry_id: entry.id.clone(),
                    kind: entry.kind,
                    error: e.0,
                }),
            }
        }

        report
    }

    /// One pass over pending rows (retry path).
    pub async fn dispatch_pending(&self) -> DbResult<DeliveryReport> {
        let outbox = self.db.outbox();

        let exhausted = outbox.count_exhausted(self.settings.max_attempts).await?;
        if exhausted > 0 {
            warn!(
                exhausted,
                max_attempts = self.settings.max_attempts,
                "Notifications exceeded the attempt limit and are no longer retried"
            );
        }

        let pending = outbox
            .get_pending(self.settings.batch_size, self.settings.max_attempts)
            .await?;
        if pending.is_empty() {
            return Ok(DeliveryReport {
                exhausted,
                ..DeliveryReport::default()
            });
        }

        info!(count = pending.len(), "Dispatching pending notifications");
        let mut report = self.deliver(&pending).await;
        report.exhausted = exhausted;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::outbox::OutboxRepository;
    use crate::test_support::{setup, FailingNotifier, RecordingNotifier};
    use chrono::Utc;

    fn intent(kind: NotificationKind) -> NotificationIntent {
        NotificationIntent {
            kind,
            order_id: "order-1".into(),
            order_number: "ORD-1".into(),
            message: None,
        }
    }

    async fn enqueue(db: &Database, kind: NotificationKind) -> OutboxEntry {
        let mut conn = db.pool().acquire().await.unwrap();
        OutboxRepository::enqueue(&mut conn, &intent(kind), Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_deliver_marks_rows() {
        let db = setup().await;
        let entry = enqueue(&db, NotificationKind::VendorsNewOrder).await;

        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher =
            NotificationDispatcher::new(db.clone(), notifier.clone(), NotificationSettings::default());

        let report = dispatcher.deliver(&[entry.clone()]).await;
        assert_eq!(report.delivered, vec![entry.id.clone()]);
        assert!(report.is_clean());
        assert_eq!(notifier.kinds(), vec![NotificationKind::VendorsNewOrder]);

        let row = db.outbox().get_by_id(&entry.id).await.unwrap().unwrap();
        assert!(row.delivered_at.is_some());
        assert_eq!(row.attempts, 1);
    }

    #[tokio::test]
    async fn test_failures_are_retried_until_limit() {
        let db = setup().await;
        enqueue(&db, NotificationKind::CustomerShipped).await;

        let settings = NotificationSettings {
            batch_size: 10,
            max_attempts: 2,
        };
        let failing = NotificationDispatcher::new(db.clone(), Arc::new(FailingNotifier), settings.clone());

        let first = failing.dispatch_pending().await.unwrap();
        assert_eq!(first.failed.len(), 1);
        let second = failing.dispatch_pending().await.unwrap();
        assert_eq!(second.failed.len(), 1);

        // limit reached: skipped, reported, still pending
        let third = failing.dispatch_pending().await.unwrap();
        assert!(third.failed.is_empty());
        assert_eq!(third.exhausted, 1);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_recovery() {
        let db = setup().await;
        enqueue(&db, NotificationKind::CustomerDelivered).await;

        let failing = NotificationDispatcher::new(
            db.clone(),
            Arc::new(FailingNotifier),
            NotificationSettings::default(),
        );
        failing.dispatch_pending().await.unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let working =
            NotificationDispatcher::new(db.clone(), notifier.clone(), NotificationSettings::default());
        let report = working.dispatch_pending().await.unwrap();

        assert_eq!(report.delivered.len(), 1);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }
}
