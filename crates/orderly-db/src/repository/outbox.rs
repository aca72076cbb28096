//! # Notification Outbox Repository
//!
//! Durable queue of notifications owed to vendors and customers.
//!
//! ## Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Notification Outbox                               │
//! │                                                                         │
//! │  1. Business change + outbox row commit in ONE transaction             │
//! │     BEGIN;                                                              │
//! │     INSERT INTO orders ...;                                             │
//! │     INSERT INTO notification_outbox ...;                                │
//! │     COMMIT;                                                             │
//! │                                                                         │
//! │  2. After commit the dispatcher delivers pending rows                  │
//! │     SELECT * FROM notification_outbox WHERE delivered_at IS NULL ...   │
//! │                                                                         │
//! │  3. Each row is marked delivered, or failed with attempts + 1          │
//! │                                                                         │
//! │  A crash between 1 and 3 loses nothing: the row is still pending.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use orderly_core::{NotificationIntent, OutboxEntry};

use crate::error::DbResult;

/// Repository for the notification outbox.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues an intent inside the caller's transaction.
    pub async fn enqueue(
        conn: &mut SqliteConnection,
        intent: &NotificationIntent,
        now: DateTime<Utc>,
    ) -> DbResult<OutboxEntry> {
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            kind: intent.kind,
            order_id: intent.order_id.clone(),
            payload: serde_json::to_string(intent)?,
            attempts: 0,
            last_error: None,
            created_at: now,
            attempted_at: None,
            delivered_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (id, kind, order_id, payload, attempts, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.kind)
        .bind(&entry.order_id)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %entry.id, kind = ?entry.kind, order_id = %entry.order_id, "Queued notification");
        Ok(entry)
    }

    /// Undelivered rows still under the attempt limit, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: i64) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT * FROM notification_outbox
            WHERE delivered_at IS NULL AND attempts < ?2
            ORDER BY created_at, rowid
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let entry = sqlx::query_as::<_, OutboxEntry>("SELECT * FROM notification_outbox WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            "SELECT * FROM notification_outbox WHERE order_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET delivered_at = ?2, attempted_at = ?2, attempts = attempts + 1, last_error = NULL
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1, last_error = ?2, attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Undelivered rows that hit the attempt limit and are no longer retried.
    pub async fn count_exhausted(&self, max_attempts: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL AND attempts >= ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Deletes delivered rows older than `days_old` days.
    pub async fn cleanup_delivered(&self, days_old: i64) -> DbResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days_old);
        let result = sqlx::query(
            "DELETE FROM notification_outbox WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use orderly_core::NotificationKind;

    fn intent() -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::VendorsNewOrder,
            order_id: "order-1".into(),
            order_number: "ORD-1".into(),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_deliver() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let entry = OutboxRepository::enqueue(&mut conn, &intent(), Utc::now())
            .await
            .unwrap();
        drop(conn);

        let parsed: NotificationIntent = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(parsed, intent());

        let outbox = db.outbox();
        assert_eq!(outbox.count_pending().await.unwrap(), 1);

        outbox.mark_delivered(&entry.id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
        assert!(outbox.get_pending(10, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rows_stop_after_max_attempts() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let entry = OutboxRepository::enqueue(&mut conn, &intent(), Utc::now())
            .await
            .unwrap();
        drop(conn);

        let outbox = db.outbox();
        outbox.mark_failed(&entry.id, "smtp down").await.unwrap();
        outbox.mark_failed(&entry.id, "smtp down").await.unwrap();

        let reloaded = outbox.get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(reloaded.attempts, 2);
        assert_eq!(reloaded.last_error.as_deref(), Some("smtp down"));

        assert_eq!(outbox.get_pending(10, 3).await.unwrap().len(), 1);
        assert!(outbox.get_pending(10, 2).await.unwrap().is_empty());
        assert_eq!(outbox.count_exhausted(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_old_delivered_rows() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let delivered = OutboxRepository::enqueue(&mut conn, &intent(), Utc::now())
            .await
            .unwrap();
        let pending = OutboxRepository::enqueue(&mut conn, &intent(), Utc::now())
            .await
            .unwrap();
        drop(conn);

        let outbox = db.outbox();
        outbox.mark_delivered(&delivered.id).await.unwrap();

        assert_eq!(outbox.cleanup_delivered(30).await.unwrap(), 0);
        assert_eq!(outbox.cleanup_delivered(0).await.unwrap(), 1);

        assert!(outbox.get_by_id(&delivered.id).await.unwrap().is_none());
        assert!(outbox.get_by_id(&pending.id).await.unwrap().is_some());
        assert_eq!(outbox.for_order("order-1").await.unwrap().len(), 1);
    }
}
