//! # Gift Card Ledger
//!
//! Redemption inside a checkout transaction, plus issuing and auditing.
//!
//! ## Redemption
//! ```text
//! find card by code ──► active & unexpired? ──► applied = clamp(balance, 0, max)
//!                                                   │
//!                             applied == 0 ─────────┤ (no write)
//!                                                   ▼
//!                     UPDATE ... WHERE balance_cents = <observed>
//!                                                   │
//!                          0 rows → Conflict        │ 1 row
//!                                                   ▼
//!                                      REDEEM ledger row
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orderly_core::gift_card::{expected_balance, Redemption};
use orderly_core::{CoreError, GiftCard, GiftCardTransaction, GiftCardTransactionKind, Money};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::gift_card::GiftCardRepository;

/// Stored balance vs the balance implied by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheck {
    pub code: String,
    pub balance: Money,
    pub expected: Money,
}

impl BalanceCheck {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.expected
    }
}

#[derive(Debug, Clone)]
pub struct GiftCardLedger {
    db: Database,
}

impl GiftCardLedger {
    pub fn new(db: Database) -> Self {
        GiftCardLedger { db }
    }

    /// Applies up to `max` of the card's balance to `order_id`.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown code
    /// - `GiftCardInactive` / `GiftCardExpired`
    /// - `Conflict` if the balance moved between read and write
    pub async fn redeem(
        conn: &mut SqliteConnection,
        code: &str,
        max: Money,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Redemption> {
        let card = GiftCardRepository::find_by_code(&mut *conn, code)
            .await?
            .ok_or_else(|| DbError::not_found("GiftCard", code))?;

        card.check_redeemable(now)?;

        let applied = card.redeemable_amount(max);
        if applied.is_zero() {
            debug!(code = %card.code, "Gift card contributes nothing");
            return Ok(Redemption {
                code: card.code,
                applied,
            });
        }

        let debited = GiftCardRepository::compare_and_debit(
            &mut *conn,
            &card.id,
            card.balance_cents,
            applied.cents(),
        )
        .await?;

        if !debited {
            warn!(code = %card.code, "Gift card balance changed during redemption");
            return Err(CoreError::Conflict(format!(
                "gift card {} balance changed concurrently",
                card.code
            ))
            .into());
        }

        GiftCardRepository::insert_transaction(
            &mut *conn,
            &GiftCardTransaction {
                id: Uuid::new_v4().to_string(),
                gift_card_id: card.id.clone(),
                kind: GiftCardTransactionKind::Redeem,
                amount_cents: applied.cents(),
                order_id: Some(order_id.to_string()),
                created_at: now,
            },
        )
        .await?;

        debug!(code = %card.code, applied = applied.cents(), order_id, "Gift card redeemed");
        Ok(Redemption {
            code: card.code,
            applied,
        })
    }

    /// Issues a new card.
    pub async fn issue(
        &self,
        code: &str,
        value: Money,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<GiftCard> {
        let card = self.db.gift_cards().insert(code, value.cents(), expires_at).await?;
        info!(code = %card.code, value = %value, "Gift card issued");
        Ok(card)
    }

    /// Recomputes the balance from the card's ledger.
    pub async fn verify(&self, code: &str) -> DbResult<BalanceCheck> {
        let mut conn = self.db.pool().acquire().await?;

        let card = GiftCardRepository::find_by_code(&mut conn, code)
            .await?
            .ok_or_else(|| DbError::not_found("GiftCard", code))?;
        let transactions = GiftCardRepository::transactions_for(&mut conn, &card.id).await?;

        Ok(BalanceCheck {
            code: card.code.clone(),
            balance: card.balance(),
            expected: expected_balance(Money::from_cents(card.initial_value_cents), &transactions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use chrono::Duration;
    use orderly_core::{ErrorKind, GiftCardStatus};

    #[tokio::test]
    async fn test_partial_redemption() {
        let db = setup().await;
        let ledger = GiftCardLedger::new(db.clone());
        ledger.issue("GC-500", Money::from_cents(500), None).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let redemption = GiftCardLedger::redeem(&mut *tx, "gc-500", Money::from_cents(10_500), "o-1", Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(redemption.applied.cents(), 500);
        assert_eq!(redemption.code, "GC-500");

        let check = ledger.verify("GC-500").await.unwrap();
        assert_eq!(check.balance, Money::zero());
        assert!(check.is_consistent());
    }

    #[tokio::test]
    async fn test_redemption_capped_by_max() {
        let db = setup().await;
        let ledger = GiftCardLedger::new(db.clone());
        ledger.issue("GC-BIG", Money::from_cents(20_000), None).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let redemption = GiftCardLedger::redeem(&mut *tx, "GC-BIG", Money::from_cents(10_500), "o-1", Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(redemption.applied.cents(), 10_500);
        let check = ledger.verify("GC-BIG").await.unwrap();
        assert_eq!(check.balance.cents(), 9_500);
        assert!(check.is_consistent());
    }

    #[tokio::test]
    async fn test_empty_card_writes_nothing() {
        let db = setup().await;
        let ledger = GiftCardLedger::new(db.clone());
        let card = ledger.issue("GC-ZERO", Money::from_cents(100), None).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        GiftCardLedger::redeem(&mut *tx, "GC-ZERO", Money::from_cents(100), "o-1", Utc::now())
            .await
            .unwrap();
        let redemption = GiftCardLedger::redeem(&mut *tx, "GC-ZERO", Money::from_cents(100), "o-2", Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(redemption.applied.is_zero());
        assert_eq!(db.gift_cards().transactions(&card.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_expired_and_unknown_cards() {
        let db = setup().await;
        let ledger = GiftCardLedger::new(db.clone());
        ledger.issue("GC-OFF", Money::from_cents(100), None).await.unwrap();
        db.gift_cards().set_status("GC-OFF", GiftCardStatus::Inactive).await.unwrap();
        ledger
            .issue("GC-OLD", Money::from_cents(100), Some(Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let now = Utc::now();

        let err = GiftCardLedger::redeem(&mut *tx, "GC-OFF", Money::from_cents(50), "o", now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::GiftCardInactive { .. })));

        let err = GiftCardLedger::redeem(&mut *tx, "GC-OLD", Money::from_cents(50), "o", now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::GiftCardExpired { .. })));

        let err = GiftCardLedger::redeem(&mut *tx, "GC-NONE", Money::from_cents(50), "o", now)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
