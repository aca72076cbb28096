//! # Gift Cards
//!
//! Stored-value codes redeemable against an order total.
//!
//! The storage side (compare-and-swap on the balance, ledger rows) lives in
//! `orderly-db`; this module decides *whether* a card may be used and *how
//! much* it covers.
//!
//! ## Redemption Rule
//! ```text
//!   unknown code ──► NotFound
//!   status != ACTIVE ──► GiftCardInactive
//!   expires_at < now ──► GiftCardExpired
//!   otherwise applied = clamp(balance, 0, max)   (max = order total so far)
//!             applied == 0 ──► no state change, no ledger row
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum GiftCardStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GiftCard {
    pub id: String,
    /// Unique, stored upper-case.
    pub code: String,
    pub initial_value_cents: i64,
    /// `0 <= balance_cents <= initial_value_cents`
    pub balance_cents: i64,
    pub status: GiftCardStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GiftCard {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Fails unless the card is active and unexpired at `now`.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != GiftCardStatus::Active {
            return Err(CoreError::GiftCardInactive {
                code: self.code.clone(),
            });
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at < now {
                return Err(CoreError::GiftCardExpired {
                    code: self.code.clone(),
                });
            }
        }
        Ok(())
    }

    /// How much of `max` this card covers.
    ///
    /// ```rust
    /// use orderly_core::gift_card::redeemable_amount;
    /// use orderly_core::Money;
    ///
    /// let applied = redeemable_amount(Money::from_cents(500), Money::from_cents(10500));
    /// assert_eq!(applied.cents(), 500);
    /// ```
    pub fn redeemable_amount(&self, max: Money) -> Money {
        redeemable_amount(self.balance(), max)
    }
}

/// `clamp(balance, 0, max)`
pub fn redeemable_amount(balance: Money, max: Money) -> Money {
    balance.clamp_to(Money::zero(), max)
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum GiftCardTransactionKind {
    /// Balance spent on an order.
    Redeem,
    /// Balance added back.
    Credit,
}

/// Append-only gift card ledger row. `amount_cents` is always positive;
/// `kind` carries the direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GiftCardTransaction {
    pub id: String,
    pub gift_card_id: String,
    pub kind: GiftCardTransactionKind,
    pub amount_cents: i64,
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Balance a card must hold given its ledger:
/// `initial - Σ redeem + Σ credit`.
pub fn expected_balance(initial: Money, transactions: &[GiftCardTransaction]) -> Money {
    transactions
        .iter()
        .fold(initial, |balance, tx| match tx.kind {
            GiftCardTransactionKind::Redeem => balance - Money::from_cents(tx.amount_cents),
            GiftCardTransactionKind::Credit => balance + Money::from_cents(tx.amount_cents),
        })
}

/// Result of applying a card to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub code: String,
    pub applied: Money,
}
