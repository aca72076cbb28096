//! # Discount Engine
//!
//! Selects the discounts that apply to a checkout, computes how much each one
//! takes off, and splits every amount across the line items it covers.
//!
//! ## Evaluation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DiscountEngine::evaluate                           │
//! │                                                                         │
//! │  discounts (store order) ──► for each, in order:                       │
//! │                                                                         │
//! │   1. eligible?  active • AUTOMATIC or code matches • inside window     │
//! │                 • subtotal >= min purchase                             │
//! │   2. raw amount by type (see table)                                    │
//! │   3. clamp to [0, subtotal] and to the remaining headroom              │
//! │   4. zero? drop it. otherwise accumulate and allocate to lines         │
//! │                                                                         │
//! │  Every eligible discount applies; there is no "best of" selection.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Type              | Raw amount                                          |
//! |-------------------|-----------------------------------------------------|
//! | `OrderAmount`     | `min(amount, subtotal - applied_so_far)`            |
//! | `OrderPercent`    | `floor(subtotal * pct / 100)`                       |
//! | `FreeShipping`    | `shipping`                                          |
//! | `ProductAmount`   | Σ matching `min(amount * qty, line_total)`          |
//! | `ProductPercent`  | Σ matching `floor(line_total * pct / 100)`          |
//! | `BuyXGetY`        | `floor(qty / X) * Y * cheapest matching unit price` |
//!
//! The engine holds no state: identical inputs give identical output.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::LineItem;

// =============================================================================
// Discount Definition
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountMethod {
    /// Applies without a code.
    Automatic,
    /// Applies only when the checkout supplies the matching code.
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    OrderAmount,
    OrderPercent,
    FreeShipping,
    ProductAmount,
    ProductPercent,
    BuyXGetY,
}

impl DiscountType {
    /// Product-scoped types only look at matching line items.
    pub fn is_product_scoped(&self) -> bool {
        matches!(
            self,
            DiscountType::ProductAmount | DiscountType::ProductPercent | DiscountType::BuyXGetY
        )
    }
}

/// A promotion as owned by the catalog admin. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: String,
    pub title: String,
    /// Stored upper-case; see [`normalize_code`].
    pub code: Option<String>,
    pub method: DiscountMethod,
    pub discount_type: DiscountType,
    pub amount_cents: Option<i64>,
    /// Whole percent, 1..=100.
    pub percent: Option<i64>,
    pub buy_x_quantity: Option<i64>,
    pub get_y_quantity: Option<i64>,
    pub min_purchase_amount_cents: Option<i64>,
    pub applies_to_all_products: bool,
    pub product_ids: BTreeSet<String>,
    pub collection_ids: BTreeSet<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Canonical form for discount codes: trimmed, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// collection id → product ids in that collection.
pub type CollectionIndex = BTreeMap<String, BTreeSet<String>>;

impl Discount {
    /// Whether the supplied checkout code unlocks this discount.
    pub fn code_matches(&self, input_code: Option<&str>) -> bool {
        match self.method {
            DiscountMethod::Automatic => true,
            DiscountMethod::Code => match (&self.code, input_code) {
                (Some(own), Some(input)) => normalize_code(own) == normalize_code(input),
                _ => false,
            },
        }
    }

    /// Open bounds are unbounded.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        let started = self.starts_at.map_or(true, |starts| starts <= now);
        let not_ended = self.ends_at.map_or(true, |ends| now <= ends);
        started && not_ended
    }

    /// Full selection rule.
    pub fn is_eligible(&self, now: DateTime<Utc>, input_code: Option<&str>, subtotal: Money) -> bool {
        if !self.is_active || !self.code_matches(input_code) || !self.in_window(now) {
            return false;
        }
        match self.min_purchase_amount_cents {
            Some(min) => subtotal.cents() >= min,
            None => true,
        }
    }

    /// Whether a line item falls under this discount's product scope.
    pub fn matches_item(&self, item: &LineItem, collections: &CollectionIndex) -> bool {
        if self.applies_to_all_products || self.product_ids.contains(&item.product_id) {
            return true;
        }
        self.collection_ids.iter().any(|collection_id| {
            collections
                .get(collection_id)
                .is_some_and(|products| products.contains(&item.product_id))
        })
    }

    /// Description recorded on the order.
    pub fn describe(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        let amount = Money::from_cents(self.amount_cents.unwrap_or(0));
        let percent = self.percent.unwrap_or(0);
        match self.discount_type {
            DiscountType::OrderAmount => format!("{} off order", amount),
            DiscountType::OrderPercent => format!("{}% off order", percent),
            DiscountType::FreeShipping => "Free shipping".to_string(),
            DiscountType::ProductAmount => format!("{} off selected products", amount),
            DiscountType::ProductPercent => format!("{}% off selected products", percent),
            DiscountType::BuyXGetY => format!(
                "Buy {} get {}",
                self.buy_x_quantity.unwrap_or(0),
                self.get_y_quantity.unwrap_or(0)
            ),
        }
    }
}

// =============================================================================
// Engine Output
// =============================================================================

/// A discount's share on one line item, by index into the evaluated items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    pub line_index: usize,
    pub amount: Money,
}

/// A discount that contributed a non-zero amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub discount_id: String,
    pub code: Option<String>,
    pub description: String,
    pub amount: Money,
    /// Sums to `amount` exactly.
    pub allocations: Vec<LineAllocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountOutcome {
    pub total: Money,
    pub applied: Vec<AppliedDiscount>,
}

/// Inputs that vary per checkout.
#[derive(Debug, Clone, Copy)]
pub struct DiscountInput<'a> {
    pub items: &'a [LineItem],
    pub subtotal: Money,
    pub shipping: Money,
    pub code: Option<&'a str>,
    pub now: DateTime<Utc>,
}

// =============================================================================
// Engine
// =============================================================================

/// Stateless evaluator over a collection-membership snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DiscountEngine<'a> {
    collections: &'a CollectionIndex,
}

impl<'a> DiscountEngine<'a> {
    pub fn new(collections: &'a CollectionIndex) -> Self {
        DiscountEngine { collections }
    }

    /// Evaluates `discounts` in the given order and accumulates every
    /// eligible, non-zero amount.
    ///
    /// ## Caps
    /// Each amount is clamped to `[0, subtotal]` and to what is left of
    /// `subtotal + shipping` after earlier discounts, so the order total can
    /// never go negative.
    pub fn evaluate(&self, discounts: &[Discount], input: DiscountInput<'_>) -> DiscountOutcome {
        let mut outcome = DiscountOutcome::default();
        let ceiling = input.subtotal + input.shipping;

        for discount in discounts {
            if !discount.is_eligible(input.now, input.code, input.subtotal) {
                continue;
            }

            let eligible = self.eligible_lines(discount, input.items);
            let raw = self.raw_amount(discount, &input, &eligible, outcome.total);
            let headroom = ceiling.saturating_sub(outcome.total);
            let amount = raw
                .clamp_to(Money::zero(), input.subtotal)
                .clamp_to(Money::zero(), headroom);

            if !amount.is_positive() {
                continue;
            }

            let allocations = allocate(amount, input.items, &eligible);
            outcome.total += amount;
            outcome.applied.push(AppliedDiscount {
                discount_id: discount.id.clone(),
                code: discount.code.clone(),
                description: discount.describe(),
                amount,
                allocations,
            });
        }

        outcome
    }

    /// Indexes of the lines a discount covers.
    fn eligible_lines(&self, discount: &Discount, items: &[LineItem]) -> Vec<usize> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                !discount.discount_type.is_product_scoped()
                    || discount.matches_item(item, self.collections)
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn raw_amount(
        &self,
        discount: &Discount,
        input: &DiscountInput<'_>,
        eligible: &[usize],
        applied_so_far: Money,
    ) -> Money {
        let amount = Money::from_cents(discount.amount_cents.unwrap_or(0));
        let percent = discount.percent.unwrap_or(0);
        let matching = eligible.iter().map(|&index| &input.items[index]);

        match discount.discount_type {
            DiscountType::OrderAmount => amount.min(input.subtotal.saturating_sub(applied_so_far)),
            DiscountType::OrderPercent => input.subtotal.percent_floor(percent),
            DiscountType::FreeShipping => input.shipping,
            DiscountType::ProductAmount => matching
                .map(|item| (amount * item.quantity).min(item.line_total()))
                .sum::<Money>(),
            DiscountType::ProductPercent => matching
                .map(|item| item.line_total().percent_floor(percent))
                .sum::<Money>(),
            DiscountType::BuyXGetY => {
                let buy_x = discount.buy_x_quantity.unwrap_or(0);
                let get_y = discount.get_y_quantity.unwrap_or(0);
                let cheapest = matching.clone().map(LineItem::unit_price).min();
                match cheapest {
                    Some(unit) if buy_x > 0 => {
                        let eligible_qty: i64 = matching.map(|item| item.quantity).sum();
                        let free_qty = (eligible_qty / buy_x) * get_y;
                        unit * free_qty
                    }
                    _ => Money::zero(),
                }
            }
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Splits `amount` across the `eligible` lines in proportion to line totals.
///
/// Each share is `floor(line_total * amount / matched_total)`; the cents lost
/// to flooring go to the first entry, so the shares always sum to `amount`.
/// When every eligible line is free, the whole amount lands on the first one.
pub fn allocate(amount: Money, items: &[LineItem], eligible: &[usize]) -> Vec<LineAllocation> {
    let matched_total: Money = eligible.iter().map(|&index| items[index].line_total()).sum();

    let mut allocations: Vec<LineAllocation> = eligible
        .iter()
        .map(|&index| LineAllocation {
            line_index: index,
            amount: amount.share_floor(items[index].line_total(), matched_total),
        })
        .collect();

    let allocated: Money = allocations.iter().map(|a| a.amount).sum();
    if let Some(first) = allocations.first_mut() {
        first.amount += amount - allocated;
    }

    allocations
}

// =============================================================================
// Unit Tests
// =============================================================================
