//! # Order Totals
//!
//! Running total for a checkout.
//!
//! ```text
//!   subtotal = Σ line_total
//!   vat      = round_half_up(subtotal × rate)
//!   total    = subtotal + shipping + vat
//!            - discount          (engine output)
//!            - gift_card         (≤ total at time of redemption)
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{LineItem, TaxRate};

pub fn subtotal(items: &[LineItem]) -> Money {
    items.iter().map(LineItem::line_total).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub vat_rate: TaxRate,
    pub vat: Money,
    pub discount: Money,
    pub gift_card: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Totals before any discount or gift card.
    pub fn compute(items: &[LineItem], shipping: Money, vat_rate: TaxRate) -> Self {
        let subtotal = subtotal(items);
        let vat = subtotal.calculate_tax(vat_rate);
        OrderTotals {
            subtotal,
            shipping,
            vat_rate,
            vat,
            discount: Money::zero(),
            gift_card: Money::zero(),
            total: subtotal + shipping + vat,
        }
    }

    /// Subtracts a discount total. The engine already caps it, so the total
    /// cannot drop below zero here.
    pub fn apply_discount(&mut self, amount: Money) {
        self.discount += amount;
        self.total = self.total.saturating_sub(amount);
    }

    /// Subtracts a gift card amount previously clamped to `self.total`.
    pub fn apply_gift_card(&mut self, amount: Money) {
        self.gift_card += amount;
        self.total = self.total.saturating_sub(amount);
    }

    /// `total == subtotal + shipping + vat - discount - gift_card` and `total >= 0`.
    pub fn is_consistent(&self) -> bool {
        !self.total.is_negative()
            && self.total == self.subtotal + self.shipping + self.vat - self.discount - self.gift_card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolvedProduct;

    fn line(price: i64, qty: i64) -> LineItem {
        LineItem::from_product(
            ResolvedProduct {
                product_id: format!("p-{}", price),
                vendor_id: "vendor-1".into(),
                sku: "SKU".into(),
                title: "Thing".into(),
                price_cents: price,
            },
            qty,
        )
    }

    #[test]
    fn test_ten_percent_then_vat_scenario() {
        let items = vec![line(5000, 2)];
        let mut totals = OrderTotals::compute(&items, Money::zero(), TaxRate::default());
        assert_eq!(totals.subtotal.cents(), 10000);
        assert_eq!(totals.vat.cents(), 1500);
        assert_eq!(totals.total.cents(), 11500);

        totals.apply_discount(Money::from_cents(1000));
        assert_eq!(totals.total.cents(), 10500);
        assert!(totals.is_consistent());

        // gift card with balance 500 against total 10500
        totals.apply_gift_card(Money::from_cents(500));
        assert_eq!(totals.total.cents(), 10000);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_shipping_included() {
        let items = vec![line(3000, 2), line(4000, 1)];
        let totals = OrderTotals::compute(&items, Money::from_cents(500), TaxRate::from_bps(0));
        assert_eq!(totals.total.cents(), 10500);
        assert!(totals.vat.is_zero());
        assert!(totals.is_consistent());
    }
}
