//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1000 cents / 3 = 333 cents (×3 = 999 cents)                         │
//! │    We KNOW we lost 1 cent, and hand it to the first allocation         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rules
//! | Operation               | Rule                 | Helper                     |
//! |-------------------------|----------------------|----------------------------|
//! | VAT                     | round half up        | [`Money::calculate_tax`]   |
//! | Percent discounts       | floor                | [`Money::percent_floor`]   |
//! | Proportional allocation | floor, remainder → 1st | [`Money::share_floor`]   |
//!
//! ## Usage
//! ```rust
//! use orderly_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let line = price * 3_i64;            // $32.97
//! assert_eq!(line.percent_floor(10).cents(), 329);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for ledger deltas
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// unit price ──► line total ──► subtotal ──┬──► VAT (half up)
///                                          ├──► discounts (floor)
///                                          └──► gift card (clamp)
///                                                   │
///                                                   ▼
///                                                 total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use orderly_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates VAT with standard round-half-up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use orderly_core::money::Money;
    /// use orderly_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(10000);
    /// let vat = subtotal.calculate_tax(TaxRate::from_bps(1500)); // 15%
    /// assert_eq!(vat.cents(), 1500);
    ///
    /// // $10.00 × 8.25% = $0.825 → $0.83
    /// let vat = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(vat.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 prevents overflow on large amounts
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000).div_euclid(10000);
        Money::from_cents(tax_cents as i64)
    }

    /// Returns `floor(self * percent / 100)`.
    ///
    /// ## Example
    /// ```rust
    /// use orderly_core::money::Money;
    ///
    /// // 20% of $60.00
    /// assert_eq!(Money::from_cents(6000).percent_floor(20).cents(), 1200);
    /// // 15% of $0.99 = 14.85 → 14
    /// assert_eq!(Money::from_cents(99).percent_floor(15).cents(), 14);
    /// ```
    pub fn percent_floor(&self, percent: i64) -> Money {
        let cents = (self.0 as i128 * percent as i128).div_euclid(100);
        Money::from_cents(cents as i64)
    }

    /// Returns `floor(self * part / whole)`, or zero when `whole` is zero.
    ///
    /// Used for proportional allocation: a line's share of a discount is
    /// `discount.share_floor(line_total, matched_total)`.
    pub fn share_floor(&self, part: Money, whole: Money) -> Money {
        if whole.0 == 0 {
            return Money::zero();
        }
        let cents = (self.0 as i128 * part.0 as i128).div_euclid(whole.0 as i128);
        Money::from_cents(cents as i64)
    }

    /// Clamps the value into `[lo, hi]`.
    ///
    /// If `hi < lo` (e.g. an exhausted upper bound), `lo` wins.
    pub fn clamp_to(self, lo: Money, hi: Money) -> Money {
        if self < lo || hi < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }

    /// Subtracts, flooring the result at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
