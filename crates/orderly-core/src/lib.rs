//! # orderly-core: Pure Pricing Logic for Orderly
//!
//! This crate holds every rule the order engine enforces that can be stated
//! without touching storage: money arithmetic, discount selection and
//! allocation, gift card redemption arithmetic, the order state machine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orderly Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Callers (storefront API, admin tools, seed bin)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                orderly-db (services + repositories)             │   │
//! │  │   OrderService • LifecycleService • ledgers • outbox            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ orderly-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌────────┐ ┌──────────┐ ┌───────────┐ ┌───────────┐ ┌───────┐ │   │
//! │  │  │ money  │ │ discount │ │ gift_card │ │ lifecycle │ │pricing│ │   │
//! │  │  └────────┘ └──────────┘ └───────────┘ └───────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cent `Money` with explicit rounding helpers
//! - [`types`] - Orders, line items, ledger rows, notification intents
//! - [`discount`] - Discount selection, amounts, per-line allocation
//! - [`gift_card`] - Gift card validity and redeemable amount
//! - [`lifecycle`] - Order and payment status transitions
//! - [`pricing`] - Subtotal, VAT and running total
//! - [`order_number`] - Human-readable order numbers
//! - [`validation`] - Input and catalog-admin validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use orderly_core::money::Money;
//! use orderly_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(10000);
//! let vat = subtotal.calculate_tax(TaxRate::default()); // 15%
//! assert_eq!(vat.cents(), 1500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod gift_card;
pub mod lifecycle;
pub mod money;
pub mod order_number;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use discount::{
    AppliedDiscount, CollectionIndex, Discount, DiscountEngine, DiscountInput, DiscountMethod,
    DiscountOutcome, DiscountType, LineAllocation,
};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use gift_card::{GiftCard, GiftCardStatus, GiftCardTransaction, GiftCardTransactionKind};
pub use money::Money;
pub use pricing::OrderTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// VAT applied when no rate is configured for the shipping region (15%).
pub const DEFAULT_VAT_RATE_BPS: u32 = 1500;

/// Maximum distinct lines in a single checkout.
pub const MAX_LINE_ITEMS: usize = 100;

/// Largest catalog price or discount amount, in cents (100,000,000.00).
///
/// Keeps `price * MAX_ITEM_QUANTITY * MAX_LINE_ITEMS` well inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
