//! # Domain Types
//!
//! Core domain types used throughout Orderly.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │   │      Order      │   │   OrderItem     │       │
//! │  │  (ephemeral)    │──►│  order_number   │◄──│  frozen snapshot│       │
//! │  │  unit × qty     │   │  status         │   │  of a LineItem  │       │
//! │  └─────────────────┘   │  totals (cents) │   └─────────────────┘       │
//! │                        └────────┬────────┘                              │
//! │                                 │ owns                                   │
//! │          ┌──────────────────────┼───────────────────────┐              │
//! │          ▼                      ▼                       ▼              │
//! │  ┌───────────────┐   ┌───────────────────┐   ┌───────────────────┐     │
//! │  │ OrderDiscount │   │    OrderEvent     │   │ OrderCancellation │     │
//! │  │  └ items[]    │   │ (authoritative    │   │  reason + actor   │     │
//! │  └───────────────┘   │  history)         │   └───────────────────┘     │
//! │                      └───────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every order has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `order_number`: human-readable, globally unique, never reused

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (the engine default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_VAT_RATE_BPS)
    }
}

// =============================================================================
// Catalog Resolution
// =============================================================================

/// What the catalog returns for a variant id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedVariant {
    pub variant_id: String,
    pub product_id: String,
    pub vendor_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
    pub attributes: BTreeMap<String, String>,
}

/// What the catalog returns for a product sold without variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub product_id: String,
    pub vendor_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
}

// =============================================================================
// Line Item
// =============================================================================

/// Whether a line item is priced from a variant or from the product itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Variant,
    ProductLevel,
}

/// A priced, quantity-bound reference to a variant or product.
///
/// Built once per checkout and never mutated afterwards;
/// `line_total_cents = unit_price_cents * quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub source_kind: SourceKind,
    pub variant_id: Option<String>,
    pub product_id: String,
    pub vendor_id: String,
    pub sku: String,
    pub title: String,
    pub attributes: BTreeMap<String, String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl LineItem {
    /// Prices a variant-backed line.
    pub fn from_variant(variant: ResolvedVariant, quantity: i64) -> Self {
        LineItem {
            source_kind: SourceKind::Variant,
            variant_id: Some(variant.variant_id),
            product_id: variant.product_id,
            vendor_id: variant.vendor_id,
            sku: variant.sku,
            title: variant.title,
            attributes: variant.attributes,
            unit_price_cents: variant.price_cents,
            quantity,
            line_total_cents: variant.price_cents.saturating_mul(quantity),
        }
    }

    /// Prices a product-level line (product has no variants).
    pub fn from_product(product: ResolvedProduct, quantity: i64) -> Self {
        LineItem {
            source_kind: SourceKind::ProductLevel,
            variant_id: None,
            product_id: product.product_id,
            vendor_id: product.vendor_id,
            sku: product.sku,
            title: product.title,
            attributes: BTreeMap::new(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price_cents.saturating_mul(quantity),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// The stock counter this line draws from.
    pub fn stock_target(&self) -> StockTarget {
        match &self.variant_id {
            Some(variant_id) => StockTarget::Variant(variant_id.clone()),
            None => StockTarget::Product(self.product_id.clone()),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order. See [`crate::lifecycle`] for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, not yet picked up.
    Pending,
    /// Being prepared by the vendor.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Delivered. Terminal.
    Fulfilled,
    /// Cancelled with stock restored. Terminal.
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout done, payment not confirmed.
    Initiated,
    /// Gateway confirmed the charge.
    Paid,
    /// Gateway declined; may still be retried.
    Failed,
    /// Money returned to the customer.
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Initiated
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Address
// =============================================================================

/// Postal address. Stored on the order as a JSON snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    /// Province / state; participates in VAT lookup.
    #[serde(default)]
    pub province: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

// =============================================================================
// Customer
// =============================================================================

/// Customer details supplied at checkout.
///
/// `user_id` set → registered path (existing customer row is reused).
/// `user_id` unset → guest path (a fresh customer row every time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInput {
    pub user_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Request
// =============================================================================

/// One requested line: a variant id (or a variant-less product id) and a quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub item_id: String,
    pub quantity: i64,
}

/// Everything the coordinator needs to create an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer: CustomerInput,
    pub items: Vec<ItemRequest>,
    pub shipping_address: Address,
    /// Defaults to the shipping address.
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub gift_card_code: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// A priced, persisted order.
///
/// ## Invariant
/// `total = subtotal + shipping + vat - discount - gift_card_amount`, `total >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub vat_rate_bps: i64,
    pub vat_cents: i64,
    /// Sum of every `OrderDiscount.amount_cents`.
    pub discount_cents: i64,
    pub gift_card_code: Option<String>,
    pub gift_card_amount_cents: i64,
    pub total_cents: i64,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub shipping_address: Address,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub billing_address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total implied by the stored components.
    pub fn expected_total(&self) -> Money {
        Money::from_cents(
            self.subtotal_cents + self.shipping_cents + self.vat_cents
                - self.discount_cents
                - self.gift_card_amount_cents,
        )
    }

    /// Checks the money invariant against the stored total.
    pub fn totals_consistent(&self) -> bool {
        self.total_cents >= 0 && self.expected_total().cents() == self.total_cents
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item frozen at commit time.
/// Uses snapshot pattern so later catalog price changes never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub source_kind: SourceKind,
    pub variant_id: Option<String>,
    pub product_id: String,
    pub vendor_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Title at time of sale (frozen).
    pub title_snapshot: String,
    /// Variant attributes at time of sale (frozen).
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub attributes_snapshot: BTreeMap<String, String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Freezes a line item under a pre-generated id.
    pub fn from_line(
        id: String,
        order_id: &str,
        line: &LineItem,
        created_at: DateTime<Utc>,
    ) -> Self {
        OrderItem {
            id,
            order_id: order_id.to_string(),
            source_kind: line.source_kind,
            variant_id: line.variant_id.clone(),
            product_id: line.product_id.clone(),
            vendor_id: line.vendor_id.clone(),
            sku_snapshot: line.sku.clone(),
            title_snapshot: line.title.clone(),
            attributes_snapshot: line.attributes.clone(),
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            line_total_cents: line.line_total_cents,
            created_at,
        }
    }

    /// The stock counter this item drew from at creation.
    pub fn stock_target(&self) -> StockTarget {
        match &self.variant_id {
            Some(variant_id) => StockTarget::Variant(variant_id.clone()),
            None => StockTarget::Product(self.product_id.clone()),
        }
    }
}

// =============================================================================
// Order Discounts
// =============================================================================

/// One discount that actually applied to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderDiscount {
    pub id: String,
    pub order_id: String,
    pub discount_id: Option<String>,
    pub code: Option<String>,
    pub description: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
    /// Per-item allocation; sums to `amount_cents`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<OrderDiscountItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderDiscountItem {
    pub id: String,
    pub order_discount_id: String,
    pub order_item_id: String,
    pub amount_cents: i64,
}

// =============================================================================
// Order Events
// =============================================================================

/// Append-only history row; the event log is the authoritative history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderEvent {
    pub id: String,
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderCancellation {
    pub id: String,
    pub order_id: String,
    pub reason: String,
    pub cancelled_by: String,
    pub created_at: DateTime<Utc>,
}

/// Payment confirmation recorded when an order becomes `Paid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderPayment {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Which stock counter a ledger row moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockTarget {
    Variant(String),
    Product(String),
}

impl StockTarget {
    pub fn id(&self) -> &str {
        match self {
            StockTarget::Variant(id) | StockTarget::Product(id) => id,
        }
    }
}

impl fmt::Display for StockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockTarget::Variant(id) => write!(f, "variant:{}", id),
            StockTarget::Product(id) => write!(f, "product:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InventoryReason {
    /// Stock sold at checkout (negative change).
    Sale,
    /// Stock returned by cancellation or deletion (positive change).
    Return,
    /// Goods received.
    Restock,
    /// Manual correction (either sign).
    Adjustment,
}

/// Immutable inventory ledger row.
///
/// The stock counter on the variant/product is a cached projection:
/// `stock == Σ change` over all rows for that target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryTransaction {
    pub id: String,
    pub variant_id: Option<String>,
    pub product_id: Option<String>,
    /// Signed quantity delta.
    pub change: i64,
    pub reason: InventoryReason,
    pub order_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Post-commit side effects the engine asks collaborators to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    VendorsNewOrder,
    CustomerOrderConfirmed,
    VendorsStatusChange,
    CustomerShipped,
    CustomerDelivered,
}

/// A notification the coordinator wants delivered once the order is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub order_id: String,
    pub order_number: String,
    /// Free-text message (status changes only).
    #[serde(default)]
    pub message: Option<String>,
}

impl NotificationIntent {
    pub fn new(kind: NotificationKind, order: &Order) -> Self {
        NotificationIntent {
            kind,
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// An entry in the notification outbox queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OutboxEntry {
    pub id: String,
    pub kind: NotificationKind,
    pub order_id: String,
    /// The [`NotificationIntent`] as JSON.
    pub payload: String,
    /// Number of delivery attempts.
    pub attempts: i64,
    /// Last error message if delivery failed.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
