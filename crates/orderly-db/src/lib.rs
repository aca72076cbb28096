//! # orderly-db: Storage and Transactions for Orderly
//!
//! Everything that writes: the SQLite schema, one repository per entity,
//! and the services that stitch repositories into atomic operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orderly Data Flow                                │
//! │                                                                         │
//! │  caller (storefront API, admin tool, seed bin)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   orderly-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   │   │
//! │  │   │   Services   │──►│ Repositories │──►│ Database (pool)  │   │   │
//! │  │   │ OrderService │   │ order.rs     │   │ SqlitePool       │   │   │
//! │  │   │ Lifecycle    │   │ inventory.rs │   │ migrations       │   │   │
//! │  │   │ ledgers      │   │ outbox.rs    │   │                  │   │   │
//! │  │   └──────┬───────┘   └──────────────┘   └──────────────────┘   │   │
//! │  │          │ pricing, discounts, transitions                      │   │
//! │  │          ▼                                                      │   │
//! │  │     orderly-core                                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Engine configuration (TOML file + environment)
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`service`] - Checkout, lifecycle, ledgers, notification delivery
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orderly_db::{Database, EngineConfig, LogNotifier, NotificationDispatcher, OrderService};
//!
//! let config = EngineConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let dispatcher = NotificationDispatcher::new(db.clone(), Arc::new(LogNotifier), config.notifications.clone());
//! let orders = OrderService::new(db.clone(), config.checkout.clone(), dispatcher);
//!
//! let outcome = orders.create_order(request).await?;
//! println!("{}", outcome.order.order_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CheckoutSettings, EngineConfig, NotificationSettings};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use service::checkout::OrderService;
pub use service::gift_card::GiftCardLedger;
pub use service::inventory::InventoryLedger;
pub use service::lifecycle::LifecycleService;
pub use service::notify::{DeliveryReport, LogNotifier, NotificationDispatcher, Notifier, NotifyError};
pub use service::{CheckoutOutcome, OrderOutcome};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::order::OrderRepository;
pub use repository::outbox::OutboxRepository;
