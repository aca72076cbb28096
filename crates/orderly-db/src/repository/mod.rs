//! # Repository Module
//!
//! One repository per entity. SQL lives here and nowhere else.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  &self methods (pool)                 associated fns (transaction)     │
//! │  ─────────────────────                ─────────────────────────────    │
//! │  db.orders().get_by_id(id)            OrderRepository::insert(         │
//! │  db.orders().events(id)                   &mut *tx, &order)            │
//! │                                                                         │
//! │  Reads and admin writes that stand    Anything that must commit or     │
//! │  on their own.                        roll back with the rest of a     │
//! │                                       service operation takes an       │
//! │                                       explicit `&mut SqliteConnection` │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Vendors, products, variants, collections
//! - [`CustomerRepository`](customer::CustomerRepository) - Registered and guest customers
//! - [`DiscountRepository`](discount::DiscountRepository) - Discount definitions and membership
//! - [`GiftCardRepository`](gift_card::GiftCardRepository) - Cards and their ledger rows
//! - [`InventoryRepository`](inventory::InventoryRepository) - Stock counters and ledger rows
//! - [`OrderRepository`](order::OrderRepository) - Orders and everything they own
//! - [`OutboxRepository`](outbox::OutboxRepository) - Notification outbox queue
//! - [`VatRateRepository`](vat::VatRateRepository) - VAT per country / province

pub mod catalog;
pub mod customer;
pub mod discount;
pub mod gift_card;
pub mod inventory;
pub mod order;
pub mod outbox;
pub mod vat;
