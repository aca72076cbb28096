//! # Checkout Coordinator
//!
//! Turns a [`CheckoutRequest`] into a committed order, or into nothing.
//!
//! ## Transaction Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ validate request (no transaction yet)                                   │
//! ├──────────────────────────── BEGIN ──────────────────────────────────────┤
//! │  1. customer        registered → reuse, guest → new row                 │
//! │  2. line items      resolve + price each requested id                   │
//! │  3. totals          subtotal, shipping, VAT(address)                    │
//! │  4. order row       fresh order number, retried on collision            │
//! │  5. discounts       engine → OrderDiscount + per-item allocations       │
//! │  6. gift card       redeem up to the remaining total                    │
//! │  7. totals update   discount + gift card written back                   │
//! │  8. event           Pending / Initiated "Order created"                 │
//! │  9. items + stock   OrderItem + conditional SALE decrement per line     │
//! │ 10. outbox          vendors_new_order, customer_order_confirmed         │
//! ├──────────────────────────── COMMIT ─────────────────────────────────────┤
//! │ deliver notifications (failures stay in the outbox)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any error inside the box drops the transaction: no order, no stock
//! movement, no gift card debit, no outbox rows.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use orderly_core::lifecycle::status_description;
use orderly_core::validation::validate_checkout;
use orderly_core::{
    order_number, CheckoutRequest, DiscountEngine, DiscountInput, InventoryReason, ItemRequest,
    LineItem, Money, NotificationIntent, NotificationKind, Order, OrderDiscount, OrderDiscountItem,
    OrderEvent, OrderItem, OrderStatus, OrderTotals, PaymentStatus, TaxRate,
};

use crate::config::CheckoutSettings;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::catalog::CatalogRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::discount::DiscountRepository;
use crate::repository::order::OrderRepository;
use crate::repository::outbox::OutboxRepository;
use crate::repository::vat::VatRateRepository;
use crate::service::gift_card::GiftCardLedger;
use crate::service::inventory::InventoryLedger;
use crate::service::notify::NotificationDispatcher;
use crate::service::CheckoutOutcome;

/// Produces candidate order numbers from the creation time.
pub type OrderNumberGenerator = Arc<dyn Fn(DateTime<Utc>) -> String + Send + Sync>;

/// Creates orders atomically.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    settings: CheckoutSettings,
    dispatcher: NotificationDispatcher,
    order_numbers: OrderNumberGenerator,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(db: Database, settings: CheckoutSettings, dispatcher: NotificationDispatcher) -> Self {
        OrderService {
            db,
            settings,
            dispatcher,
            order_numbers: Arc::new(order_number::generate),
        }
    }

    /// Replaces the order number source.
    pub fn with_order_numbers(mut self, generator: OrderNumberGenerator) -> Self {
        self.order_numbers = generator;
        self
    }

    /// Creates an order, or changes nothing.
    ///
    /// ## Errors
    /// - `Validation` for malformed requests (no transaction is opened)
    /// - `NotFound` for unknown items or gift card codes
    /// - `InsufficientStock` when any line cannot be fulfilled
    /// - `GiftCardInactive` / `GiftCardExpired`
    /// - `Conflict` when a gift card balance moved concurrently, or no
    ///   unique order number could be allocated
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn create_order(&self, request: CheckoutRequest) -> DbResult<CheckoutOutcome> {
        validate_checkout(&request)?;

        let now = Utc::now();
        let discount_code = request.discount_code.as_deref().map(str::trim).filter(|c| !c.is_empty());

        let mut tx = self.db.begin().await?;

        // 1. customer
        let customer = CustomerRepository::resolve_or_create(&mut *tx, &request.customer, now).await?;

        // 2. line items
        let lines = resolve_lines(&mut *tx, &request.items).await?;

        // 3. totals before discounts
        let shipping_address = request.shipping_address.clone();
        let billing_address = request.billing_address.clone().unwrap_or_else(|| shipping_address.clone());

        let vat_rate = VatRateRepository::lookup(
            &mut *tx,
            &shipping_address.country,
            shipping_address.province.as_deref(),
        )
        .await?
        .unwrap_or(TaxRate::from_bps(self.settings.default_vat_rate_bps));

        let mut totals = OrderTotals::compute(&lines, Money::from_cents(self.settings.shipping_cents), vat_rate);

        // 4. order row
        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: String::new(),
            customer_id: customer.id.clone(),
            email: customer.email.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Initiated,
            subtotal_cents: totals.subtotal.cents(),
            shipping_cents: totals.shipping.cents(),
            vat_rate_bps: i64::from(vat_rate.bps()),
            vat_cents: totals.vat.cents(),
            discount_cents: 0,
            gift_card_code: None,
            gift_card_amount_cents: 0,
            total_cents: totals.total.cents(),
            shipping_address,
            billing_address,
            created_at: now,
            updated_at: now,
        };
        self.insert_with_fresh_number(&mut *tx, &mut order).await?;

        // Item ids exist before the items so allocations can reference them.
        let item_ids: Vec<String> = lines.iter().map(|_| Uuid::new_v4().to_string()).collect();

        // 5. discounts
        let discounts = DiscountRepository::list_active(&mut *tx, now, discount_code).await?;
        let collection_ids: BTreeSet<String> = discounts
            .iter()
            .flat_map(|d| d.collection_ids.iter().cloned())
            .collect();
        let collections = DiscountRepository::collection_index(&mut *tx, &collection_ids).await?;

        let outcome = DiscountEngine::new(&collections).evaluate(
            &discounts,
            DiscountInput {
                items: &lines,
                subtotal: totals.subtotal,
                shipping: totals.shipping,
                code: discount_code,
                now,
            },
        );

        for applied in &outcome.applied {
            let order_discount_id = Uuid::new_v4().to_string();
            let row = OrderDiscount {
                id: order_discount_id.clone(),
                order_id: order.id.clone(),
                discount_id: Some(applied.discount_id.clone()),
                code: applied.code.clone(),
                description: applied.description.clone(),
                amount_cents: applied.amount.cents(),
                created_at: now,
                items: applied
                    .allocations
                    .iter()
                    .filter(|a| a.amount.is_positive())
                    .map(|a| OrderDiscountItem {
                        id: Uuid::new_v4().to_string(),
                        order_discount_id: order_discount_id.clone(),
                        order_item_id: item_ids[a.line_index].clone(),
                        amount_cents: a.amount.cents(),
                    })
                    .collect(),
            };
            OrderRepository::insert_discount(&mut *tx, &row).await?;
        }
        totals.apply_discount(outcome.total);

        // 6. gift card
        if let Some(code) = &request.gift_card_code {
            let redemption = GiftCardLedger::redeem(&mut *tx, code, totals.total, &order.id, now).await?;
            totals.apply_gift_card(redemption.applied);
            order.gift_card_code = Some(redemption.code);
        }

        // 7. totals update
        order.discount_cents = totals.discount.cents();
        order.gift_card_amount_cents = totals.gift_card.cents();
        order.total_cents = totals.total.cents();
        debug_assert!(order.totals_consistent());
        if order.discount_cents > 0 || order.gift_card_code.is_some() {
            OrderRepository::update_totals(&mut *tx, &order).await?;
        }

        // 8. event
        OrderRepository::insert_event(
            &mut *tx,
            &OrderEvent {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Initiated,
                description: status_description(OrderStatus::Pending).to_string(),
                created_at: now,
            },
        )
        .await?;

        // 9. items + stock
        for (line, item_id) in lines.iter().zip(item_ids) {
            let item = OrderItem::from_line(item_id, &order.id, line, now);
            OrderRepository::insert_item(&mut *tx, &item).await?;
            InventoryLedger::decrement(
                &mut *tx,
                &line.stock_target(),
                line.quantity,
                InventoryReason::Sale,
                Some(&order.id),
                None,
            )
            .await?;
        }

        // 10. outbox
        let notifications = vec![
            NotificationIntent::new(NotificationKind::VendorsNewOrder, &order),
            NotificationIntent::new(NotificationKind::CustomerOrderConfirmed, &order),
        ];
        let mut entries = Vec::with_capacity(notifications.len());
        for intent in &notifications {
            entries.push(OutboxRepository::enqueue(&mut *tx, intent, now).await?);
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = order.total_cents,
            discounts = outcome.applied.len(),
            gift_card = order.gift_card_amount_cents,
            "Order created"
        );

        let delivery = self.dispatcher.deliver(&entries).await;

        Ok(CheckoutOutcome {
            order,
            notifications,
            delivery,
        })
    }

    /// Inserts `order` under a freshly generated number, retrying on collision.
    async fn insert_with_fresh_number(&self, conn: &mut SqliteConnection, order: &mut Order) -> DbResult<()> {
        let attempts = self.settings.order_number_attempts.max(1);

        for attempt in 1..=attempts {
            order.order_number = (self.order_numbers)(order.created_at);
            match OrderRepository::insert(&mut *conn, order).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_violation_on("order_number") => {
                    warn!(attempt, order_number = %order.order_number, "Order number collision");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::conflict(format!(
            "could not allocate a unique order number after {} attempts",
            attempts
        )))
    }
}

/// Resolves each requested id to a variant first, then to a variant-less product.
async fn resolve_lines(conn: &mut SqliteConnection, items: &[ItemRequest]) -> DbResult<Vec<LineItem>> {
    let mut lines = Vec::with_capacity(items.len());

    for request in items {
        let item_id = request.item_id.trim();

        let line = if let Some(variant) = CatalogRepository::resolve_variant(&mut *conn, item_id).await? {
            LineItem::from_variant(variant, request.quantity)
        } else if let Some(product) = CatalogRepository::resolve_product_level(&mut *conn, item_id).await? {
            LineItem::from_product(product, request.quantity)
        } else {
            return Err(DbError::not_found("Item", item_id));
        };

        debug!(item_id, sku = %line.sku, line_total = line.line_total_cents, "Line priced");
        lines.push(line);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::test_support::{
        checkout_request, discount, file_database, order_service, seed_product_level, seed_variant,
        setup, RecordingNotifier,
    };
    use orderly_core::{CoreError, DiscountMethod, DiscountType, ErrorKind, StockTarget};

    // -------------------------------------------------------------------------
    // Scenarios
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_plain_checkout_with_default_vat() {
        let db = setup().await;
        let tee = seed_variant(&db, 5000, 10).await;
        let (service, notifier) = order_service(&db);

        let outcome = service
            .create_order(checkout_request(&[(&tee.variant_id, 2)]))
            .await
            .unwrap();
        let order = outcome.order;

        assert_eq!(order.subtotal_cents, 10_000);
        assert_eq!(order.vat_rate_bps, 1500);
        assert_eq!(order.vat_cents, 1_500);
        assert_eq!(order.total_cents, 11_500);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Initiated);
        assert!(order.order_number.starts_with("ORD-"));

        let stored = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.order_number, order.order_number);
        assert_eq!(stored.shipping_address, stored.billing_address);

        let items = db.orders().items(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attributes_snapshot.get("size").map(String::as_str), Some("M"));

        let target = StockTarget::Variant(tee.variant_id.clone());
        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(8));
        let sales = db.inventory().for_order(&order.id).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].change, -2);
        assert_eq!(sales[0].reason, InventoryReason::Sale);

        let events = db.orders().events(&order.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "Order created");

        assert_eq!(
            notifier.kinds(),
            vec![NotificationKind::VendorsNewOrder, NotificationKind::CustomerOrderConfirmed]
        );
        assert_eq!(outcome.delivery.delivered.len(), 2);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_discount_then_gift_card() {
        let db = setup().await;
        let tee = seed_variant(&db, 5000, 10).await;

        // 10% off with code, then a 500 cent gift card
        let mut ten_off = discount(DiscountType::OrderPercent);
        ten_off.method = DiscountMethod::Code;
        ten_off.code = Some("TEN".into());
        ten_off.percent = Some(10);
        db.discounts().insert(&ten_off).await.unwrap();
        db.gift_cards().insert("GC-500", 500, None).await.unwrap();

        let (service, _) = order_service(&db);
        let mut request = checkout_request(&[(&tee.variant_id, 2)]);
        request.discount_code = Some("ten".into());
        request.gift_card_code = Some("gc-500".into());

        let order = service.create_order(request).await.unwrap().order;

        // 10000 + 1500 VAT - 1000 discount - 500 card
        assert_eq!(order.discount_cents, 1_000);
        assert_eq!(order.gift_card_amount_cents, 500);
        assert_eq!(order.gift_card_code.as_deref(), Some("GC-500"));
        assert_eq!(order.total_cents, 10_000);
        assert!(order.totals_consistent());

        let check = db.orders().verify_totals(&order.id).await.unwrap().unwrap();
        assert!(check.is_consistent());

        let discounts = db.orders().discounts(&order.id).await.unwrap();
        assert_eq!(discounts.len(), 1);
        assert_eq!(discounts[0].code.as_deref(), Some("TEN"));
        assert_eq!(discounts[0].items.iter().map(|i| i.amount_cents).sum::<i64>(), 1_000);

        let card = db.gift_cards().get_by_code("GC-500").await.unwrap().unwrap();
        assert_eq!(card.balance_cents, 0);
    }

    #[tokio::test]
    async fn test_free_shipping_capped_by_shipping() {
        let db = setup().await;
        let mug = seed_product_level(&db, 2000, 5).await;
        db.discounts().insert(&discount(DiscountType::FreeShipping)).await.unwrap();

        let (service, _) = order_service(&db);
        let service = OrderService {
            settings: CheckoutSettings {
                shipping_cents: 700,
                ..CheckoutSettings::default()
            },
            ..service
        };

        let order = service
            .create_order(checkout_request(&[(&mug.product_id, 1)]))
            .await
            .unwrap()
            .order;

        assert_eq!(order.shipping_cents, 700);
        assert_eq!(order.discount_cents, 700);
        // 2000 + 700 + 300 VAT - 700
        assert_eq!(order.total_cents, 2_300);
        assert_eq!(
            db.inventory().stock(&StockTarget::Product(mug.product_id.clone())).await.unwrap(),
            Some(4)
        );
    }

    #[tokio::test]
    async fn test_vat_from_address() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;
        db.vat_rates().upsert("PK", None, 1700).await.unwrap();

        let (service, _) = order_service(&db);
        let order = service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap()
            .order;

        assert_eq!(order.vat_rate_bps, 1700);
        assert_eq!(order.vat_cents, 170);
    }

    #[tokio::test]
    async fn test_registered_customer_reused() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;
        let (service, _) = order_service(&db);

        let mut request = checkout_request(&[(&tee.variant_id, 1)]);
        request.customer.user_id = Some("user-42".into());

        let first = service.create_order(request.clone()).await.unwrap().order;
        let second = service.create_order(request).await.unwrap().order;

        assert_eq!(first.customer_id, second.customer_id);
        assert_ne!(first.order_number, second.order_number);
        assert_eq!(db.orders().list_for_customer(&first.customer_id, 10).await.unwrap().len(), 2);
    }

    // -------------------------------------------------------------------------
    // Atomicity
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = setup().await;
        let plenty = seed_variant(&db, 1000, 10).await;
        let scarce = seed_product_level(&db, 1000, 1).await;
        db.gift_cards().insert("GC-ROLL", 5_000, None).await.unwrap();

        let (service, notifier) = order_service(&db);
        let mut request = checkout_request(&[(&plenty.variant_id, 2), (&scarce.product_id, 2)]);
        request.gift_card_code = Some("GC-ROLL".into());

        let err = service.create_order(request).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.customers().count().await.unwrap(), 0);
        assert_eq!(
            db.inventory().stock(&StockTarget::Variant(plenty.variant_id.clone())).await.unwrap(),
            Some(10)
        );
        let card = db.gift_cards().get_by_code("GC-ROLL").await.unwrap().unwrap();
        assert_eq!(card.balance_cents, 5_000);
        assert!(db.gift_cards().transactions(&card.id).await.unwrap().is_empty());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
        assert!(notifier.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_item_and_gift_card() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;
        let (service, _) = order_service(&db);

        let err = service
            .create_order(checkout_request(&[("no-such-item", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut request = checkout_request(&[(&tee.variant_id, 1)]);
        request.gift_card_code = Some("NOPE".into());
        let err = service.create_order(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(
            db.inventory().stock(&StockTarget::Variant(tee.variant_id.clone())).await.unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_up_front() {
        let db = setup().await;
        let (service, _) = order_service(&db);

        let err = service.create_order(checkout_request::<&str>(&[])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = service
            .create_order(checkout_request(&[("anything", 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_order() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;

        let failing = NotificationDispatcher::new(
            db.clone(),
            Arc::new(crate::test_support::FailingNotifier),
            Default::default(),
        );
        let service = OrderService::new(db.clone(), CheckoutSettings::default(), failing);

        let outcome = service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap();

        assert_eq!(outcome.delivery.failed.len(), 2);
        assert!(db.orders().get_by_id(&outcome.order.id).await.unwrap().is_some());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 2);
    }

    // -------------------------------------------------------------------------
    // Order numbers
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_order_number_collision_is_retried() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;
        let (service, _) = order_service(&db);

        // first call of each checkout repeats a taken number, then moves on
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let service = service.with_order_numbers(Arc::new(move |_now| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 || n == 1 {
                "ORD-FIXED".to_string()
            } else {
                format!("ORD-{}", n)
            }
        }));

        let first = service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap()
            .order;
        let second = service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap()
            .order;

        assert_eq!(first.order_number, "ORD-FIXED");
        assert_eq!(second.order_number, "ORD-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_order_number_exhaustion_is_conflict() {
        let db = setup().await;
        let tee = seed_variant(&db, 1000, 5).await;
        let (service, _) = order_service(&db);
        let service = service.with_order_numbers(Arc::new(|_now| "ORD-ALWAYS".to_string()));

        service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap();
        let err = service
            .create_order(checkout_request(&[(&tee.variant_id, 1)]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.orders().count().await.unwrap(), 1);
        assert_eq!(
            db.inventory().stock(&StockTarget::Variant(tee.variant_id.clone())).await.unwrap(),
            Some(4)
        );
    }

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let (db, path) = file_database().await;
        let tee = seed_variant(&db, 1000, 3).await;

        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(db.clone(), notifier, Default::default());
        let service = OrderService::new(db.clone(), CheckoutSettings::default(), dispatcher);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let variant_id = tee.variant_id.clone();
            handles.push(tokio::spawn(async move {
                service.create_order(checkout_request(&[(&variant_id, 1)])).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected error: {e}"),
            }
        }

        // writers queue on the lock, so exactly the stocked units sell
        let target = StockTarget::Variant(tee.variant_id.clone());
        let stock = db.inventory().stock(&target).await.unwrap().unwrap();
        assert_eq!(successes, 3);
        assert_eq!(stock, 0);
        assert_eq!(db.orders().count().await.unwrap(), successes);
        assert!(InventoryLedger::new(db.clone()).verify(&target).await.unwrap().is_consistent());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registered_checkouts_all_commit() {
        let (db, path) = file_database().await;
        let tee = seed_variant(&db, 1000, 100).await;
        let (service, _) = order_service(&db);

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            let variant_id = tee.variant_id.clone();
            handles.push(tokio::spawn(async move {
                let mut request = checkout_request(&[(&variant_id, 1)]);
                request.customer.user_id = Some(format!("user-{}", i % 2));
                service.create_order(request).await
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                panic!("checkout failed: kind={:?} {e}", e.kind());
            }
        }

        let target = StockTarget::Variant(tee.variant_id.clone());
        assert_eq!(db.inventory().stock(&target).await.unwrap(), Some(84));
        assert_eq!(db.orders().count().await.unwrap(), 16);
        // one row per registered user, never a duplicate from a lost race
        assert_eq!(db.customers().count().await.unwrap(), 2);
        assert!(InventoryLedger::new(db.clone()).verify(&target).await.unwrap().is_consistent());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gift_card_redemptions_never_overspend() {
        let (db, path) = file_database().await;
        let tee = seed_variant(&db, 1000, 50).await;
        db.gift_cards().insert("GC-SHARED", 2_500, None).await.unwrap();
        let (service, _) = order_service(&db);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let service = service.clone();
            let variant_id = tee.variant_id.clone();
            handles.push(tokio::spawn(async move {
                let mut request = checkout_request(&[(&variant_id, 1)]);
                request.gift_card_code = Some("GC-SHARED".into());
                service.create_order(request).await
            }));
        }

        let mut applied = 0;
        let mut orders = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => {
                    orders += 1;
                    applied += outcome.order.gift_card_amount_cents;
                    assert!(outcome.order.totals_consistent());
                }
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected error: {e}"),
            }
        }

        // each order totals 1150: 1150 + 1150 + 200, then the card is empty
        assert_eq!(orders, 6);
        assert_eq!(applied, 2_500);

        let card = db.gift_cards().get_by_code("GC-SHARED").await.unwrap().unwrap();
        assert_eq!(card.balance_cents, 2_500 - applied);
        let redeemed: i64 = db
            .gift_cards()
            .transactions(&card.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount_cents)
            .sum();
        assert_eq!(redeemed, applied);
        assert!(GiftCardLedger::new(db.clone()).verify("GC-SHARED").await.unwrap().is_consistent());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
