//! Fixtures shared by the unit tests in this crate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use orderly_core::{
    Address, CheckoutRequest, CustomerInput, Discount, DiscountMethod, DiscountType, ItemRequest,
    NotificationIntent, NotificationKind, StockTarget,
};

use crate::config::{CheckoutSettings, NotificationSettings};
use crate::pool::{Database, DbConfig};
use crate::repository::catalog::{NewProduct, NewVariant};
use crate::service::checkout::OrderService;
use crate::service::inventory::InventoryLedger;
use crate::service::notify::{NotificationDispatcher, Notifier, NotifyError};

pub async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A file-backed database with a real pool, for concurrency tests.
pub async fn file_database() -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("orderly-test-{}.db", Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(5)).await.unwrap();
    (db, path)
}

pub struct SeededVariant {
    pub vendor_id: String,
    pub product_id: String,
    pub variant_id: String,
}

pub struct SeededProduct {
    pub vendor_id: String,
    pub product_id: String,
}

fn unique_sku(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// A product with one variant (size M) holding `stock` units.
pub async fn seed_variant(db: &Database, price_cents: i64, stock: i64) -> SeededVariant {
    let vendor = db.catalog().insert_vendor("Acme Apparel", "shop@acme.test").await.unwrap();
    let product = db
        .catalog()
        .insert_product(NewProduct {
            vendor_id: vendor.id.clone(),
            sku: unique_sku("TEE"),
            title: "Tee".into(),
            price_cents,
        })
        .await
        .unwrap();
    let variant = db
        .catalog()
        .insert_variant(NewVariant {
            product_id: product.id.clone(),
            sku: unique_sku("TEE-M"),
            title: "Tee / M".into(),
            price_cents,
            attributes: BTreeMap::from([("size".to_string(), "M".to_string())]),
        })
        .await
        .unwrap();

    if stock > 0 {
        InventoryLedger::new(db.clone())
            .restock(&StockTarget::Variant(variant.id.clone()), stock, Some("initial stock"))
            .await
            .unwrap();
    }

    SeededVariant {
        vendor_id: vendor.id,
        product_id: product.id,
        variant_id: variant.id,
    }
}

/// A product sold without variants holding `stock` units.
pub async fn seed_product_level(db: &Database, price_cents: i64, stock: i64) -> SeededProduct {
    let vendor = db.catalog().insert_vendor("Clay Co", "hello@clay.test").await.unwrap();
    let product = db
        .catalog()
        .insert_product(NewProduct {
            vendor_id: vendor.id.clone(),
            sku: unique_sku("MUG"),
            title: "Mug".into(),
            price_cents,
        })
        .await
        .unwrap();

    if stock > 0 {
        InventoryLedger::new(db.clone())
            .restock(&StockTarget::Product(product.id.clone()), stock, Some("initial stock"))
            .await
            .unwrap();
    }

    SeededProduct {
        vendor_id: vendor.id,
        product_id: product.id,
    }
}

/// An active automatic discount covering every product, valid for its type.
pub fn discount(discount_type: DiscountType) -> Discount {
    let (amount_cents, percent, buy_x, get_y) = match discount_type {
        DiscountType::OrderAmount | DiscountType::ProductAmount => (Some(500), None, None, None),
        DiscountType::OrderPercent | DiscountType::ProductPercent => (None, Some(10), None, None),
        DiscountType::BuyXGetY => (None, None, Some(2), Some(1)),
        DiscountType::FreeShipping => (None, None, None, None),
    };
    Discount {
        id: Uuid::new_v4().to_string(),
        title: String::new(),
        code: None,
        method: DiscountMethod::Automatic,
        discount_type,
        amount_cents,
        percent,
        buy_x_quantity: buy_x,
        get_y_quantity: get_y,
        min_purchase_amount_cents: None,
        applies_to_all_products: true,
        product_ids: BTreeSet::new(),
        collection_ids: BTreeSet::new(),
        starts_at: None,
        ends_at: None,
        is_active: true,
    }
}

pub fn address() -> Address {
    Address {
        name: "Ada Lovelace".into(),
        line1: "1 Mall Road".into(),
        line2: None,
        city: "Lahore".into(),
        province: None,
        postal_code: "54000".into(),
        country: "PK".into(),
    }
}

/// Guest checkout shipping to [`address`].
pub fn checkout_request<S: AsRef<str>>(items: &[(S, i64)]) -> CheckoutRequest {
    CheckoutRequest {
        customer: CustomerInput {
            user_id: None,
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: None,
        },
        items: items
            .iter()
            .map(|(id, quantity)| ItemRequest {
                item_id: id.as_ref().to_string(),
                quantity: *quantity,
            })
            .collect(),
        shipping_address: address(),
        billing_address: None,
        discount_code: None,
        gift_card_code: None,
    }
}

/// Default settings, recording notifier.
pub fn order_service(db: &Database) -> (OrderService, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher =
        NotificationDispatcher::new(db.clone(), notifier.clone(), NotificationSettings::default());
    (
        OrderService::new(db.clone(), CheckoutSettings::default(), dispatcher),
        notifier,
    )
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationIntent>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|i| i.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, intent: &NotificationIntent) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(intent.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _intent: &NotificationIntent) -> Result<(), NotifyError> {
        Err(NotifyError("smtp unavailable".into()))
    }
}
