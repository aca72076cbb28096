//! # Demo Data Seeder
//!
//! Populates a database with a small demo catalog and walks one order
//! through checkout and fulfilment.
//!
//! ## Usage
//! ```bash
//! # Seed using the engine config (file + ORDERLY_* environment)
//! cargo run -p orderly-db --bin seed
//!
//! # Specify database path
//! cargo run -p orderly-db --bin seed -- --db ./data/orderly.db
//!
//! # Load a specific config file
//! cargo run -p orderly-db --bin seed -- --config ./orderly.toml
//! ```
//!
//! ## Seeded Data
//! - One vendor with tees (S/M/L variants) and product-level mugs
//! - A "Summer" collection
//! - An automatic 10% collection discount and a `WELCOME5` code
//! - A gift card `GIFT-DEMO` worth 20.00
//! - VAT rates for PK (15%) and PK/Punjab (16%)

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orderly_core::{
    Address, CheckoutRequest, CustomerInput, Discount, DiscountMethod, DiscountType, ItemRequest,
    Money, OrderStatus, PaymentStatus, StockTarget,
};
use orderly_db::repository::catalog::{NewProduct, NewVariant};
use orderly_db::{
    Database, EngineConfig, InventoryLedger, LifecycleService, LogNotifier, NotificationDispatcher,
    OrderService,
};

/// Tee sizes and their price on top of the base price.
const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 0), ("L", 200)];

const MUGS: &[(&str, i64)] = &[("Clay Mug", 1_500), ("Enamel Mug", 1_800)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orderly_db=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_override: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_override = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Orderly Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   Engine config file");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load_or_default(config_path);
    if let Some(path) = db_override {
        config.database.path = path;
    }

    println!("Orderly Demo Seeder");
    println!("===================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    let inventory = InventoryLedger::new(db.clone());
    let vendor = db.catalog().insert_vendor("Indus Threads", "orders@indus.test").await?;
    let summer = db.catalog().insert_collection("Summer").await?;

    let tee = db
        .catalog()
        .insert_product(NewProduct {
            vendor_id: vendor.id.clone(),
            sku: "TEE".into(),
            title: "Cotton Tee".into(),
            price_cents: 2_500,
        })
        .await?;
    db.catalog().add_to_collection(&summer.id, &tee.id).await?;

    let mut tee_variants = Vec::new();
    for (size, addon) in SIZES {
        let variant = db
            .catalog()
            .insert_variant(NewVariant {
                product_id: tee.id.clone(),
                sku: format!("TEE-{}", size),
                title: format!("Cotton Tee / {}", size),
                price_cents: tee.price_cents + addon,
                attributes: BTreeMap::from([("size".to_string(), size.to_string())]),
            })
            .await?;
        inventory
            .restock(&StockTarget::Variant(variant.id.clone()), 25, Some("opening stock"))
            .await?;
        tee_variants.push(variant);
    }
    println!("✓ Created {} tee variants", tee_variants.len());

    let mut mugs = Vec::new();
    for (idx, (title, price_cents)) in MUGS.iter().enumerate() {
        let mug = db
            .catalog()
            .insert_product(NewProduct {
                vendor_id: vendor.id.clone(),
                sku: format!("MUG-{:03}", idx + 1),
                title: title.to_string(),
                price_cents: *price_cents,
            })
            .await?;
        inventory
            .restock(&StockTarget::Product(mug.id.clone()), 10, Some("opening stock"))
            .await?;
        mugs.push(mug);
    }
    println!("✓ Created {} mugs", mugs.len());

    // -------------------------------------------------------------------------
    // Pricing rules
    // -------------------------------------------------------------------------

    db.discounts()
        .insert(&Discount {
            id: Uuid::new_v4().to_string(),
            title: "Summer 10%".into(),
            code: None,
            method: DiscountMethod::Automatic,
            discount_type: DiscountType::ProductPercent,
            amount_cents: None,
            percent: Some(10),
            buy_x_quantity: None,
            get_y_quantity: None,
            min_purchase_amount_cents: None,
            applies_to_all_products: false,
            product_ids: Default::default(),
            collection_ids: [summer.id.clone()].into_iter().collect(),
            starts_at: None,
            ends_at: None,
            is_active: true,
        })
        .await?;
    db.discounts()
        .insert(&Discount {
            id: Uuid::new_v4().to_string(),
            title: "Welcome".into(),
            code: Some("welcome5".into()),
            method: DiscountMethod::Code,
            discount_type: DiscountType::OrderAmount,
            amount_cents: Some(500),
            percent: None,
            buy_x_quantity: None,
            get_y_quantity: None,
            min_purchase_amount_cents: Some(3_000),
            applies_to_all_products: true,
            product_ids: Default::default(),
            collection_ids: Default::default(),
            starts_at: Some(Utc::now()),
            ends_at: None,
            is_active: true,
        })
        .await?;
    println!("✓ Created discounts");

    orderly_db::GiftCardLedger::new(db.clone())
        .issue("GIFT-DEMO", Money::from_cents(2_000), None)
        .await?;
    db.vat_rates().upsert("PK", None, 1500).await?;
    db.vat_rates().upsert("PK", Some("Punjab"), 1600).await?;
    println!("✓ Issued gift card and VAT rates");

    // -------------------------------------------------------------------------
    // One order, start to finish
    // -------------------------------------------------------------------------

    let dispatcher = NotificationDispatcher::new(
        db.clone(),
        Arc::new(LogNotifier),
        config.notifications.clone(),
    );
    let orders = OrderService::new(db.clone(), config.checkout.clone(), dispatcher.clone());
    let lifecycle = LifecycleService::new(db.clone(), dispatcher);

    let request = CheckoutRequest {
        customer: CustomerInput {
            user_id: None,
            email: "demo@example.com".into(),
            first_name: "Demo".into(),
            last_name: "Buyer".into(),
            phone: None,
        },
        items: vec![
            ItemRequest {
                item_id: tee_variants[1].id.clone(),
                quantity: 2,
            },
            ItemRequest {
                item_id: mugs[0].id.clone(),
                quantity: 1,
            },
        ],
        shipping_address: Address {
            name: "Demo Buyer".into(),
            line1: "12 Mall Road".into(),
            line2: None,
            city: "Lahore".into(),
            province: Some("Punjab".into()),
            postal_code: "54000".into(),
            country: "PK".into(),
        },
        billing_address: None,
        discount_code: Some("WELCOME5".into()),
        gift_card_code: Some("GIFT-DEMO".into()),
    };

    let outcome = orders.create_order(request).await?;
    let order = outcome.order;
    println!();
    println!("✓ Placed order {}", order.order_number);
    println!("  Subtotal:  {}", Money::from_cents(order.subtotal_cents));
    println!("  Shipping:  {}", Money::from_cents(order.shipping_cents));
    println!("  VAT:       {}", Money::from_cents(order.vat_cents));
    println!("  Discounts: -{}", Money::from_cents(order.discount_cents));
    println!("  Gift card: -{}", Money::from_cents(order.gift_card_amount_cents));
    println!("  Total:     {}", Money::from_cents(order.total_cents));

    lifecycle
        .set_payment_status(&order.id, PaymentStatus::Paid, Some("demo-charge"))
        .await?;
    for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Fulfilled] {
        lifecycle.transition(&order.id, status).await?;
        println!("  → {}", status);
    }

    let check = db
        .orders()
        .verify_totals(&order.id)
        .await?
        .ok_or("seeded order disappeared")?;
    println!();
    println!(
        "✓ Seed complete! (totals consistent: {})",
        check.is_consistent()
    );

    db.close().await;
    Ok(())
}
