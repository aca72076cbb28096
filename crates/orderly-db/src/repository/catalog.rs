//! # Catalog Repository
//!
//! Vendors, products, variants and collections.
//!
//! The order engine only reads the catalog (see [`CatalogRepository::resolve_variant`]
//! and [`CatalogRepository::resolve_product_level`]); the insert helpers exist
//! so the engine can be seeded and tested. Stock is never written here: every
//! unit enters through the inventory ledger.
//!
//! ## Item Resolution
//! ```text
//! item id ──► active variant of an active product? ──► ResolvedVariant
//!     │
//!     └──► active product without variants?      ──► ResolvedProduct
//!              │
//!              └──► NotFound
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use orderly_core::validation::{validate_price_cents, validate_sku, validate_title};
use orderly_core::{ResolvedProduct, ResolvedVariant};

use crate::error::DbResult;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub vendor_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
    /// Products with variants are sold through their variants only.
    pub has_variants: bool,
    /// Product-level stock; unused once variants exist.
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
    #[sqlx(json)]
    pub attributes: BTreeMap<String, String>,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`CatalogRepository::insert_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub vendor_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
}

/// Input for [`CatalogRepository::insert_variant`].
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub product_id: String,
    pub sku: String,
    pub title: String,
    pub price_cents: i64,
    pub attributes: BTreeMap<String, String>,
}

#[derive(sqlx::FromRow)]
struct ResolvedVariantRow {
    variant_id: String,
    product_id: String,
    vendor_id: String,
    sku: String,
    title: String,
    price_cents: i64,
    #[sqlx(json)]
    attributes: BTreeMap<String, String>,
}

impl From<ResolvedVariantRow> for ResolvedVariant {
    fn from(row: ResolvedVariantRow) -> Self {
        ResolvedVariant {
            variant_id: row.variant_id,
            product_id: row.product_id,
            vendor_id: row.vendor_id,
            sku: row.sku,
            title: row.title,
            price_cents: row.price_cents,
            attributes: row.attributes,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResolvedProductRow {
    product_id: String,
    vendor_id: String,
    sku: String,
    title: String,
    price_cents: i64,
}

impl From<ResolvedProductRow> for ResolvedProduct {
    fn from(row: ResolvedProductRow) -> Self {
        ResolvedProduct {
            product_id: row.product_id,
            vendor_id: row.vendor_id,
            sku: row.sku,
            title: row.title,
            price_cents: row.price_cents,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Resolution (transaction)
    // -------------------------------------------------------------------------

    /// Prices an active variant of an active product.
    pub async fn resolve_variant(
        conn: &mut SqliteConnection,
        variant_id: &str,
    ) -> DbResult<Option<ResolvedVariant>> {
        let row: Option<ResolvedVariantRow> = sqlx::query_as(
            r#"
            SELECT
                v.id AS variant_id,
                v.product_id,
                p.vendor_id,
                v.sku,
                v.title,
                v.price_cents,
                v.attributes
            FROM variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = ?1 AND v.is_active = 1 AND p.is_active = 1
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(ResolvedVariant::from))
    }

    /// Prices an active product that is sold without variants.
    pub async fn resolve_product_level(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<Option<ResolvedProduct>> {
        let row: Option<ResolvedProductRow> = sqlx::query_as(
            r#"
            SELECT id AS product_id, vendor_id, sku, title, price_cents
            FROM products
            WHERE id = ?1 AND has_variants = 0 AND is_active = 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(ResolvedProduct::from))
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>("SELECT * FROM variants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(variant)
    }

    pub async fn variants_of(&self, product_id: &str) -> DbResult<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(
            "SELECT * FROM variants WHERE product_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Admin writes
    // -------------------------------------------------------------------------

    pub async fn insert_vendor(&self, name: &str, email: &str) -> DbResult<Vendor> {
        orderly_core::validation::validate_email(email)?;

        let vendor = Vendor {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO vendors (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&vendor.id)
            .bind(&vendor.name)
            .bind(&vendor.email)
            .bind(vendor.created_at)
            .execute(&self.pool)
            .await?;

        Ok(vendor)
    }

    /// Inserts a product with zero stock.
    pub async fn insert_product(&self, input: NewProduct) -> DbResult<Product> {
        validate_sku(&input.sku)?;
        validate_title(&input.title)?;
        validate_price_cents(input.price_cents)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            vendor_id: input.vendor_id,
            sku: input.sku.trim().to_string(),
            title: input.title.trim().to_string(),
            price_cents: input.price_cents,
            has_variants: false,
            stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, vendor_id, sku, title, price_cents,
                has_variants, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.vendor_id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(product.price_cents)
        .bind(product.has_variants)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a variant with zero stock and flags its product as variant-backed.
    pub async fn insert_variant(&self, input: NewVariant) -> DbResult<Variant> {
        validate_sku(&input.sku)?;
        validate_title(&input.title)?;
        validate_price_cents(input.price_cents)?;

        let now = Utc::now();
        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            product_id: input.product_id,
            sku: input.sku.trim().to_string(),
            title: input.title.trim().to_string(),
            price_cents: input.price_cents,
            attributes: input.attributes,
            stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %variant.id, product_id = %variant.product_id, "Inserting variant");

        let mut tx = crate::pool::begin_immediate(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, product_id, sku, title, price_cents,
                attributes, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.title)
        .bind(variant.price_cents)
        .bind(Json(&variant.attributes))
        .bind(variant.stock)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE products SET has_variants = 1, updated_at = ?2 WHERE id = ?1")
            .bind(&variant.product_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(variant)
    }

    /// Deactivated variants and products no longer resolve at checkout.
    pub async fn set_variant_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE variants SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::DbError::not_found("Variant", id));
        }
        Ok(())
    }

    pub async fn insert_collection(&self, title: &str) -> DbResult<Collection> {
        validate_title(title)?;

        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO collections (id, title, created_at) VALUES (?1, ?2, ?3)")
            .bind(&collection.id)
            .bind(&collection.title)
            .bind(collection.created_at)
            .execute(&self.pool)
            .await?;

        Ok(collection)
    }

    /// Fails with `UniqueViolation` if the product is already in the collection.
    pub async fn add_to_collection(&self, collection_id: &str, product_id: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO collection_products (collection_id, product_id) VALUES (?1, ?2)")
            .bind(collection_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product_level, seed_variant, setup};
    use crate::DbError;

    #[tokio::test]
    async fn test_variant_resolves_with_vendor_and_attributes() {
        let db = setup().await;
        let seeded = seed_variant(&db, 3000, 5).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let resolved = CatalogRepository::resolve_variant(&mut conn, &seeded.variant_id)
            .await
            .unwrap()
            .expect("variant resolves");

        assert_eq!(resolved.product_id, seeded.product_id);
        assert_eq!(resolved.vendor_id, seeded.vendor_id);
        assert_eq!(resolved.price_cents, 3000);
        assert_eq!(resolved.attributes.get("size").map(String::as_str), Some("M"));

        // a variant-backed product is not sold at product level
        let product_level = CatalogRepository::resolve_product_level(&mut conn, &seeded.product_id)
            .await
            .unwrap();
        assert!(product_level.is_none());
    }

    #[tokio::test]
    async fn test_product_level_resolution() {
        let db = setup().await;
        let seeded = seed_product_level(&db, 1250, 3).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let resolved = CatalogRepository::resolve_product_level(&mut conn, &seeded.product_id)
            .await
            .unwrap()
            .expect("product resolves");
        assert_eq!(resolved.price_cents, 1250);

        assert!(CatalogRepository::resolve_variant(&mut conn, &seeded.product_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_inactive_variant_does_not_resolve() {
        let db = setup().await;
        let seeded = seed_variant(&db, 3000, 5).await;
        db.catalog().set_variant_active(&seeded.variant_id, false).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let resolved = CatalogRepository::resolve_variant(&mut conn, &seeded.variant_id)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_collection_membership_is_unique() {
        let db = setup().await;
        let seeded = seed_product_level(&db, 500, 1).await;
        let collection = db.catalog().insert_collection("Summer").await.unwrap();

        db.catalog()
            .add_to_collection(&collection.id, &seeded.product_id)
            .await
            .unwrap();
        let err = db
            .catalog()
            .add_to_collection(&collection.id, &seeded.product_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_admin_reads() {
        let db = setup().await;
        let seeded = seed_variant(&db, 2200, 0).await;
        let catalog = db.catalog();

        let product = catalog.get_product(&seeded.product_id).await.unwrap().unwrap();
        assert!(product.has_variants);
        assert_eq!(product.stock, 0);

        let variant = catalog.get_variant(&seeded.variant_id).await.unwrap().unwrap();
        assert_eq!(variant.product_id, seeded.product_id);

        let variants = catalog.variants_of(&seeded.product_id).await.unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].id, seeded.variant_id);

        assert_eq!(catalog.count_products().await.unwrap(), 1);
        assert!(catalog.get_product("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_price_above_cap_is_rejected() {
        let db = setup().await;
        let vendor = db.catalog().insert_vendor("Acme", "shop@acme.test").await.unwrap();

        let err = db
            .catalog()
            .insert_product(NewProduct {
                vendor_id: vendor.id,
                sku: "YACHT".into(),
                title: "Yacht".into(),
                price_cents: orderly_core::MAX_PRICE_CENTS + 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), orderly_core::ErrorKind::InvalidInput);
        assert_eq!(db.catalog().count_products().await.unwrap(), 0);
    }
}
