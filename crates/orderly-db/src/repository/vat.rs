//! # VAT Rate Repository
//!
//! ## Lookup Order
//! ```text
//! (country, province) ──► (country, '') ──► None (caller falls back to default)
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use orderly_core::validation::{validate_country, validate_vat_rate_bps};
use orderly_core::TaxRate;

use crate::error::DbResult;

/// Repository for VAT rates.
#[derive(Debug, Clone)]
pub struct VatRateRepository {
    pool: SqlitePool,
}

fn normalize_province(province: Option<&str>) -> String {
    province.map(|p| p.trim().to_uppercase()).unwrap_or_default()
}

impl VatRateRepository {
    /// Creates a new VatRateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VatRateRepository { pool }
    }

    /// Rate for a shipping destination, most specific match first.
    pub async fn lookup(
        conn: &mut SqliteConnection,
        country: &str,
        province: Option<&str>,
    ) -> DbResult<Option<TaxRate>> {
        let country = country.trim().to_uppercase();
        let province = normalize_province(province);

        let bps: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT rate_bps FROM vat_rates
            WHERE country = ?1 AND province IN (?2, '')
            ORDER BY CASE WHEN province = ?2 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
        )
        .bind(&country)
        .bind(&province)
        .fetch_optional(&mut *conn)
        .await?;

        // rate_bps is CHECKed to [0, 10000]
        Ok(bps.map(|bps| TaxRate::from_bps(bps as u32)))
    }

    /// Inserts or replaces the rate for `(country, province)`.
    /// `province = None` sets the country-wide rate.
    pub async fn upsert(&self, country: &str, province: Option<&str>, rate_bps: i64) -> DbResult<()> {
        validate_country(country)?;
        validate_vat_rate_bps(rate_bps)?;

        sqlx::query(
            r#"
            INSERT INTO vat_rates (id, country, province, rate_bps)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (country, province) DO UPDATE SET rate_bps = excluded.rate_bps
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(country.trim().to_uppercase())
        .bind(normalize_province(province))
        .bind(rate_bps)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, country: &str, province: Option<&str>) -> DbResult<Option<TaxRate>> {
        let mut conn = self.pool.acquire().await?;
        Self::lookup(&mut conn, country, province).await
    }
}
