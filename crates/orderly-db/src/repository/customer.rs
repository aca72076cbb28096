//! # Customer Repository
//!
//! Registered customers are keyed by `user_id` and reused across orders.
//! Guests get a fresh row per checkout.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use orderly_core::{Customer, CustomerInput};

use crate::error::DbResult;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn find_by_user_id(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(customer)
    }

    pub async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, user_id, email, first_name, last_name, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.user_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Reuses the registered customer for `input.user_id`, or creates one.
    ///
    /// Guests (no `user_id`) always get a new row; the first statement is
    /// then a write, which takes the SQLite write lock up front.
    pub async fn resolve_or_create(
        conn: &mut SqliteConnection,
        input: &CustomerInput,
        now: DateTime<Utc>,
    ) -> DbResult<Customer> {
        if let Some(user_id) = &input.user_id {
            if let Some(existing) = Self::find_by_user_id(&mut *conn, user_id).await? {
                debug!(customer_id = %existing.id, "Reusing registered customer");
                return Ok(existing);
            }
        }

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            email: input.email.trim().to_string(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            phone: input.phone.clone(),
            created_at: now,
        };

        Self::insert(&mut *conn, &customer).await?;
        debug!(customer_id = %customer.id, guest = customer.user_id.is_none(), "Customer created");

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
