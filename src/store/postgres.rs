use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use super::{OrderStore, StoreError};
use crate::models::{NewOrder, Order};

const CREATE_ORDERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS orders (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    product_name VARCHAR(100) NOT NULL,
    price NUMERIC(12, 2) NOT NULL
)";

pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the orders table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ORDERS_TABLE).execute(&self.pool).await?;
        tracing::info!("Orders table ready");
        Ok(())
    }

    fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
        Ok(Order {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            product_name: row.try_get("product_name")?,
            price: row.try_get::<Decimal, _>("price")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT id, user_id, product_name, price FROM orders ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(Self::order_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, user_id, product_name, price FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::order_from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let row = sqlx::query(
            "INSERT INTO orders (user_id, product_name, price) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(order.user_id)
        .bind(&order.product_name)
        .bind(order.price)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        tracing::debug!(order_id = id, "Inserted order row");

        Ok(order.into_order(id))
    }

    async fn update(&self, order: &Order) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET user_id = $1, product_name = $2, price = $3 WHERE id = $4",
        )
        .bind(order.user_id)
        .bind(&order.product_name)
        .bind(order.price)
        .bind(order.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
