// Private module declarations
mod memory;
mod postgres;

use async_trait::async_trait;

use crate::models::{NewOrder, Order};

// Re-export for public API
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

// ============================================================================
// Order Store - Durable order persistence
// ============================================================================
//
// Plain CRUD. Identity is assigned by `insert`; an order is either fully
// written or not at all.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Order>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Persist a new order and return it with its assigned identity
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Overwrite an existing order. Returns false if it no longer exists.
    async fn update(&self, order: &Order) -> Result<bool, StoreError>;

    /// Remove an order. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}
