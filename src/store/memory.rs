use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::{OrderStore, StoreError};
use crate::models::{NewOrder, Order};

/// Process-local store, used when no database URL is configured
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<BTreeMap<i64, Order>>,
    next_id: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = order.into_order(id);
        self.orders.write().await.insert(id, order.clone());
        Ok(order)
    }

    async fn update(&self, order: &Order) -> Result<bool, StoreError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn new_order(name: &str) -> NewOrder {
        NewOrder {
            user_id: 1,
            product_name: name.to_string(),
            price: Decimal::new(1999, 2),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = InMemoryOrderStore::new();

        let first = store.insert(new_order("Mouse")).await.unwrap();
        let second = store.insert(new_order("Keyboard")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_order() {
        let store = InMemoryOrderStore::new();
        let ghost = new_order("Ghost").into_order(7);

        assert!(!store.update(&ghost).await.unwrap());
        assert!(!store.delete(7).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_overwrites_fields() {
        let store = InMemoryOrderStore::new();
        let mut order = store.insert(new_order("Mouse")).await.unwrap();

        order.product_name = "Trackball".to_string();
        assert!(store.update(&order).await.unwrap());

        let stored = store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.product_name, "Trackball");
    }
}
