use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Domain Models
// ============================================================================

/// A committed order. `id` is assigned by the store on insert.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub product_name: String,
    pub price: Decimal,
}

/// Order fields as they arrive from a client, before validation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub user_id: Option<i64>,
    pub product_name: Option<String>,
    pub price: Option<Decimal>,
}

/// Validated order fields, not yet persisted
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub product_name: String,
    pub price: Decimal,
}

impl NewOrder {
    pub fn into_order(self, id: i64) -> Order {
        Order {
            id,
            user_id: self.user_id,
            product_name: self.product_name,
            price: self.price,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: i64,
    pub user_id: i64,
    pub product_name: String,
    pub price: Decimal,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            product_name: order.product_name.clone(),
            price: order.price,
        }
    }
}

/// User as returned by the users service
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderDetails {
    pub order: OrderDto,
    pub user: UserDto,
}

// ============================================================================
// Domain Events
// These represent state changes that have occurred in the system
// ============================================================================

/// Base trait for all domain events
pub trait DomainEvent {
    fn event_type(&self) -> &str;
    fn aggregate_id(&self) -> i64;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Published once per committed order. Consumers deduplicate on `order_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub event_id: Uuid,
    pub order_id: i64,
    pub user_id: i64,
    pub product_name: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderCreatedEvent {
    pub fn from_order(order: &Order) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            product_name: order.product_name.clone(),
            timestamp: Utc::now(),
        }
    }
}

impl DomainEvent for OrderCreatedEvent {
    fn event_type(&self) -> &str {
        "OrderCreated"
    }

    fn aggregate_id(&self) -> i64 {
        self.order_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
