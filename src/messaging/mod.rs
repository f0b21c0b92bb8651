// Private module declarations
mod channel;
mod redpanda;

use async_trait::async_trait;

use crate::models::OrderCreatedEvent;

// Re-export for public API
pub use channel::{spawn_logging_consumer, ChannelPublisher};
pub use redpanda::RedpandaPublisher;

/// Queue / topic receiving serialized `OrderCreatedEvent`s
pub const ORDER_CREATED_TOPIC: &str = "orderCreatedQueue";

// ============================================================================
// Event Publisher - Best-effort, at-least-once notification
// ============================================================================
//
// One send per call. Publishers do not wait for consumers; a failure is
// reported back so the caller can log it, nothing more.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker send failed: {0}")]
    Broker(String),

    #[error("Circuit breaker open for message broker")]
    CircuitOpen,

    #[error("Event channel closed")]
    ChannelClosed,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderCreatedEvent) -> Result<(), PublishError>;
}
