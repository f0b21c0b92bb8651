use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EventPublisher, PublishError};
use crate::models::OrderCreatedEvent;

/// In-process publisher, used when no broker is configured
#[derive(Clone)]
pub struct ChannelPublisher {
    topic: String,
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelPublisher {
    pub fn new(topic: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                topic: topic.into(),
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: &OrderCreatedEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        self.sender
            .send(payload)
            .map_err(|_| PublishError::ChannelClosed)?;

        tracing::info!(topic = %self.topic, order_id = event.order_id, "📨 Event queued");
        Ok(())
    }
}

/// Drain the channel, logging every event as it is received
pub fn spawn_logging_consumer(topic: String, mut receiver: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            tracing::info!(topic = %topic, payload = %payload, "📬 Received event");
        }
        tracing::debug!(topic = %topic, "Event channel closed, consumer stopping");
    })
}
