use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::sync::Arc;
use std::time::Duration;

use super::{EventPublisher, PublishError};
use crate::models::{DomainEvent, OrderCreatedEvent};
use crate::utils::CircuitBreaker;

const BROKER_DEPENDENCY: &str = "redpanda";

pub struct RedpandaPublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl RedpandaPublisher {
    pub fn new(
        brokers: &str,
        topic: impl Into<String>,
        send_timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .create()
            .map_err(|e| PublishError::Broker(format!("Failed to create Redpanda producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: topic.into(),
            send_timeout,
            circuit_breaker,
        })
    }
}

#[async_trait]
impl EventPublisher for RedpandaPublisher {
    async fn publish(&self, event: &OrderCreatedEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let key = event.aggregate_id().to_string();

        // Fail fast while the broker is known to be down
        let Some(permit) = self.circuit_breaker.allow(BROKER_DEPENDENCY) else {
            tracing::error!(topic = %self.topic, "Circuit breaker open - Redpanda unavailable");
            return Err(PublishError::CircuitOpen);
        };

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, Timeout::After(self.send_timeout)).await {
            Ok(_) => {
                permit.record_success();
                tracing::info!(
                    topic = %self.topic,
                    key = %key,
                    event_type = %event.event_type(),
                    "📨 Published to Redpanda"
                );
                Ok(())
            }
            Err((e, _)) => {
                permit.record_failure();
                Err(PublishError::Broker(e.to_string()))
            }
        }
    }
}
