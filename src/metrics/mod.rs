// Private module declaration
mod server;

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use std::time::Duration;

use crate::utils::{BreakerObserver, CircuitState, OutcomeKind, RetryAttempt, RetryObserver};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Dependency call outcomes (per dependency)
// - Retry attempts and final outcomes
// - Circuit breaker state and transitions (per dependency)
// - Orders created / rejected, events published / failed
//
// `Metrics` is also a breaker and retry observer, so resilience events are
// counted without the control logic knowing about Prometheus.
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Dependency Metrics
    pub dependency_calls_total: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_outcomes_total: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
    pub circuit_breaker_transitions: IntCounterVec,
    pub circuit_breaker_rejections: IntCounterVec,

    // Order Metrics
    pub orders_created: IntCounterVec,
    pub orders_rejected: IntCounterVec,
    pub events_published: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let dependency_calls_total = IntCounterVec::new(
            Opts::new("dependency_calls_total", "Remote dependency calls by outcome"),
            &["dependency", "outcome"],
        )?;
        registry.register(Box::new(dependency_calls_total.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["dependency", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_outcomes_total = IntCounterVec::new(
            Opts::new("retry_outcomes_total", "Final outcome handed back by the retry policy"),
            &["dependency", "outcome"],
        )?;
        registry.register(Box::new(retry_outcomes_total.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)"),
            &["dependency"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["dependency", "from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        let circuit_breaker_rejections = IntCounterVec::new(
            Opts::new("circuit_breaker_rejections_total", "Calls rejected by an open circuit"),
            &["dependency"],
        )?;
        registry.register(Box::new(circuit_breaker_rejections.clone()))?;

        // Order Metrics
        let orders_created = IntCounterVec::new(
            Opts::new("orders_created_total", "Orders committed"),
            &["operation"],
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_rejected = IntCounterVec::new(
            Opts::new("orders_rejected_total", "Order writes rejected by reason"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "OrderCreated events handed to the channel"),
            &["result"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        Ok(Self {
            registry,
            dependency_calls_total,
            retry_attempts_total,
            retry_outcomes_total,
            circuit_breaker_state,
            circuit_breaker_transitions,
            circuit_breaker_rejections,
            orders_created,
            orders_rejected,
            events_published,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_committed(&self, operation: &str) {
        self.orders_created.with_label_values(&[operation]).inc();
    }

    pub fn record_order_rejected(&self, operation: &str, reason: &str) {
        self.orders_rejected.with_label_values(&[operation, reason]).inc();
    }

    pub fn record_publish(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.events_published.with_label_values(&[result]).inc();
    }
}

impl BreakerObserver for Metrics {
    fn on_state_transition(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        self.circuit_breaker_state
            .with_label_values(&[dependency])
            .set(to.as_gauge());
        self.circuit_breaker_transitions
            .with_label_values(&[dependency, from.as_str(), to.as_str()])
            .inc();
    }

    fn on_call_rejected(&self, dependency: &str) {
        self.circuit_breaker_rejections.with_label_values(&[dependency]).inc();
    }
}

impl RetryObserver for Metrics {
    fn on_attempt(&self, dependency: &str, attempt: &RetryAttempt) {
        self.dependency_calls_total
            .with_label_values(&[dependency, attempt.last_outcome.as_str()])
            .inc();
    }

    fn on_retry(&self, dependency: &str, attempt: &RetryAttempt, _delay: Duration) {
        let attempt_label = attempt.attempt.to_string();
        self.retry_attempts_total
            .with_label_values(&[dependency, attempt_label.as_str()])
            .inc();
    }

    fn on_finished(&self, dependency: &str, _attempts: u32, outcome: OutcomeKind) {
        self.retry_outcomes_total
            .with_label_values(&[dependency, outcome.as_str()])
            .inc();
    }
}
