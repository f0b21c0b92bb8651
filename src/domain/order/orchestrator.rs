use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{OrderError, UnavailableCause};
use crate::clients::RemoteCaller;
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::models::{Order, OrderCreatedEvent, OrderDetails, OrderDto, OrderInput, UserDto};
use crate::store::{OrderStore, StoreError};
use crate::utils::{DependencyOutcome, RetryPolicy};

/// Breaker / retry name of the users service
pub const USERS_DEPENDENCY: &str = "users-service";

// ============================================================================
// Order Orchestrator
// ============================================================================
//
// Orchestrates a dependent write:
//   validate fields -> RetryPolicy(CircuitBreaker(RemoteCaller)) -> Store -> EventPublisher
//
// The write happens only after the referenced user is confirmed to exist.
// The notification is spawned only after the write commits; it neither
// delays nor changes the result of the write.
//
// ============================================================================

pub struct OrderOrchestrator {
    store: Arc<dyn OrderStore>,
    users: Arc<dyn RemoteCaller>,
    retry: Arc<RetryPolicy>,
    publisher: Arc<dyn EventPublisher>,
    store_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl OrderOrchestrator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        users: Arc<dyn RemoteCaller>,
        retry: Arc<RetryPolicy>,
        publisher: Arc<dyn EventPublisher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            users,
            retry,
            publisher,
            store_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(OrderError::from),
            Err(_) => Err(OrderError::Persistence(StoreError::Timeout(operation))),
        }
    }

    fn rejected(&self, operation: &str, err: OrderError) -> OrderError {
        if let Some(metrics) = &self.metrics {
            metrics.record_order_rejected(operation, err.kind());
        }
        err
    }

    /// Confirm the referenced user exists, through retry and breaker
    async fn fetch_user(&self, user_id: i64) -> Result<UserDto, OrderError> {
        let users = self.users.clone();
        let outcome = self
            .retry
            .execute(USERS_DEPENDENCY, |_attempt| {
                let users = users.clone();
                async move { users.get_user(user_id).await }
            })
            .await;

        match outcome {
            DependencyOutcome::Success(user) => Ok(user),
            DependencyOutcome::NotFound => {
                tracing::warn!(user_id = user_id, "⚠️ User not found in users-service (404)");
                Err(OrderError::ReferenceNotFound(user_id))
            }
            DependencyOutcome::Unavailable(reason) => {
                tracing::error!(user_id = user_id, reason = %reason, "💥 Users-service unavailable after retries");
                Err(OrderError::DependencyUnavailable {
                    dependency: USERS_DEPENDENCY.to_string(),
                    cause: UnavailableCause::RetriesExhausted(reason),
                })
            }
            DependencyOutcome::RejectedByBreaker => {
                tracing::warn!(user_id = user_id, "🚧 Users-service circuit open, failing fast");
                Err(OrderError::DependencyUnavailable {
                    dependency: USERS_DEPENDENCY.to_string(),
                    cause: UnavailableCause::BreakerOpen,
                })
            }
        }
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        tracing::debug!("📋 Fetching all orders");
        self.bounded("find_all", self.store.find_all()).await
    }

    pub async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        tracing::debug!(order_id = id, "🔍 Searching for order");
        self.bounded("find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    /// The order together with its referenced user
    pub async fn order_details(&self, id: i64) -> Result<OrderDetails, OrderError> {
        let order = self.get_order(id).await?;
        let user = self.fetch_user(order.user_id).await?;

        tracing::info!(order_id = id, user_id = user.id, "🔗 Combined order and user");
        Ok(OrderDetails {
            order: OrderDto::from(&order),
            user,
        })
    }

    pub async fn create_order(&self, input: &OrderInput) -> Result<Order, OrderError> {
        // 1. Structural validation, before any remote or store call
        let new_order = input.validate().map_err(|e| self.rejected("create", e))?;

        // 2. Referenced user must exist
        tracing::info!(user_id = new_order.user_id, "🧾 Checking user via users-service");
        self.fetch_user(new_order.user_id)
            .await
            .map_err(|e| self.rejected("create", e))?;

        // 3. Commit
        let order = self
            .bounded("insert", self.store.insert(new_order))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to persist order");
                self.rejected("create", e)
            })?;

        tracing::info!(order_id = order.id, user_id = order.user_id, "✅ Order committed");
        if let Some(metrics) = &self.metrics {
            metrics.record_order_committed("create");
        }

        // 4. Notify in the background; the write already stands
        let event = OrderCreatedEvent::from_order(&order);
        tokio::spawn(publish_created(self.publisher.clone(), self.metrics.clone(), event));

        Ok(order)
    }

    /// Overwrite an existing order. The user reference is not re-validated.
    pub async fn update_order(&self, id: i64, input: &OrderInput) -> Result<Order, OrderError> {
        let fields = input.validate().map_err(|e| self.rejected("update", e))?;

        tracing::info!(order_id = id, "✏️ Updating order");
        let mut order = self
            .bounded("find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| self.rejected("update", OrderError::NotFound(id)))?;

        order.user_id = fields.user_id;
        order.product_name = fields.product_name;
        order.price = fields.price;

        if !self.bounded("update", self.store.update(&order)).await? {
            return Err(self.rejected("update", OrderError::NotFound(id)));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_order_committed("update");
        }
        Ok(order)
    }

    pub async fn delete_order(&self, id: i64) -> Result<(), OrderError> {
        tracing::info!(order_id = id, "🗑️ Deleting order");
        if !self.bounded("delete", self.store.delete(id)).await? {
            return Err(self.rejected("delete", OrderError::NotFound(id)));
        }

        tracing::info!(order_id = id, "✅ Order deleted");
        Ok(())
    }
}

/// Publishes one `OrderCreated` event off the request path. Failures are
/// logged and counted only.
async fn publish_created(publisher: Arc<dyn EventPublisher>, metrics: Option<Arc<Metrics>>, event: OrderCreatedEvent) {
    let published = match publisher.publish(&event).await {
        Ok(()) => {
            tracing::info!(order_id = event.order_id, event_id = %event.event_id, "📨 OrderCreated event published");
            true
        }
        Err(e) => {
            tracing::error!(order_id = event.order_id, error = %e, "💥 Failed to publish OrderCreated event");
            false
        }
    };

    if let Some(metrics) = &metrics {
        metrics.record_publish(published);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    use crate::messaging::PublishError;
    use crate::models::NewOrder;
    use crate::store::InMemoryOrderStore;
    use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig};

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    #[derive(Clone, Copy)]
    enum UsersBehaviour {
        Exists,
        Missing,
        Down,
    }

    struct MockUsers {
        behaviour: StdMutex<UsersBehaviour>,
        calls: AtomicU32,
    }

    impl MockUsers {
        fn new(behaviour: UsersBehaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour: StdMutex::new(behaviour),
                calls: AtomicU32::new(0),
            })
        }

        fn set(&self, behaviour: UsersBehaviour) {
            *self.behaviour.lock().unwrap() = behaviour;
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteCaller for MockUsers {
        async fn get_user(&self, user_id: i64) -> DependencyOutcome<UserDto> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behaviour = *self.behaviour.lock().unwrap();
            match behaviour {
                UsersBehaviour::Exists => DependencyOutcome::Success(UserDto {
                    id: user_id,
                    name: "Ana".to_string(),
                    email: "ana@example.com".to_string(),
                }),
                UsersBehaviour::Missing => DependencyOutcome::NotFound,
                UsersBehaviour::Down => DependencyOutcome::Unavailable("users service responded 503".into()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: StdMutex<Vec<OrderCreatedEvent>>,
        attempts: AtomicU32,
        fail: bool,
        delay: Duration,
    }

    impl RecordingPublisher {
        /// Waits for the background publish to land
        async fn wait_for_attempts(&self, expected: u32) {
            for _ in 0..100 {
                if self.attempts.load(Ordering::SeqCst) >= expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("expected {} publish attempts", expected);
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &OrderCreatedEvent) -> Result<(), PublishError> {
            tokio::time::sleep(self.delay).await;
            let result = if self.fail {
                Err(PublishError::Broker("broker down".to_string()))
            } else {
                self.events.lock().unwrap().push(event.clone());
                Ok(())
            };
            self.attempts.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    struct FailingStore;

    #[async_trait]
    impl OrderStore for FailingStore {
        async fn find_all(&self) -> Result<Vec<Order>, StoreError> {
            Err(StoreError::Timeout("find_all"))
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<Order>, StoreError> {
            Err(StoreError::Timeout("find_by_id"))
        }

        async fn insert(&self, _order: NewOrder) -> Result<Order, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn update(&self, _order: &Order) -> Result<bool, StoreError> {
            Err(StoreError::Timeout("update"))
        }

        async fn delete(&self, _id: i64) -> Result<bool, StoreError> {
            Err(StoreError::Timeout("delete"))
        }
    }

    struct Harness {
        orchestrator: OrderOrchestrator,
        users: Arc<MockUsers>,
        store: Arc<InMemoryOrderStore>,
        publisher: Arc<RecordingPublisher>,
        breaker: Arc<CircuitBreaker>,
    }

    const MAX_ATTEMPTS: u32 = 3;

    fn harness_with(behaviour: UsersBehaviour, breaker_config: CircuitBreakerConfig, publisher: RecordingPublisher) -> Harness {
        let users = MockUsers::new(behaviour);
        let store = Arc::new(InMemoryOrderStore::new());
        let publisher = Arc::new(publisher);
        let breaker = Arc::new(CircuitBreaker::new(breaker_config));
        let retry = Arc::new(RetryPolicy::new(
            RetryConfig {
                max_attempts: MAX_ATTEMPTS,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
                jitter: 0.0,
            },
            breaker.clone(),
        ));

        let orchestrator = OrderOrchestrator::new(
            store.clone(),
            users.clone(),
            retry,
            publisher.clone(),
            Duration::from_secs(1),
        );

        Harness {
            orchestrator,
            users,
            store,
            publisher,
            breaker,
        }
    }

    fn harness(behaviour: UsersBehaviour) -> Harness {
        let lenient = CircuitBreakerConfig {
            sliding_window_size: 100,
            minimum_calls: 100,
            ..CircuitBreakerConfig::default()
        };
        harness_with(behaviour, lenient, RecordingPublisher::default())
    }

    fn input(user_id: i64, name: &str, price: &str) -> OrderInput {
        OrderInput {
            user_id: Some(user_id),
            product_name: Some(name.to_string()),
            price: Some(Decimal::from_str(price).unwrap()),
        }
    }

    // ------------------------------------------------------------------------
    // createOrder
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_order_commits_and_publishes_once() {
        let h = harness(UsersBehaviour::Exists);

        let order = h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();

        assert_eq!(order.user_id, 1);
        assert_eq!(order.price, Decimal::from_str("19.99").unwrap());
        assert_eq!(h.store.find_by_id(order.id).await.unwrap(), Some(order.clone()));

        h.publisher.wait_for_attempts(1).await;
        let events = h.publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, order.id);
        assert_eq!(events[0].user_id, 1);
        assert_eq!(events[0].product_name, "Mouse");
    }

    #[tokio::test]
    async fn test_missing_user_is_reference_not_found_without_write() {
        let h = harness(UsersBehaviour::Missing);

        let err = h.orchestrator.create_order(&input(999, "Mouse", "19.99")).await.unwrap_err();

        assert!(matches!(err, OrderError::ReferenceNotFound(999)));
        assert_eq!(err.to_string(), "User not found with ID 999");
        assert_eq!(h.users.calls(), 1);
        assert!(h.store.is_empty().await);
        assert!(h.publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_user_service_exhausts_retries_without_write() {
        let h = harness(UsersBehaviour::Down);

        let err = h.orchestrator.create_order(&input(5, "Tablet", "299.99")).await.unwrap_err();

        assert!(matches!(
            err,
            OrderError::DependencyUnavailable {
                cause: UnavailableCause::RetriesExhausted(_),
                ..
            }
        ));
        assert_eq!(h.users.calls(), MAX_ATTEMPTS);
        assert!(h.store.is_empty().await);
        assert!(h.publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_never_calls_users_service() {
        let h = harness(UsersBehaviour::Exists);

        let short_name = h.orchestrator.create_order(&input(1, "M", "19.99")).await.unwrap_err();
        let zero_price = h.orchestrator.create_order(&input(1, "Mouse", "0")).await.unwrap_err();
        let negative_price = h.orchestrator.create_order(&input(1, "Mouse", "-1.50")).await.unwrap_err();

        assert!(matches!(short_name, OrderError::Validation(_)));
        assert!(matches!(zero_price, OrderError::Validation(_)));
        assert!(matches!(negative_price, OrderError::Validation(_)));
        assert_eq!(h.users.calls(), 0);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_committed_write() {
        let h = harness_with(
            UsersBehaviour::Exists,
            CircuitBreakerConfig::default(),
            RecordingPublisher {
                fail: true,
                ..Default::default()
            },
        );

        let order = h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();

        h.publisher.wait_for_attempts(1).await;
        assert!(h.store.find_by_id(order.id).await.unwrap().is_some());
        assert!(h.publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_publisher_does_not_delay_create() {
        let h = harness_with(
            UsersBehaviour::Exists,
            CircuitBreakerConfig::default(),
            RecordingPublisher {
                delay: Duration::from_secs(2),
                ..Default::default()
            },
        );

        let order = tokio::time::timeout(
            Duration::from_millis(500),
            h.orchestrator.create_order(&input(1, "Mouse", "19.99")),
        )
        .await
        .expect("create_order waited for the publisher")
        .unwrap();

        assert!(h.store.find_by_id(order.id).await.unwrap().is_some());
        assert_eq!(h.publisher.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_publishes_nothing() {
        let users = MockUsers::new(UsersBehaviour::Exists);
        let publisher = Arc::new(RecordingPublisher::default());
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let orchestrator = OrderOrchestrator::new(
            Arc::new(FailingStore),
            users,
            Arc::new(RetryPolicy::new(RetryConfig::default(), breaker)),
            publisher.clone(),
            Duration::from_secs(1),
        );

        let err = orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap_err();

        assert!(matches!(err, OrderError::Persistence(_)));
        assert!(publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast_then_recovers() {
        let h = harness_with(
            UsersBehaviour::Down,
            CircuitBreakerConfig {
                sliding_window_size: 3,
                minimum_calls: 3,
                failure_rate_threshold: 100.0,
                open_cooldown: Duration::from_millis(100),
                half_open_success_threshold: 1,
                half_open_max_concurrent: 1,
            },
            RecordingPublisher::default(),
        );

        // Three live failures open the breaker
        let err = h.orchestrator.create_order(&input(5, "Tablet", "299.99")).await.unwrap_err();
        assert!(matches!(err, OrderError::DependencyUnavailable { .. }));
        assert_eq!(h.users.calls(), 3);
        assert_eq!(h.breaker.state(USERS_DEPENDENCY), CircuitState::Open);

        // Within the cool-down nothing reaches the users service
        let err = h.orchestrator.create_order(&input(5, "Tablet", "299.99")).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::DependencyUnavailable {
                cause: UnavailableCause::BreakerOpen,
                ..
            }
        ));
        assert_eq!(h.users.calls(), 3);

        // After the cool-down a single trial succeeds and closes the breaker
        tokio::time::sleep(Duration::from_millis(150)).await;
        h.users.set(UsersBehaviour::Exists);
        let order = h.orchestrator.create_order(&input(5, "Tablet", "299.99")).await.unwrap();

        assert_eq!(h.users.calls(), 4);
        assert_eq!(h.breaker.state(USERS_DEPENDENCY), CircuitState::Closed);
        assert!(h.store.find_by_id(order.id).await.unwrap().is_some());
        assert_eq!(h.store.len().await, 1);
    }

    // ------------------------------------------------------------------------
    // update / delete / reads
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_overwrites_without_remote_validation() {
        let h = harness(UsersBehaviour::Exists);
        let order = h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();
        h.users.set(UsersBehaviour::Down);

        let updated = h
            .orchestrator
            .update_order(order.id, &input(2, "Keyboard", "49.50"))
            .await
            .unwrap();

        assert_eq!(updated.id, order.id);
        assert_eq!(updated.user_id, 2);
        assert_eq!(updated.product_name, "Keyboard");
        assert_eq!(h.users.calls(), 1);
        assert_eq!(h.orchestrator.get_order(order.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let h = harness(UsersBehaviour::Exists);

        let err = h.orchestrator.update_order(42, &input(1, "Mouse", "19.99")).await.unwrap_err();

        assert!(matches!(err, OrderError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_delete_order() {
        let h = harness(UsersBehaviour::Exists);
        let order = h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();

        h.orchestrator.delete_order(order.id).await.unwrap();

        assert!(h.store.is_empty().await);
        assert!(matches!(
            h.orchestrator.delete_order(order.id).await.unwrap_err(),
            OrderError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_order_details_combines_order_and_user() {
        let h = harness(UsersBehaviour::Exists);
        let order = h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();

        let details = h.orchestrator.order_details(order.id).await.unwrap();

        assert_eq!(details.order, OrderDto::from(&order));
        assert_eq!(details.user.id, 1);
        assert!(matches!(
            h.orchestrator.order_details(404).await.unwrap_err(),
            OrderError::NotFound(404)
        ));
    }

    #[tokio::test]
    async fn test_list_orders() {
        let h = harness(UsersBehaviour::Exists);
        h.orchestrator.create_order(&input(1, "Mouse", "19.99")).await.unwrap();
        h.orchestrator.create_order(&input(1, "Keyboard", "49.99")).await.unwrap();

        let orders = h.orchestrator.list_orders().await.unwrap();

        assert_eq!(orders.len(), 2);
    }
}
