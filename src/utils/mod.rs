pub mod circuit_breaker;
pub mod observer;
pub mod outcome;
pub mod retry;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use observer::{BreakerObserver, RetryObserver, TracingObserver};
pub use outcome::{DependencyOutcome, OutcomeKind};
pub use retry::{RetryAttempt, RetryConfig, RetryPolicy};
