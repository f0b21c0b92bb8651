use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::circuit_breaker::CircuitBreaker;
use super::observer::RetryObserver;
use super::outcome::{DependencyOutcome, OutcomeKind};

// ============================================================================
// Exponential Backoff Retry Policy
// ============================================================================
//
// Bounded retry-with-backoff around a single dependency call, consulting the
// circuit breaker before every attempt:
//
// - breaker rejects        -> RejectedByBreaker immediately, no waiting
// - call abandoned         -> the dropped permit settles a half-open trial
//                             as a failure
// - Success                -> recorded as success, returned
// - NotFound               -> terminal, returned without retry
// - Unavailable            -> recorded as failure, retried until the budget
//                             is spent, then returned as Unavailable
//
// The backoff sleep only suspends the calling task.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, first call included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Random spread applied to each delay, as a fraction in [0, 1)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64);
        next.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = rand::rng().random_range(-self.jitter..=self.jitter);
        Duration::from_millis(((delay.as_millis() as f64) * (1.0 + spread)).max(0.0) as u64)
    }
}

/// State of one `execute` call, handed to observers after each attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub elapsed_backoff: Duration,
    pub last_outcome: OutcomeKind,
}

pub struct RetryPolicy {
    config: RetryConfig,
    breaker: Arc<CircuitBreaker>,
    observers: Vec<Arc<dyn RetryObserver>>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            config,
            breaker,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn finish(&self, dependency: &str, attempts: u32, outcome: OutcomeKind) {
        for observer in &self.observers {
            observer.on_finished(dependency, attempts, outcome);
        }
    }

    /// Run `operation` against `dependency` under the retry budget.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn execute<F, Fut, T>(&self, dependency: &str, mut operation: F) -> DependencyOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DependencyOutcome<T>>,
    {
        let mut attempt = RetryAttempt {
            attempt: 0,
            elapsed_backoff: Duration::ZERO,
            last_outcome: OutcomeKind::Unavailable,
        };
        let mut delay = self.config.initial_delay;

        loop {
            let Some(permit) = self.breaker.allow(dependency) else {
                self.finish(dependency, attempt.attempt, OutcomeKind::RejectedByBreaker);
                return DependencyOutcome::RejectedByBreaker;
            };

            attempt.attempt += 1;
            // If this future is dropped mid-call the permit settles itself
            let outcome = operation(attempt.attempt).await;
            attempt.last_outcome = outcome.kind();

            match &outcome {
                // The dependency answered, so it counts as healthy
                DependencyOutcome::Success(_) | DependencyOutcome::NotFound => permit.record_success(),
                DependencyOutcome::Unavailable(_) | DependencyOutcome::RejectedByBreaker => permit.record_failure(),
            }

            for observer in &self.observers {
                observer.on_attempt(dependency, &attempt);
            }

            if !outcome.is_transient() || attempt.attempt >= self.config.max_attempts {
                self.finish(dependency, attempt.attempt, attempt.last_outcome);
                return outcome;
            }

            let wait = self.config.jittered(delay);
            for observer in &self.observers {
                observer.on_retry(dependency, &attempt, wait);
            }

            sleep(wait).await;
            attempt.elapsed_backoff += wait;
            delay = self.config.next_delay(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingObserver {
        attempts: StdMutex<Vec<RetryAttempt>>,
        finished: StdMutex<Vec<(u32, OutcomeKind)>>,
    }

    impl RetryObserver for RecordingObserver {
        fn on_attempt(&self, _dependency: &str, attempt: &RetryAttempt) {
            self.attempts.lock().unwrap().push(attempt.clone());
        }

        fn on_finished(&self, _dependency: &str, attempts: u32, outcome: OutcomeKind) {
            self.finished.lock().unwrap().push((attempts, outcome));
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    fn lenient_breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            sliding_window_size: 100,
            minimum_calls: 100,
            ..CircuitBreakerConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(fast_retry(3), lenient_breaker());

        let result = policy
            .execute("users", |_attempt| {
                let counter = counter.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        DependencyOutcome::Unavailable("temporary failure".into())
                    } else {
                        DependencyOutcome::Success("success")
                    }
                }
            })
            .await;

        assert_eq!(result, DependencyOutcome::Success("success"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_fails_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let observer = Arc::new(RecordingObserver::default());
        let policy = RetryPolicy::new(fast_retry(4), lenient_breaker()).with_observer(observer.clone());

        let result: DependencyOutcome<()> = policy
            .execute("users", |_attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    DependencyOutcome::Unavailable("503".into())
                }
            })
            .await;

        assert_eq!(result.kind(), OutcomeKind::Unavailable);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(*observer.finished.lock().unwrap(), vec![(4, OutcomeKind::Unavailable)]);

        // 10ms + 20ms + 40ms of backoff before the last attempt
        let attempts = observer.attempts.lock().unwrap();
        assert_eq!(attempts.last().unwrap().elapsed_backoff, Duration::from_millis(70));
    }

    #[tokio::test]
    async fn test_not_found_is_never_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let breaker = lenient_breaker();
        let policy = RetryPolicy::new(fast_retry(3), breaker.clone());

        let result: DependencyOutcome<()> = policy
            .execute("users", |_attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    DependencyOutcome::NotFound
                }
            })
            .await;

        assert_eq!(result, DependencyOutcome::NotFound);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.failure_rate("users"), 0.0);
    }

    #[tokio::test]
    async fn test_every_unavailable_attempt_is_reported_to_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            sliding_window_size: 10,
            minimum_calls: 10,
            ..CircuitBreakerConfig::default()
        }));
        let policy = RetryPolicy::new(fast_retry(3), breaker.clone());

        let _: DependencyOutcome<()> = policy
            .execute("users", |attempt| async move {
                if attempt < 3 {
                    DependencyOutcome::Unavailable("timeout".into())
                } else {
                    DependencyOutcome::Success(())
                }
            })
            .await;

        let rate = breaker.failure_rate("users");
        assert!((rate - 200.0 / 3.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_open_breaker_short_circuits_without_calling() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            sliding_window_size: 2,
            minimum_calls: 2,
            failure_rate_threshold: 100.0,
            open_cooldown: Duration::from_secs(60),
            ..CircuitBreakerConfig::default()
        }));
        let counter = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(fast_retry(5), breaker.clone());

        let first: DependencyOutcome<()> = policy
            .execute("users", |_attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    DependencyOutcome::Unavailable("connection refused".into())
                }
            })
            .await;

        // Breaker opened after the second attempt; the third was never made
        assert_eq!(first, DependencyOutcome::RejectedByBreaker);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state("users"), CircuitState::Open);

        let second: DependencyOutcome<()> = policy
            .execute("users", |_attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    DependencyOutcome::Success(())
                }
            })
            .await;

        assert_eq!(second, DependencyOutcome::RejectedByBreaker);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = fast_retry(10);
        let mut delay = config.initial_delay;
        for _ in 0..10 {
            delay = config.next_delay(delay);
        }
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let config = RetryConfig {
            jitter: 0.5,
            ..fast_retry(3)
        };
        for _ in 0..50 {
            let delay = config.jittered(Duration::from_millis(100));
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_cancelled_trial_call_does_not_lock_out_dependency() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            sliding_window_size: 2,
            minimum_calls: 2,
            failure_rate_threshold: 100.0,
            open_cooldown: Duration::from_millis(50),
            half_open_success_threshold: 1,
            half_open_max_concurrent: 1,
        }));
        let policy = RetryPolicy::new(fast_retry(1), breaker.clone());

        for _ in 0..2 {
            let _: DependencyOutcome<()> = policy
                .execute("users", |_attempt| async { DependencyOutcome::Unavailable("down".into()) })
                .await;
        }
        assert_eq!(breaker.state("users"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // The trial call hangs and its caller gives up
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            policy.execute("users", |_attempt| async {
                sleep(Duration::from_secs(5)).await;
                DependencyOutcome::Success(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(breaker.state("users"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let recovered = policy
            .execute("users", |_attempt| async { DependencyOutcome::Success("back") })
            .await;
        assert_eq!(recovered, DependencyOutcome::Success("back"));
        assert_eq!(breaker.state("users"), CircuitState::Closed);
    }
}
