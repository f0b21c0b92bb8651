use std::time::Duration;

use super::circuit_breaker::CircuitState;
use super::outcome::OutcomeKind;
use super::retry::RetryAttempt;

// ============================================================================
// Resilience Observers
// ============================================================================
//
// The breaker and the retry policy report what happened to a list of
// observers instead of logging inline. Observers are invoked after the
// breaker's lock is released and must return quickly: they see a transition,
// they never take part in it.
//
// ============================================================================

pub trait BreakerObserver: Send + Sync {
    fn on_state_transition(&self, dependency: &str, from: CircuitState, to: CircuitState);

    fn on_call_rejected(&self, _dependency: &str) {}
}

pub trait RetryObserver: Send + Sync {
    /// Called after every attempt that actually reached the dependency
    fn on_attempt(&self, _dependency: &str, _attempt: &RetryAttempt) {}

    /// Called when another attempt will follow after `delay`
    fn on_retry(&self, _dependency: &str, _attempt: &RetryAttempt, _delay: Duration) {}

    /// Called once per `execute` with the outcome handed back to the caller
    fn on_finished(&self, _dependency: &str, _attempts: u32, _outcome: OutcomeKind) {}
}

/// Logs every breaker and retry event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BreakerObserver for TracingObserver {
    fn on_state_transition(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                dependency = %dependency,
                from = %from,
                to = %to,
                "🛡️ Circuit breaker state transition"
            ),
            _ => tracing::info!(
                dependency = %dependency,
                from = %from,
                to = %to,
                "🛡️ Circuit breaker state transition"
            ),
        }
    }

    fn on_call_rejected(&self, dependency: &str) {
        tracing::warn!(dependency = %dependency, "🚧 Call rejected, circuit breaker is open");
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt(&self, dependency: &str, attempt: &RetryAttempt) {
        tracing::debug!(
            dependency = %dependency,
            attempt = attempt.attempt,
            outcome = %attempt.last_outcome,
            "Dependency call attempted"
        );
    }

    fn on_retry(&self, dependency: &str, attempt: &RetryAttempt, delay: Duration) {
        tracing::warn!(
            dependency = %dependency,
            attempt = attempt.attempt,
            outcome = %attempt.last_outcome,
            delay_ms = delay.as_millis() as u64,
            "🔁 Transient failure, retrying after delay"
        );
    }

    fn on_finished(&self, dependency: &str, attempts: u32, outcome: OutcomeKind) {
        match outcome {
            OutcomeKind::Success if attempts > 1 => tracing::info!(
                dependency = %dependency,
                attempts = attempts,
                "🎯 Operation succeeded after retry"
            ),
            OutcomeKind::Unavailable => tracing::error!(
                dependency = %dependency,
                attempts = attempts,
                "Operation failed after all retries"
            ),
            _ => {}
        }
    }
}
