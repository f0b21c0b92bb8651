use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::observer::BreakerObserver;

// ============================================================================
// Circuit Breaker Pattern Implementation
// ============================================================================
//
// Prevents cascading failures by tracking call outcomes per dependency and
// temporarily blocking calls when that dependency is unhealthy.
//
// States (kept separately for every dependency name):
// - Closed:   Normal operation, outcomes go into a count-based sliding window
// - Open:     Failure rate crossed the threshold, calls rejected immediately
// - HalfOpen: Cool-down elapsed, a bounded number of trial calls allowed
//
// Open -> HalfOpen is evaluated lazily by the next `allow`; there is no timer.
// Every admitted call carries a `CallPermit`; outcomes are reported through it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }

    /// Numeric encoding used by the state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept while closed
    pub sliding_window_size: usize,
    /// Outcomes required in the window before the failure rate is evaluated
    pub minimum_calls: usize,
    /// Failure percentage (0-100] at which the circuit opens
    pub failure_rate_threshold: f64,
    /// Time to stay open before trial calls are let through
    pub open_cooldown: Duration,
    /// Consecutive trial successes needed to close from half-open
    pub half_open_success_threshold: u32,
    /// Trial calls allowed in flight at the same time while half-open
    pub half_open_max_concurrent: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            open_cooldown: Duration::from_secs(10),
            half_open_success_threshold: 3,
            half_open_max_concurrent: 1,
        }
    }
}

/// Identifies one admitted call; outcomes are only counted against the
/// state epoch they were admitted in.
#[derive(Debug, Clone, Copy)]
struct Admission {
    epoch: u64,
    trial: bool,
}

type Transition = Option<(CircuitState, CircuitState)>;

struct DependencyCircuit {
    state: CircuitState,
    // Bumped on every state change
    epoch: u64,
    // true = failure
    window: VecDeque<bool>,
    failures_in_window: usize,
    half_open_successes: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
}

impl DependencyCircuit {
    fn new(window_size: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            epoch: 0,
            window: VecDeque::with_capacity(window_size),
            failures_in_window: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            opened_at: None,
        }
    }

    fn push_outcome(&mut self, failed: bool, window_size: usize) {
        self.window.push_back(failed);
        if failed {
            self.failures_in_window += 1;
        }
        while self.window.len() > window_size {
            if self.window.pop_front() == Some(true) {
                self.failures_in_window -= 1;
            }
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.failures_in_window as f64 * 100.0 / self.window.len() as f64
    }

    fn move_to(&mut self, to: CircuitState) -> Transition {
        let from = self.state;
        self.state = to;
        self.epoch += 1;
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;
        self.window.clear();
        self.failures_in_window = 0;
        self.opened_at = match to {
            CircuitState::Open => Some(Instant::now()),
            _ => None,
        };
        Some((from, to))
    }

    fn admit(&mut self, config: &CircuitBreakerConfig) -> (Option<Admission>, Transition) {
        let mut transition = None;

        if self.state == CircuitState::Open {
            let cooled_down = self
                .opened_at
                .map(|at| at.elapsed() >= config.open_cooldown)
                .unwrap_or(true);
            if cooled_down {
                transition = self.move_to(CircuitState::HalfOpen);
            }
        }

        let admission = match self.state {
            CircuitState::Closed => Some(Admission {
                epoch: self.epoch,
                trial: false,
            }),
            CircuitState::Open => None,
            CircuitState::HalfOpen if self.half_open_in_flight < config.half_open_max_concurrent => {
                self.half_open_in_flight += 1;
                Some(Admission {
                    epoch: self.epoch,
                    trial: true,
                })
            }
            CircuitState::HalfOpen => None,
        };

        (admission, transition)
    }

    fn settle(&mut self, admission: Admission, failed: bool, config: &CircuitBreakerConfig) -> Transition {
        if admission.epoch != self.epoch {
            // Admitted under an earlier state; its outcome says nothing about this one
            return None;
        }

        match self.state {
            CircuitState::Closed => {
                self.push_outcome(failed, config.sliding_window_size);
                if failed
                    && self.window.len() >= config.minimum_calls
                    && self.failure_rate() >= config.failure_rate_threshold
                {
                    return self.move_to(CircuitState::Open);
                }
                None
            }
            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                if failed {
                    return self.move_to(CircuitState::Open);
                }
                self.half_open_successes += 1;
                if self.half_open_successes >= config.half_open_success_threshold {
                    return self.move_to(CircuitState::Closed);
                }
                None
            }
            CircuitState::Open => None,
        }
    }
}

fn lock(circuit: &StdMutex<DependencyCircuit>) -> MutexGuard<'_, DependencyCircuit> {
    circuit.lock().unwrap_or_else(PoisonError::into_inner)
}

fn notify_transition(observers: &[Arc<dyn BreakerObserver>], dependency: &str, transition: Transition) {
    if let Some((from, to)) = transition {
        for observer in observers {
            observer.on_state_transition(dependency, from, to);
        }
    }
}

/// Admission ticket for one call, handed out by [`CircuitBreaker::allow`].
///
/// Report the outcome with `record_success` or `record_failure`. A half-open
/// trial permit dropped without an outcome (cancelled request, outer timeout)
/// counts as a failed trial and reopens the circuit, so its slot is never lost.
#[must_use = "dropping a half-open permit counts as a failed trial"]
pub struct CallPermit {
    dependency: String,
    circuit: Arc<StdMutex<DependencyCircuit>>,
    config: Arc<CircuitBreakerConfig>,
    observers: Arc<Vec<Arc<dyn BreakerObserver>>>,
    admission: Option<Admission>,
}

impl CallPermit {
    /// True when this call is one of the half-open trial calls
    pub fn is_trial(&self) -> bool {
        self.admission.map(|a| a.trial).unwrap_or(false)
    }

    pub fn record_success(mut self) {
        self.settle(false);
    }

    pub fn record_failure(mut self) {
        self.settle(true);
    }

    fn settle(&mut self, failed: bool) {
        let Some(admission) = self.admission.take() else {
            return;
        };
        let transition = lock(&self.circuit).settle(admission, failed, &self.config);
        notify_transition(&self.observers, &self.dependency, transition);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.is_trial() {
            tracing::warn!(dependency = %self.dependency, "Trial call abandoned, counting it as a failure");
            self.settle(true);
        }
    }
}

pub struct CircuitBreaker {
    circuits: StdMutex<HashMap<String, Arc<StdMutex<DependencyCircuit>>>>,
    config: Arc<CircuitBreakerConfig>,
    observers: Arc<Vec<Arc<dyn BreakerObserver>>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: StdMutex::new(HashMap::new()),
            config: Arc::new(config),
            observers: Arc::new(Vec::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        Arc::make_mut(&mut self.observers).push(observer);
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn circuit(&self, dependency: &str) -> Arc<StdMutex<DependencyCircuit>> {
        let mut circuits = self.circuits.lock().unwrap_or_else(PoisonError::into_inner);
        circuits
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(StdMutex::new(DependencyCircuit::new(self.config.sliding_window_size))))
            .clone()
    }

    /// Decide whether a call to `dependency` may go out right now.
    ///
    /// Returns `None` when the call must be rejected. While half-open, the
    /// returned permit holds one of the trial slots until it is settled or dropped.
    pub fn allow(&self, dependency: &str) -> Option<CallPermit> {
        let circuit = self.circuit(dependency);
        let (admission, transition) = lock(&circuit).admit(&self.config);

        notify_transition(&self.observers, dependency, transition);

        match admission {
            Some(admission) => Some(CallPermit {
                dependency: dependency.to_string(),
                circuit,
                config: self.config.clone(),
                observers: self.observers.clone(),
                admission: Some(admission),
            }),
            None => {
                for observer in self.observers.iter() {
                    observer.on_call_rejected(dependency);
                }
                None
            }
        }
    }

    /// Current state without evaluating the cool-down
    pub fn state(&self, dependency: &str) -> CircuitState {
        lock(&self.circuit(dependency)).state
    }

    /// Failure percentage over the current window (0 when empty)
    pub fn failure_rate(&self, dependency: &str) -> f64 {
        lock(&self.circuit(dependency)).failure_rate()
    }

    /// Snapshot of every dependency seen so far, sorted by name
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let circuits: Vec<_> = {
            let circuits = self.circuits.lock().unwrap_or_else(PoisonError::into_inner);
            circuits.iter().map(|(name, c)| (name.clone(), c.clone())).collect()
        };
        let mut states: Vec<_> = circuits
            .into_iter()
            .map(|(name, circuit)| {
                let state = lock(&circuit).state;
                (name, state)
            })
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
