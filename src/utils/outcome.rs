use std::fmt;

// ============================================================================
// Dependency Outcome - Classified result of one remote call attempt
// ============================================================================
//
// Remote failures are classified once, at the caller boundary, and then flow
// unchanged through the retry loop and the breaker bookkeeping:
//
// - Success:           the dependency answered with the requested entity
// - NotFound:          the referenced entity does not exist (terminal)
// - Unavailable:       timeout, 5xx or connection failure (retryable)
// - RejectedByBreaker: the call was never attempted because the breaker is open
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DependencyOutcome<T> {
    Success(T),
    NotFound,
    Unavailable(String),
    RejectedByBreaker,
}

/// Payload-free tag of an outcome, used for logging, metrics and observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    NotFound,
    Unavailable,
    RejectedByBreaker,
}

impl<T> DependencyOutcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DependencyOutcome::Success(_) => OutcomeKind::Success,
            DependencyOutcome::NotFound => OutcomeKind::NotFound,
            DependencyOutcome::Unavailable(_) => OutcomeKind::Unavailable,
            DependencyOutcome::RejectedByBreaker => OutcomeKind::RejectedByBreaker,
        }
    }

    /// Only `Unavailable` is worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, DependencyOutcome::Unavailable(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> DependencyOutcome<U> {
        match self {
            DependencyOutcome::Success(value) => DependencyOutcome::Success(f(value)),
            DependencyOutcome::NotFound => DependencyOutcome::NotFound,
            DependencyOutcome::Unavailable(reason) => DependencyOutcome::Unavailable(reason),
            DependencyOutcome::RejectedByBreaker => DependencyOutcome::RejectedByBreaker,
        }
    }
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::Unavailable => "unavailable",
            OutcomeKind::RejectedByBreaker => "rejected_by_breaker",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
