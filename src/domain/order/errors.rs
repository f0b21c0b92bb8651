use std::fmt;

use crate::store::StoreError;

// ============================================================================
// Order Errors
// ============================================================================

/// Why a dependency was reported unavailable. Both causes reach the client as
/// the same error; the distinction is kept for logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableCause {
    /// Live attempts failed until the retry budget ran out
    RetriesExhausted(String),
    /// The breaker was open and no call was made
    BreakerOpen,
}

impl fmt::Display for UnavailableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableCause::RetriesExhausted(reason) => write!(f, "retries exhausted: {}", reason),
            UnavailableCause::BreakerOpen => f.write_str("circuit breaker open"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found with ID {0}")]
    ReferenceNotFound(i64),

    #[error("{dependency} unavailable, please try again later")]
    DependencyUnavailable {
        dependency: String,
        cause: UnavailableCause,
    },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Order not found with ID {0}")]
    NotFound(i64),
}

impl OrderError {
    /// Short machine-readable name, used in response bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::ReferenceNotFound(_) => "reference_not_found",
            OrderError::DependencyUnavailable { .. } => "dependency_unavailable",
            OrderError::Persistence(_) => "persistence_error",
            OrderError::NotFound(_) => "not_found",
        }
    }
}
