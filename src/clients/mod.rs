// Private module declaration
mod user_client;

use async_trait::async_trait;

use crate::models::UserDto;
use crate::utils::DependencyOutcome;

// Re-export for public API
pub use user_client::{HttpUserClient, GATEWAY_HEADER};

// ============================================================================
// Remote Caller - One synchronous call to the users service
// ============================================================================
//
// Implementations classify failures themselves: a 404 is `NotFound`, while
// timeouts, connection errors and 5xx responses are `Unavailable`. They never
// return `RejectedByBreaker`; that outcome belongs to the retry policy.
//
// ============================================================================

#[async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn get_user(&self, user_id: i64) -> DependencyOutcome<UserDto>;
}
