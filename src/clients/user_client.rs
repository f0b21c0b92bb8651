use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::RemoteCaller;
use crate::models::UserDto;
use crate::utils::DependencyOutcome;

/// Marker header asserting a request came through the trusted front door
pub const GATEWAY_HEADER: &str = "X-From-Gateway";

// ============================================================================
// HTTP Users Client
// ============================================================================

pub struct HttpUserClient {
    client: Client,
    base_url: String,
}

impl HttpUserClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn user_url(&self, user_id: i64) -> String {
        format!("{}/users/{}", self.base_url, user_id)
    }
}

#[async_trait]
impl RemoteCaller for HttpUserClient {
    async fn get_user(&self, user_id: i64) -> DependencyOutcome<UserDto> {
        let url = self.user_url(user_id);
        tracing::debug!(user_id = user_id, url = %url, "🧾 Looking up user");

        let response = match self
            .client
            .get(&url)
            .header(GATEWAY_HEADER, "true")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("timeout: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                return DependencyOutcome::Unavailable(reason);
            }
        };

        match response.status() {
            status if status.is_success() => match response.json::<UserDto>().await {
                Ok(user) => DependencyOutcome::Success(user),
                Err(e) => DependencyOutcome::Unavailable(format!("invalid user payload: {}", e)),
            },
            StatusCode::NOT_FOUND => DependencyOutcome::NotFound,
            status => DependencyOutcome::Unavailable(format!("users service responded {}", status)),
        }
    }
}
