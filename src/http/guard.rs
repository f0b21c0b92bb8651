use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::HeaderMap,
    middleware::Next,
    web, HttpResponse,
};

use crate::clients::GATEWAY_HEADER;

pub const UNAUTHORIZED_BODY: &str = "401 Unauthorized – Access only through API Gateway";

/// Marker header every inbound request must carry
#[derive(Debug, Clone)]
pub struct TrustBoundary {
    header: String,
    value: String,
}

impl TrustBoundary {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }

    pub fn is_trusted(&self, headers: &HeaderMap) -> bool {
        headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case(&self.value))
            .unwrap_or(false)
    }
}

impl Default for TrustBoundary {
    fn default() -> Self {
        Self::new(GATEWAY_HEADER, "true")
    }
}

/// Rejects requests without the marker header. Fails closed when no
/// `TrustBoundary` is registered.
pub async fn require_trusted_header(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let trusted = req
        .app_data::<web::Data<TrustBoundary>>()
        .map(|boundary| boundary.is_trusted(req.headers()))
        .unwrap_or(false);

    if !trusted {
        tracing::warn!(path = %req.path(), "❌ Unauthorized access attempt");
        let response = HttpResponse::Unauthorized().body(UNAUTHORIZED_BODY);
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
