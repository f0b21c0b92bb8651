use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::domain::order::OrderError;

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::ReferenceNotFound(_) | OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::DependencyUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OrderError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details stay in the logs
        let message = match self {
            OrderError::Persistence(_) => "Internal error while storing the order".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}
