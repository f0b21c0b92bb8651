// Private module declarations
mod errors;
mod guard;
mod handlers;

use actix_web::{error::InternalError, middleware::from_fn, web, HttpResponse};

// Re-export for public API
pub use guard::{require_trusted_header, TrustBoundary, UNAUTHORIZED_BODY};

// ============================================================================
// Inbound HTTP surface
// ============================================================================
//
// GET    /orders               200 list
// GET    /orders/{id}          200 | 404
// GET    /orders/{id}/details  200 | 404 | 503
// POST   /orders               201 | 400 | 404 | 500 | 503
// PUT    /orders/{id}          200 | 400 | 404 | 500
// DELETE /orders/{id}          204 | 404
//
// Every route sits behind the trust-boundary header check (401).
// The caller registers `web::Data<OrderOrchestrator>` and
// `web::Data<TrustBoundary>` on the App.
//
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/orders")
            .wrap(from_fn(require_trusted_header))
            .route("", web::get().to(handlers::list_orders))
            .route("", web::post().to(handlers::create_order))
            .route("/{id}", web::get().to(handlers::get_order))
            .route("/{id}", web::put().to(handlers::update_order))
            .route("/{id}", web::delete().to(handlers::delete_order))
            .route("/{id}/details", web::get().to(handlers::order_details)),
    );
}

/// Malformed JSON bodies answer 400 in the same shape as validation errors
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        tracing::warn!(error = %message, "🚫 Rejected malformed request body");
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "error": "validation_error",
            "message": message,
        }));
        InternalError::from_response(err, response).into()
    })
}
