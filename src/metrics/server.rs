use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::utils::{CircuitBreaker, CircuitState};

const SERVICE_NAME: &str = "orders-service";

/// Start the operational HTTP server: Prometheus scrape on `/metrics`,
/// per-dependency breaker view on `/health`.
pub async fn start_metrics_server(
    registry: Arc<Registry>,
    breaker: Arc<CircuitBreaker>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::from(breaker.clone()))
            .configure(configure)
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    service: &'static str,
    dependencies: BTreeMap<String, CircuitState>,
}

// The process is up either way; an open circuit only degrades it.
async fn health_handler(breaker: web::Data<CircuitBreaker>) -> impl Responder {
    let dependencies: BTreeMap<_, _> = breaker.snapshot().into_iter().collect();
    let status = if dependencies.values().all(|s| *s == CircuitState::Closed) {
        "UP"
    } else {
        "DEGRADED"
    };

    HttpResponse::Ok().json(HealthReport {
        status,
        service: SERVICE_NAME,
        dependencies,
    })
}
