use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orders_service::clients::{HttpUserClient, RemoteCaller};
use orders_service::http::{self, TrustBoundary};
use orders_service::messaging::{spawn_logging_consumer, ChannelPublisher, EventPublisher, RedpandaPublisher};
use orders_service::metrics::{self, Metrics};
use orders_service::store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use orders_service::utils::{CircuitBreaker, RetryPolicy, TracingObserver};
use orders_service::{AppConfig, OrderOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orders_service=debug")),
        )
        .init();

    tracing::info!("🚀 Starting orders service");

    let config = AppConfig::load()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let tracing_observer = Arc::new(TracingObserver);

    // === 2. Resilience: one breaker registry, one retry policy ===
    let breaker = Arc::new(
        CircuitBreaker::new((&config.circuit_breaker).into())
            .with_observer(tracing_observer.clone())
            .with_observer(metrics.clone()),
    );
    let retry = Arc::new(
        RetryPolicy::new((&config.retry).into(), breaker.clone())
            .with_observer(tracing_observer)
            .with_observer(metrics.clone()),
    );
    tracing::info!(
        max_attempts = config.retry.max_attempts,
        failure_rate_threshold = config.circuit_breaker.failure_rate_threshold,
        "🛡️ Circuit breaker and retry ready"
    );

    // === 3. Users service client ===
    let users: Arc<dyn RemoteCaller> = Arc::new(HttpUserClient::new(
        config.users_service.base_url.clone(),
        config.users_timeout(),
    )?);
    tracing::info!(base_url = %config.users_service.base_url, "🤝 Users service client ready");

    // === 4. Order store ===
    let store: Arc<dyn OrderStore> = match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PostgresOrderStore::connect(url, config.store_timeout()).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("No database configured, orders are kept in memory");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    // === 5. Event publisher ===
    let topic = config.messaging.topic.clone();
    let publisher: Arc<dyn EventPublisher> = match &config.messaging.brokers {
        Some(brokers) => {
            tracing::info!(brokers = %brokers, topic = %topic, "🐇 Publishing events to Redpanda");
            Arc::new(RedpandaPublisher::new(
                brokers,
                topic,
                config.send_timeout(),
                breaker.clone(),
            )?)
        }
        None => {
            tracing::warn!(topic = %topic, "No brokers configured, events stay in process");
            let (publisher, receiver) = ChannelPublisher::new(topic.clone());
            spawn_logging_consumer(topic, receiver);
            Arc::new(publisher)
        }
    };

    // === 6. Orchestrator ===
    let orchestrator = Arc::new(
        OrderOrchestrator::new(store, users, retry, publisher, config.store_timeout())
            .with_metrics(metrics.clone()),
    );

    // === 7. HTTP servers ===
    let orders_data = web::Data::from(orchestrator);
    let boundary = web::Data::new(TrustBoundary::new(
        config.server.trusted_header.clone(),
        config.server.trusted_value.clone(),
    ));

    let api = HttpServer::new(move || {
        App::new()
            .app_data(orders_data.clone())
            .app_data(boundary.clone())
            .configure(http::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run();

    tracing::info!("🚀 Orders API listening on {}:{}", config.server.host, config.server.port);

    let metrics_registry = Arc::new(metrics.registry().clone());
    tokio::try_join!(api, metrics::start_metrics_server(metrics_registry, breaker, config.metrics.port))?;

    tracing::info!("Orders service stopped");
    Ok(())
}
