use actix_web::{web, HttpResponse};

use crate::domain::order::{OrderError, OrderOrchestrator};
use crate::models::{OrderDto, OrderInput};

type Orchestrator = web::Data<OrderOrchestrator>;

pub(super) async fn list_orders(orders: Orchestrator) -> Result<HttpResponse, OrderError> {
    let all = orders.list_orders().await?;
    tracing::info!(count = all.len(), "✅ Orders retrieved");

    let body: Vec<OrderDto> = all.iter().map(OrderDto::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

pub(super) async fn get_order(orders: Orchestrator, id: web::Path<i64>) -> Result<HttpResponse, OrderError> {
    let order = orders.get_order(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderDto::from(&order)))
}

pub(super) async fn order_details(orders: Orchestrator, id: web::Path<i64>) -> Result<HttpResponse, OrderError> {
    let details = orders.order_details(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(details))
}

pub(super) async fn create_order(
    orders: Orchestrator,
    input: web::Json<OrderInput>,
) -> Result<HttpResponse, OrderError> {
    tracing::info!(user_id = ?input.user_id, "🧾 Request to create new order");
    let order = orders.create_order(&input).await?;
    Ok(HttpResponse::Created().json(OrderDto::from(&order)))
}

pub(super) async fn update_order(
    orders: Orchestrator,
    id: web::Path<i64>,
    input: web::Json<OrderInput>,
) -> Result<HttpResponse, OrderError> {
    let order = orders.update_order(id.into_inner(), &input).await?;
    Ok(HttpResponse::Ok().json(OrderDto::from(&order)))
}

pub(super) async fn delete_order(orders: Orchestrator, id: web::Path<i64>) -> Result<HttpResponse, OrderError> {
    orders.delete_order(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
