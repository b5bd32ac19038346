//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, Order, OrderId, OrderStatus};
use domain::{CancelOutcome, CreateOrder, LineRequest, SetOrderStatus};
use serde::{Deserialize, Serialize};
use store::Store;

use super::CountResponse;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub id: String,
    pub customer_id: String,
    pub total_cents: i64,
    pub placed_at: Option<DateTime<Utc>>,
    /// Missing reads as blank and is rejected by validation.
    #[serde(default)]
    pub status: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerNameQuery {
    pub customer_name: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub placed_at: DateTime<Utc>,
    pub total_cents: i64,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub order_id: String,
    pub outcome: &'static str,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.into(),
            customer_id: order.customer_id.into(),
            placed_at: order.placed_at,
            total_cents: order.total.cents(),
            status: order.status.into(),
            lines: order
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id.into(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    subtotal_cents: line.subtotal.cents(),
                })
                .collect(),
        }
    }
}

fn to_responses(orders: Vec<Order>) -> Vec<OrderResponse> {
    orders.into_iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /orders — place an order and debit its stock.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = CreateOrder {
        order_id: OrderId::new(req.id),
        customer_id: req.customer_id.into(),
        total: Money::from_cents(req.total_cents),
        placed_at: req.placed_at,
        status: OrderStatus::from(req.status),
        lines: req
            .lines
            .into_iter()
            .map(|line| LineRequest::new(line.product_id, line.quantity))
            .collect(),
    };

    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — every order with its lines, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(Json(to_responses(state.orders.list_orders().await?)))
}

/// GET /orders/{id} — load one order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(&OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status — overwrite the status label.
#[tracing::instrument(skip(state))]
pub async fn set_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::new(id);
    state
        .orders
        .set_status(SetOrderStatus::new(order_id.clone(), req.status))
        .await?;
    let order = state.orders.get_order(&order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel — cancel and return stock. Repeat calls are no-ops.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let order_id = OrderId::new(id);
    let outcome = state.orders.cancel_order(&order_id).await?;
    Ok(Json(CancelResponse {
        order_id: order_id.into(),
        outcome: match outcome {
            CancelOutcome::Cancelled => "cancelled",
            CancelOutcome::AlreadyCancelled => "already_cancelled",
        },
    }))
}

/// DELETE /orders/{id} — remove an order and its lines.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orders.delete_order(&OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/count — number of orders.
#[tracing::instrument(skip(state))]
pub async fn count<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.orders.count_orders().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /orders/search?customer_name= — orders of customers whose name matches.
#[tracing::instrument(skip(state))]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CustomerNameQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(Json(to_responses(
        state
            .orders
            .search_by_customer_name(&query.customer_name)
            .await?,
    )))
}
