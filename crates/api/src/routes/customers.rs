//! Customer CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Customer, CustomerId};
use serde::Deserialize;
use store::Store;

use super::{CountResponse, SearchQuery};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: String,
    pub email: String,
}

// -- Handlers --

/// GET /customers — list every customer.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.customers.list_customers().await?))
}

/// GET /customers/{id} — load one customer.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.get_customer(&CustomerId::new(id)).await?))
}

/// POST /customers — register a customer.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state
        .customers
        .create_customer(Customer {
            id: CustomerId::new(req.id),
            name: req.name,
            email: req.email,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// PUT /customers/{id} — rewrite name and email.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .customers
        .update_customer(Customer {
            id: CustomerId::new(id),
            name: req.name,
            email: req.email,
        })
        .await?;
    Ok(Json(customer))
}

/// DELETE /customers/{id} — delete a customer without orders.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.customers.delete_customer(&CustomerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /customers/count — number of customers.
#[tracing::instrument(skip(state))]
pub async fn count<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.customers.count_customers().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /customers/search?name= — customers whose name contains the term.
#[tracing::instrument(skip(state))]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.customers.search_customers(&query.name).await?))
}
