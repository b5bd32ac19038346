//! Product CRUD and stock adjustment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, Product, ProductId};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{CountResponse, SearchQuery};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    #[serde(default)]
    pub category: String,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    pub category: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.into(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            stock: product.stock,
            category: product.category,
        }
    }
}

fn to_responses(products: Vec<Product>) -> Vec<ProductResponse> {
    products.into_iter().map(ProductResponse::from).collect()
}

// -- Handlers --

/// GET /products — list products ordered by name.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    Ok(Json(to_responses(state.products.list_products().await?)))
}

/// GET /products/{id} — load one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.products.get_product(&ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// POST /products — add a product with its opening stock.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .products
        .create_product(Product {
            id: ProductId::new(req.id),
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            stock: req.stock,
            category: req.category,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/{id} — rewrite catalog fields. Stock is not changed.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .products
        .update_product(Product {
            id: ProductId::new(id),
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            stock: 0,
            category: req.category,
        })
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id} — delete a product no order references.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.products.delete_product(&ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/stock — apply a signed stock adjustment.
#[tracing::instrument(skip(state))]
pub async fn adjust_stock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = ProductId::new(id);
    state.products.adjust_stock(&id, req.delta).await?;
    let product = state.products.get_product(&id).await?;
    Ok(Json(product.into()))
}

/// GET /products/count — number of products.
#[tracing::instrument(skip(state))]
pub async fn count<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.products.count_products().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /products/search?name= — products whose name contains the term.
#[tracing::instrument(skip(state))]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    Ok(Json(to_responses(
        state.products.search_products(&query.name).await?,
    )))
}
