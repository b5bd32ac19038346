//! HTTP API server with observability for the back-office order system.
//!
//! Provides REST endpoints for customers, products and orders, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CustomerService, OrderService, ProductService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use routes::{customers, orders, products};

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub customers: CustomerService<S>,
    pub products: ProductService<S>,
    pub orders: OrderService<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over one store.
    pub fn new(store: S) -> Self {
        Self {
            customers: CustomerService::new(store.clone()),
            products: ProductService::new(store.clone()),
            orders: OrderService::new(store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/customers",
            get(customers::list::<S>).post(customers::create::<S>),
        )
        .route("/customers/count", get(customers::count::<S>))
        .route("/customers/search", get(customers::search::<S>))
        .route(
            "/customers/{id}",
            get(customers::get::<S>)
                .put(customers::update::<S>)
                .delete(customers::delete::<S>),
        )
        .route(
            "/products",
            get(products::list::<S>).post(products::create::<S>),
        )
        .route("/products/count", get(products::count::<S>))
        .route("/products/search", get(products::search::<S>))
        .route(
            "/products/{id}",
            get(products::get::<S>)
                .put(products::update::<S>)
                .delete(products::delete::<S>),
        )
        .route("/products/{id}/stock", post(products::adjust_stock::<S>))
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/count", get(orders::count::<S>))
        .route("/orders/search", get(orders::search::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>).delete(orders::delete::<S>),
        )
        .route("/orders/{id}/status", put(orders::set_status::<S>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
