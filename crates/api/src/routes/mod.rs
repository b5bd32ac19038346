//! HTTP route handlers.

pub mod customers;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use serde::{Deserialize, Serialize};

/// `?name=` query used by the search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}
