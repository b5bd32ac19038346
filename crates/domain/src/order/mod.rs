//! Order placement and lifecycle.

mod commands;
mod service;

pub use commands::{CreateOrder, LineRequest, SetOrderStatus};
pub use service::{CancelOutcome, OrderService};
