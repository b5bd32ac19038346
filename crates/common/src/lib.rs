//! Shared types for the back-office order system.
//!
//! Identifiers, the `Money` amount type and the persisted records that
//! travel between the store, the services and the HTTP layer.

mod model;
mod money;
mod status;
mod types;

pub use model::{Customer, Order, OrderLine, Product};
pub use money::Money;
pub use status::OrderStatus;
pub use types::{CustomerId, OrderId, ProductId};
