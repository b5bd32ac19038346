//! Domain layer for the back-office order system.
//!
//! This crate provides the services that sit between the HTTP layer and
//! the store:
//! - `CustomerService` and `ProductService` for lookups and catalog upkeep
//! - `OrderService`, which places, cancels and deletes orders atomically
//! - `DomainError`, the error taxonomy shared by all of them

pub mod customer;
pub mod error;
pub mod order;
pub mod product;

pub use customer::CustomerService;
pub use error::DomainError;
pub use order::{CancelOutcome, CreateOrder, LineRequest, OrderService, SetOrderStatus};
pub use product::ProductService;
