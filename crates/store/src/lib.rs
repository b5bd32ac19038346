//! Persistence layer for customers, products and orders.
//!
//! [`Store`] covers single-statement reads and writes, [`StoreTx`] the writes
//! that must land together (order header, lines and stock movements). The
//! stock ledger lives here too: every change to a product's stock goes
//! through [`StoreTx::adjust_stock`], a single guarded update that can never
//! drive stock below zero.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PgStore, PgTx};
pub use store::{Store, StoreTx};
