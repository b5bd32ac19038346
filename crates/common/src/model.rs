use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, Money, OrderId, OrderStatus, ProductId};

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Unique across customers.
    pub email: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price, always positive.
    pub price: Money,
    /// Units on hand, never negative.
    pub stock: i32,
    pub category: String,
}

/// One product line of an order.
///
/// `unit_price` is the product price captured when the order was placed and
/// does not follow later price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// An order header together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub placed_at: DateTime<Utc>,
    pub total: Money,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Sum of the line subtotals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(|line| line.subtotal).sum()
    }
}
