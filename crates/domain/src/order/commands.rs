//! Order commands.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, OrderStatus, ProductId};

/// One requested line of a new order.
///
/// Only the product and quantity come from the caller; price and subtotal
/// are taken from the catalog when the order is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl LineRequest {
    /// Creates a new line request.
    pub fn new(product_id: impl Into<ProductId>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The order ID to create.
    pub order_id: OrderId,

    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Total the caller expects; must match the computed total exactly.
    pub total: Money,

    /// Placement time. Defaults to now.
    pub placed_at: Option<DateTime<Utc>>,

    /// Initial status.
    pub status: OrderStatus,

    /// Requested lines, in order.
    pub lines: Vec<LineRequest>,
}

impl CreateOrder {
    /// Creates a pending order command without lines.
    pub fn new(
        order_id: impl Into<OrderId>,
        customer_id: impl Into<CustomerId>,
        total: Money,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            total,
            placed_at: None,
            status: OrderStatus::pending(),
            lines: Vec::new(),
        }
    }

    /// Appends a line.
    pub fn with_line(mut self, product_id: impl Into<ProductId>, quantity: i32) -> Self {
        self.lines.push(LineRequest::new(product_id, quantity));
        self
    }

    /// Sets the initial status.
    pub fn with_status(mut self, status: impl Into<OrderStatus>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the placement time.
    pub fn placed_at(mut self, placed_at: DateTime<Utc>) -> Self {
        self.placed_at = Some(placed_at);
        self
    }
}

/// Command to overwrite an order's status.
#[derive(Debug, Clone)]
pub struct SetOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl SetOrderStatus {
    /// Creates a new SetOrderStatus command.
    pub fn new(order_id: impl Into<OrderId>, status: impl Into<OrderStatus>) -> Self {
        Self {
            order_id: order_id.into(),
            status: status.into(),
        }
    }
}
