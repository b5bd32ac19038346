//! Order service: placement, status changes, cancellation and deletion.
//!
//! Every multi-row write runs in one store transaction. Validation reads
//! happen before the transaction opens; the guarded stock debit inside the
//! transaction is what actually prevents overselling.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use common::{Money, Order, OrderId, OrderLine};
use store::{Store, StoreError, StoreTx};
use tracing::{info, warn};

use crate::error::{DomainError, require};
use crate::product::record_stock_adjustment;

use super::{CreateOrder, SetOrderStatus};

/// What a cancel call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was flipped to cancelled and its stock returned.
    Cancelled,
    /// The order was already cancelled; nothing changed.
    AlreadyCancelled,
}

/// Service for placing and managing orders.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places a new order.
    ///
    /// Validates the request against live customer and product data, prices
    /// every line from the catalog, then writes header, lines and stock
    /// debits in one transaction. Nothing is persisted on failure.
    #[tracing::instrument(
        skip(self, cmd),
        fields(order_id = %cmd.order_id, customer_id = %cmd.customer_id)
    )]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let started = Instant::now();

        let result = self.place(cmd).await;
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                info!(total = %order.total, lines = order.lines.len(), "order placed");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.code()).increment(1);
                warn!(error = %e, "order rejected");
            }
        }
        result
    }

    async fn place(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let order = self.validate(cmd).await?;

        let mut tx = self.store.begin().await?;
        if let Err(e) = Self::write_order(&mut tx, &order).await {
            return Err(abort(tx, e).await);
        }
        tx.commit().await?;

        for line in &order.lines {
            record_stock_adjustment(-line.quantity);
        }
        Ok(order)
    }

    /// Checks a create request and builds the order to persist.
    async fn validate(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        require("order id", cmd.order_id.as_str())?;
        require("customer id", cmd.customer_id.as_str())?;
        if cmd.lines.is_empty() {
            return Err(DomainError::InvalidInput(
                "order must have at least one line".to_string(),
            ));
        }
        require("status", cmd.status.as_str())?;

        if self.store.get_customer(&cmd.customer_id).await?.is_none() {
            return Err(DomainError::not_found("Customer", &cmd.customer_id));
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut computed = Money::zero();

        for request in cmd.lines {
            if !seen.insert(request.product_id.clone()) {
                return Err(DomainError::InvalidInput(format!(
                    "product {} appears more than once",
                    request.product_id
                )));
            }

            let product = self
                .store
                .get_product(&request.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product", &request.product_id))?;

            if request.quantity <= 0 {
                return Err(DomainError::InvalidInput(format!(
                    "quantity for product {} must be positive",
                    product.id
                )));
            }

            if product.stock < request.quantity {
                return Err(DomainError::InsufficientStock {
                    product_id: product.id,
                    requested: request.quantity.unsigned_abs(),
                });
            }

            let subtotal = product
                .price
                .checked_multiply(request.quantity.unsigned_abs())
                .ok_or_else(|| {
                    DomainError::InvalidInput(format!("subtotal of product {} overflows", product.id))
                })?;
            computed = computed
                .checked_add(subtotal)
                .ok_or_else(|| DomainError::InvalidInput("order total overflows".to_string()))?;

            lines.push(OrderLine {
                product_id: product.id,
                quantity: request.quantity,
                unit_price: product.price,
                subtotal,
            });
        }

        if cmd.total != computed {
            return Err(DomainError::InvalidInput(format!(
                "total mismatch: declared {}, computed {}",
                cmd.total, computed
            )));
        }

        Ok(Order {
            id: cmd.order_id,
            customer_id: cmd.customer_id,
            placed_at: cmd.placed_at.unwrap_or_else(Utc::now),
            total: computed,
            status: cmd.status,
            lines,
        })
    }

    async fn write_order(tx: &mut S::Tx, order: &Order) -> Result<(), DomainError> {
        tx.insert_order(order).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => DomainError::Duplicate(format!("Order {}", order.id)),
            StoreError::ForeignKeyViolation(constraint) if constraint.contains("customer") => {
                DomainError::not_found("Customer", &order.customer_id)
            }
            StoreError::ForeignKeyViolation(_) => {
                DomainError::not_found("Referenced product", &order.id)
            }
            other => other.into(),
        })?;

        for line in &order.lines {
            tx.adjust_stock(&line.product_id, -line.quantity).await?;
        }
        Ok(())
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))
    }

    /// Returns every order, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders().await?)
    }

    /// Counts orders.
    #[tracing::instrument(skip(self))]
    pub async fn count_orders(&self) -> Result<i64, DomainError> {
        Ok(self.store.count_orders().await?)
    }

    /// Returns orders whose customer's name contains `term`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn search_by_customer_name(&self, term: &str) -> Result<Vec<Order>, DomainError> {
        require("customer name", term)?;
        Ok(self.store.search_orders_by_customer_name(term).await?)
    }

    /// Overwrites an order's status.
    ///
    /// Open statuses may follow one another freely. Setting the cancelled
    /// label here does not return stock; use [`OrderService::cancel_order`]
    /// for that. A cancelled order stays cancelled, since reopening it would
    /// let a second cancel credit its stock again.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, status = %cmd.status))]
    pub async fn set_status(&self, cmd: SetOrderStatus) -> Result<(), DomainError> {
        let current = self.get_order(&cmd.order_id).await?;
        require("status", cmd.status.as_str())?;
        if current.status.is_cancelled() && !cmd.status.is_cancelled() {
            return Err(DomainError::InvalidInput(format!(
                "order {} is cancelled and cannot be reopened",
                cmd.order_id
            )));
        }

        if !self
            .store
            .update_order_status(&cmd.order_id, &cmd.status)
            .await?
        {
            return Err(DomainError::not_found("Order", &cmd.order_id));
        }

        info!("order status updated");
        Ok(())
    }

    /// Cancels an order and returns its stock.
    ///
    /// Cancelling an already cancelled order succeeds without touching
    /// stock. The status flip and every credit commit together.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, id: &OrderId) -> Result<CancelOutcome, DomainError> {
        let order = self.get_order(id).await?;
        if order.status.is_cancelled() {
            info!("order already cancelled");
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        let mut tx = self.store.begin().await?;
        match tx.mark_cancelled(id).await {
            Ok(true) => {}
            Ok(false) => {
                // Cancelled or deleted concurrently since the read above.
                tx.rollback().await?;
                info!("order already cancelled");
                return Ok(CancelOutcome::AlreadyCancelled);
            }
            Err(e) => return Err(abort(tx, e.into()).await),
        }

        for line in &order.lines {
            if let Err(e) = tx.adjust_stock(&line.product_id, line.quantity).await {
                return Err(abort(tx, e.into()).await);
            }
        }
        tx.commit().await?;

        for line in &order.lines {
            record_stock_adjustment(line.quantity);
        }
        metrics::counter!("orders_cancelled_total").increment(1);
        info!(lines = order.lines.len(), "order cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Deletes an order and its lines.
    ///
    /// Stock is not returned and any status may be deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        match tx.delete_order(id).await {
            Ok(true) => {}
            Ok(false) => return Err(abort(tx, DomainError::not_found("Order", id)).await),
            Err(e) => return Err(abort(tx, e.into()).await),
        }
        tx.commit().await?;

        info!("order deleted");
        Ok(())
    }
}

/// Rolls back `tx` and hands back the error that caused it.
async fn abort<T: StoreTx>(tx: T, cause: DomainError) -> DomainError {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed");
    }
    cause
}
