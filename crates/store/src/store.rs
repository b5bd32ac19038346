use async_trait::async_trait;
use common::{Customer, CustomerId, Order, OrderId, OrderStatus, Product, ProductId};

use crate::Result;

/// Core trait for store implementations.
///
/// Methods on `Store` run as single autocommitted operations. Anything that
/// must be atomic across several rows is done through a [`StoreTx`] obtained
/// from [`Store::begin`].
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Transaction type handed out by [`Store::begin`].
    type Tx: StoreTx + 'static;

    /// Opens a transaction.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    async fn begin(&self) -> Result<Self::Tx>;

    // -- Customers --

    /// Returns every customer.
    async fn list_customers(&self) -> Result<Vec<Customer>>;

    /// Retrieves a customer by id.
    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>>;

    /// Retrieves the customer registered with an email address.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// Returns customers whose name contains `term`.
    async fn search_customers(&self, term: &str) -> Result<Vec<Customer>>;

    /// Inserts a customer.
    ///
    /// Fails with `UniqueViolation` on a taken id or email.
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    /// Rewrites name and email. Returns false if the customer doesn't exist.
    async fn update_customer(&self, customer: &Customer) -> Result<bool>;

    /// Deletes a customer. Returns false if the customer doesn't exist.
    ///
    /// Fails with `ForeignKeyViolation` while orders reference the customer.
    async fn delete_customer(&self, id: &CustomerId) -> Result<bool>;

    /// Returns true if at least one order references the customer.
    async fn customer_has_orders(&self, id: &CustomerId) -> Result<bool>;

    /// Counts customers.
    async fn count_customers(&self) -> Result<i64>;

    // -- Products --

    /// Returns every product, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Returns products whose name contains `term`, ordered by name.
    async fn search_products(&self, term: &str) -> Result<Vec<Product>>;

    /// Inserts a product.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Rewrites name, description, price and category.
    ///
    /// Stock is left untouched; it only moves through the ledger.
    /// Returns false if the product doesn't exist.
    async fn update_product(&self, product: &Product) -> Result<bool>;

    /// Deletes a product. Returns false if the product doesn't exist.
    ///
    /// Fails with `ForeignKeyViolation` while order lines reference it.
    async fn delete_product(&self, id: &ProductId) -> Result<bool>;

    /// Returns true if at least one order line references the product.
    async fn product_in_orders(&self, id: &ProductId) -> Result<bool>;

    /// Counts products.
    async fn count_products(&self) -> Result<i64>;

    // -- Orders --

    /// Returns every order with its lines, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Retrieves an order with its lines.
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Returns orders whose customer's name contains `term`, newest first.
    async fn search_orders_by_customer_name(&self, term: &str) -> Result<Vec<Order>>;

    /// Overwrites the status of an order, leaving lines and total untouched.
    /// Returns false if the order doesn't exist.
    async fn update_order_status(&self, id: &OrderId, status: &OrderStatus) -> Result<bool>;

    /// Counts orders.
    async fn count_orders(&self) -> Result<i64>;

    /// Applies a signed stock adjustment in its own transaction.
    ///
    /// See [`StoreTx::adjust_stock`] for the semantics.
    async fn adjust_stock(&self, product_id: &ProductId, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let mut tx = self.begin().await?;
        tx.adjust_stock(product_id, delta).await?;
        tx.commit().await
    }
}

/// An open store transaction.
///
/// Nothing written through a transaction is visible to other readers until
/// [`StoreTx::commit`]. Dropping an uncommitted transaction discards its
/// writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Inserts an order header and its lines.
    ///
    /// Fails with `UniqueViolation` if the order id is taken or a product
    /// appears twice, and with `ForeignKeyViolation` if the customer or a
    /// product is missing.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Flips the order to cancelled if it isn't already.
    ///
    /// Returns false when no row changed: the order is missing or was
    /// cancelled by someone else first.
    async fn mark_cancelled(&mut self, id: &OrderId) -> Result<bool>;

    /// Deletes an order's lines and then its header.
    /// Returns false if the order doesn't exist.
    async fn delete_order(&mut self, id: &OrderId) -> Result<bool>;

    /// Moves a product's stock by `delta`.
    ///
    /// - `delta == 0` succeeds without touching anything.
    /// - `delta > 0` adds to stock; fails with `ProductNotFound` if the
    ///   product doesn't exist.
    /// - `delta < 0` subtracts only if the result stays non-negative, as one
    ///   conditional update; fails with `InsufficientStock` otherwise, or
    ///   `ProductNotFound` if the product doesn't exist.
    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()>;

    /// Makes every write of this transaction visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}
