use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{Customer, CustomerId, Order, OrderId, OrderStatus, Product, ProductId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
}

impl Tables {
    fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if delta > 0 {
            product.stock = product
                .stock
                .checked_add(delta)
                .ok_or_else(|| StoreError::StockOverflow(product_id.clone()))?;
            return Ok(());
        }

        let requested = delta.unsigned_abs();
        if i64::from(product.stock) < i64::from(requested) {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested,
            });
        }
        // delta >= -stock here, so the sum stays in range.
        product.stock += delta;
        Ok(())
    }

    fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.orders.contains_key(&order.id) {
            return Err(StoreError::UniqueViolation("orders_pkey".to_string()));
        }
        if !self.customers.contains_key(&order.customer_id) {
            return Err(StoreError::ForeignKeyViolation(
                "orders_customer_id_fkey".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for line in &order.lines {
            if !self.products.contains_key(&line.product_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "order_lines_product_id_fkey".to_string(),
                ));
            }
            if !seen.insert(&line.product_id) {
                return Err(StoreError::UniqueViolation("order_lines_pkey".to_string()));
            }
        }
        self.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(a.id.cmp(&b.id)));
        orders
    }

    fn products_by_name(mut products: Vec<Product>) -> Vec<Product> {
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        products
    }
}

/// In-memory store implementation.
///
/// Provides the same interface and constraint behavior as the PostgreSQL
/// implementation. A transaction holds the write lock for its whole
/// lifetime, so transactions are serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Writes go straight to the tables while the write lock is held; a
/// snapshot taken at `begin` is restored unless the transaction commits.
pub struct InMemoryTx {
    tables: OwnedRwLockWriteGuard<Tables>,
    snapshot: Option<Tables>,
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.tables.insert_order(order)
    }

    async fn mark_cancelled(&mut self, id: &OrderId) -> Result<bool> {
        match self.tables.orders.get_mut(id) {
            Some(order) if !order.status.is_cancelled() => {
                order.status = OrderStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_order(&mut self, id: &OrderId) -> Result<bool> {
        Ok(self.tables.orders.remove(id).is_some())
    }

    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()> {
        self.tables.adjust_stock(product_id, delta)
    }

    async fn commit(mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let tables = self.tables.clone().write_owned().await;
        let snapshot = Some(tables.clone());
        Ok(InMemoryTx { tables, snapshot })
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.tables.read().await.customers.values().cloned().collect())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(id).cloned())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn search_customers(&self, term: &str) -> Result<Vec<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .values()
            .filter(|c| c.name.contains(term))
            .cloned()
            .collect())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.customers.contains_key(&customer.id) {
            return Err(StoreError::UniqueViolation("customers_pkey".to_string()));
        }
        if tables.customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::UniqueViolation(
                "customers_email_key".to_string(),
            ));
        }
        tables
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .customers
            .values()
            .any(|c| c.email == customer.email && c.id != customer.id)
        {
            return Err(StoreError::UniqueViolation(
                "customers_email_key".to_string(),
            ));
        }
        match tables.customers.get_mut(&customer.id) {
            Some(existing) => {
                existing.name = customer.name.clone();
                existing.email = customer.email.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| &o.customer_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "orders_customer_id_fkey".to_string(),
            ));
        }
        Ok(tables.customers.remove(id).is_some())
    }

    async fn customer_has_orders(&self, id: &CustomerId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().any(|o| &o.customer_id == id))
    }

    async fn count_customers(&self) -> Result<i64> {
        Ok(self.tables.read().await.customers.len() as i64)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(Tables::products_by_name(
            tables.products.values().cloned().collect(),
        ))
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(id).cloned())
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(Tables::products_by_name(
            tables
                .products
                .values()
                .filter(|p| p.name.contains(term))
                .cloned()
                .collect(),
        ))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::UniqueViolation("products_pkey".to_string()));
        }
        tables.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                existing.name = product.name.clone();
                existing.description = product.description.clone();
                existing.price = product.price;
                existing.category = product.category.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let referenced = tables
            .orders
            .values()
            .any(|o| o.lines.iter().any(|l| &l.product_id == id));
        if referenced {
            return Err(StoreError::ForeignKeyViolation(
                "order_lines_product_id_fkey".to_string(),
            ));
        }
        Ok(tables.products.remove(id).is_some())
    }

    async fn product_in_orders(&self, id: &ProductId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .any(|o| o.lines.iter().any(|l| &l.product_id == id)))
    }

    async fn count_products(&self) -> Result<i64> {
        Ok(self.tables.read().await.products.len() as i64)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(
            tables.orders.values().cloned().collect(),
        ))
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(id).cloned())
    }

    async fn search_orders_by_customer_name(&self, term: &str) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let orders = tables
            .orders
            .values()
            .filter(|o| {
                tables
                    .customers
                    .get(&o.customer_id)
                    .is_some_and(|c| c.name.contains(term))
            })
            .cloned()
            .collect();
        Ok(Tables::newest_first(orders))
    }

    async fn update_order_status(&self, id: &OrderId, status: &OrderStatus) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(id) {
            Some(order) => {
                order.status = status.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_orders(&self) -> Result<i64> {
        Ok(self.tables.read().await.orders.len() as i64)
    }
}
